//! Seeded XML document generation.

use chrono::NaiveDate;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const FOOD_NAMES: &[&str] = &[
    "Belgian Waffles",
    "Strawberry Waffles",
    "Berry-Berry Waffles",
    "French Toast",
    "Homestyle Breakfast",
    "Oatmeal Deluxe",
    "Pancake Stack",
    "Country Omelette",
];

const FIRST_NAMES: &[&str] = &[
    "Claire", "Paul", "Marie", "Jean", "Sophie", "Luc", "Anne", "Pierre", "Julie", "Marc",
];

const LAST_NAMES: &[&str] = &[
    "Durand", "Martin", "Bernard", "Petit", "Robert", "Richard", "Moreau", "Laurent",
];

const BOOK_TITLES: &[&str] = &[
    "XQuery Kick Start",
    "Learning XML",
    "XML Schema Essentials",
    "Practical Data Pipelines",
    "Everyday Queries",
    "The Declarative Mind",
];

const DEPARTMENTS: &[&str] = &["Engineering", "Sales", "Support", "Finance", "Operations"];

/// Which corpus shape to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusKind {
    Menu,
    Bookstore,
    Company,
    Dsn,
}

impl std::str::FromStr for CorpusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "menu" => Ok(CorpusKind::Menu),
            "bookstore" | "books" => Ok(CorpusKind::Bookstore),
            "company" => Ok(CorpusKind::Company),
            "dsn" => Ok(CorpusKind::Dsn),
            _ => Err(format!(
                "Unknown corpus kind: {}. Valid options: menu, bookstore, company, dsn",
                s
            )),
        }
    }
}

/// Deterministic XML generator. The same seed always produces the same
/// documents.
pub struct Generator {
    rng: ChaCha8Rng,
}

impl Generator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn pick<'a>(&mut self, options: &'a [&'a str]) -> &'a str {
        options[self.rng.random_range(0..options.len())]
    }

    /// A breakfast-menu document with `items` food entries.
    pub fn menu_document(&mut self, items: usize) -> String {
        let mut out = String::from("<breakfast_menu>\n");
        for _ in 0..items {
            let name = self.pick(FOOD_NAMES);
            let price = self.rng.random_range(300..1200) as f64 / 100.0;
            let calories = self.rng.random_range(300..1000);
            let _ = writeln!(
                out,
                " <food><name>{name}</name><price>{price:.2}</price><calories>{calories}</calories></food>"
            );
        }
        out.push_str("</breakfast_menu>\n");
        out
    }

    /// A bookstore with `books` entries, one to four authors each.
    pub fn bookstore_document(&mut self, books: usize) -> String {
        let mut out = String::from("<bookstore>\n");
        for _ in 0..books {
            let title = self.pick(BOOK_TITLES);
            let year = self.rng.random_range(1998..2026);
            let price = self.rng.random_range(995..7999) as f64 / 100.0;
            out.push_str(" <book>\n");
            let _ = writeln!(out, "  <title>{title}</title>");
            for _ in 0..self.rng.random_range(1..=4) {
                let _ = writeln!(out, "  <author>{}</author>", self.pick(LAST_NAMES));
            }
            let _ = writeln!(out, "  <year>{year}</year>");
            let _ = writeln!(out, "  <price>{price:.2}</price>");
            out.push_str(" </book>\n");
        }
        out.push_str("</bookstore>\n");
        out
    }

    /// A company org chart: `departments` departments with up to
    /// `max_employees` employees each.
    pub fn company_document(&mut self, departments: usize, max_employees: usize) -> String {
        let mut out = String::from("<company>\n");
        for d in 0..departments {
            let name = DEPARTMENTS[d % DEPARTMENTS.len()];
            out.push_str(" <department>\n");
            let _ = writeln!(out, "  <name>{name}</name>");
            for _ in 0..self.rng.random_range(1..=max_employees.max(1)) {
                let first = self.pick(FIRST_NAMES);
                let last = self.pick(LAST_NAMES);
                let salary = self.rng.random_range(2500..8000);
                let _ = writeln!(
                    out,
                    "  <employee><name>{first} {last}</name><salary>{salary}</salary></employee>"
                );
            }
            out.push_str(" </department>\n");
        }
        out.push_str("</company>\n");
        out
    }

    /// A DSN-shaped declaration with `individuals` S21_G00_30 blocs.
    pub fn dsn_document(&mut self, individuals: usize) -> String {
        let mut out = String::from("<DSN>\n");
        for _ in 0..individuals {
            let nir: String = (0..13)
                .map(|_| char::from(b'0' + self.rng.random_range(0..10) as u8))
                .collect();
            let last = self.pick(LAST_NAMES);
            let first = self.pick(FIRST_NAMES);
            let birth = NaiveDate::from_ymd_opt(
                self.rng.random_range(1960..2005),
                self.rng.random_range(1..=12),
                self.rng.random_range(1..=28),
            )
            .unwrap();
            out.push_str(" <S21_G00_30>\n");
            let _ = writeln!(out, "  <S21_G00_30_001>{nir}</S21_G00_30_001>");
            let _ = writeln!(out, "  <S21_G00_30_002>{last}</S21_G00_30_002>");
            let _ = writeln!(out, "  <S21_G00_30_006>{first}</S21_G00_30_006>");
            let _ = writeln!(
                out,
                "  <S21_G00_30_007>{}</S21_G00_30_007>",
                birth.format("%d%m%Y")
            );
            out.push_str(" </S21_G00_30>\n");
        }
        out.push_str("</DSN>\n");
        out
    }

    pub fn document(&mut self, kind: CorpusKind, items: usize) -> String {
        match kind {
            CorpusKind::Menu => self.menu_document(items),
            CorpusKind::Bookstore => self.bookstore_document(items),
            CorpusKind::Company => self.company_document(items.max(1).min(5), 4),
            CorpusKind::Dsn => self.dsn_document(items),
        }
    }

    /// Write `files` documents into `dir`, named `<kind>_NNN.xml`.
    pub fn write_corpus(
        &mut self,
        dir: &Path,
        kind: CorpusKind,
        files: usize,
        items: usize,
    ) -> anyhow::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let prefix = match kind {
            CorpusKind::Menu => "menu",
            CorpusKind::Bookstore => "bookstore",
            CorpusKind::Company => "company",
            CorpusKind::Dsn => "dsn",
        };
        let mut paths = Vec::with_capacity(files);
        for i in 0..files {
            let path = dir.join(format!("{prefix}_{i:03}.xml"));
            std::fs::write(&path, self.document(kind, items))?;
            paths.push(path);
        }
        Ok(paths)
    }
}
