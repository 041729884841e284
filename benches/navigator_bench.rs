use arx::navigator::{element_text, find_by_partial_path, find_relative};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use test_data_gen::Generator;

fn bench_partial_path_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial_path");

    for items in [100usize, 1000, 5000] {
        let xml = Generator::new(42).menu_document(items);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("suffix_match", format!("{items}_foods")),
            &xml,
            |b, xml| {
                let doc = roxmltree::Document::parse(xml).unwrap();
                let components = vec!["food".to_string(), "name".to_string()];
                b.iter(|| {
                    let found =
                        find_by_partial_path(doc.root_element(), black_box(&components));
                    black_box(found.len())
                })
            },
        );
    }

    group.finish();
}

fn bench_relative_resolution(c: &mut Criterion) {
    let xml = Generator::new(7).bookstore_document(500);
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let books = find_relative(doc.root_element(), &["book".to_string()]);

    c.bench_function("relative_author_lookup", |b| {
        let author = vec!["author".to_string()];
        b.iter(|| {
            let mut count = 0usize;
            for book in &books {
                count += find_relative(black_box(*book), &author).len();
            }
            black_box(count)
        })
    });
}

fn bench_value_extraction(c: &mut Criterion) {
    let xml = Generator::new(3).menu_document(2000);
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let names = find_by_partial_path(doc.root_element(), &["name".to_string()]);

    c.bench_function("element_text_2000", |b| {
        b.iter(|| {
            let total: usize = names.iter().map(|n| element_text(*n).len()).sum();
            black_box(total)
        })
    });
}

fn bench_dom_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("dom_parse");

    for items in [100usize, 1000] {
        let xml = Generator::new(9).dsn_document(items);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("roxmltree", format!("{items}_blocs")),
            &xml,
            |b, xml| b.iter(|| roxmltree::Document::parse(black_box(xml)).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_partial_path_search,
    bench_relative_resolution,
    bench_value_extraction,
    bench_dom_parse
);
criterion_main!(benches);
