//! Test data generator for arx integration tests and benches.
//!
//! Generates deterministic XML corpora (menus, bookstores, company
//! org charts, DSN-shaped declarations) from a seed, so tests and
//! benchmarks reproduce byte-for-byte.
//!
//! # Example
//!
//! ```rust
//! use test_data_gen::Generator;
//!
//! let mut gen = Generator::new(42);
//! let xml = gen.menu_document(25);
//! assert!(xml.starts_with("<breakfast_menu>"));
//! ```

pub mod generator;

pub use generator::{CorpusKind, Generator};
