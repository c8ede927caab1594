//! EAV vs. Condensed Layout Benchmark
//!
//! Measures how two physical SQLite layouts for fixed-width feature vectors
//! behave under bulk insert, random point lookup and ordered range reads:
//! - **Condensed layout**: one wide row per vector, one REAL column per attribute
//! - **EAV layout**: one `(vector_id, attribute_id, value)` row per attribute
//!
//! Both layouts implement [`schema::VectorStore`] and return identical vectors
//! for identical inputs, so their timings can be compared directly.
//!
//! Run the sweep: `cargo run --release`
//! Run benchmarks: `cargo bench`
//! Run tests: `cargo test`

pub mod config;
pub mod error;
pub mod populate;
pub mod query;
pub mod report;
pub mod schema;
pub mod workload;

pub use error::{BenchError, Result};
