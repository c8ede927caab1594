//! Criterion benchmark harness: insert, point lookup and range read latency
//! for both layouts at several table sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use eav_bench::populate::{generate_vectors, VectorGenerator, DEFAULT_SEED};
use eav_bench::schema::condensed::CondensedLayout;
use eav_bench::schema::eav::EavLayout;
use eav_bench::schema::{open_connection, Projection, SchemaSpec, VectorStore};
use rusqlite::Connection;
use std::time::Duration;

const COLUMNS: u16 = 23;
const RANGE_LEN: u32 = 100;

fn table_sizes() -> Vec<u32> {
    vec![1_000, 10_000]
}

fn spec() -> SchemaSpec {
    let projection = Projection::new(vec![0, 1, 2, 3, 4, 5], COLUMNS).expect("projection");
    SchemaSpec::new(COLUMNS, projection).expect("schema spec")
}

fn layout<'conn>(name: &str, conn: &'conn Connection) -> Box<dyn VectorStore + 'conn> {
    match name {
        "condensed" => Box::new(CondensedLayout::new(conn).expect("condensed layout")),
        _ => Box::new(EavLayout::new(conn).expect("eav layout")),
    }
}

/// Create the layout's table and fill it with `size` committed vectors.
fn setup_store(store: &mut dyn VectorStore, size: u32) {
    store.create_schema(&spec()).expect("Failed to create schema");
    for vector in generate_vectors(size as usize, COLUMNS, DEFAULT_SEED) {
        store.insert(&vector).expect("Failed to insert");
    }
    store.commit().expect("Failed to commit");
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.measurement_time(Duration::from_secs(10));

    for name in ["condensed", "eav"] {
        let conn = open_connection(":memory:").expect("Failed to open in-memory SQLite");
        let mut store = layout(name, &conn);
        store.create_schema(&spec()).expect("Failed to create schema");
        let mut generator = VectorGenerator::new(COLUMNS, DEFAULT_SEED);
        let mut pending = 0u32;

        group.bench_function(name, |b| {
            b.iter(|| {
                let vector = generator.next_vector();
                store.insert(&vector).expect("insert failed");
                pending += 1;
                if pending == 1_000 {
                    store.commit().expect("commit failed");
                    pending = 0;
                }
            });
        });
        store.commit().expect("Failed to commit");
    }
    group.finish();
}

fn bench_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_lookup");

    for name in ["condensed", "eav"] {
        for size in table_sizes() {
            let conn = open_connection(":memory:").expect("Failed to open in-memory SQLite");
            let mut store = layout(name, &conn);
            setup_store(store.as_mut(), size);
            let mut probes = VectorGenerator::new(COLUMNS, DEFAULT_SEED ^ 1);

            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                b.iter(|| {
                    let id = probes.random_id(size);
                    store.get_by_id(id).expect("lookup failed")
                });
            });
        }
    }
    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("range");

    for name in ["condensed", "eav"] {
        for size in table_sizes() {
            let conn = open_connection(":memory:").expect("Failed to open in-memory SQLite");
            let mut store = layout(name, &conn);
            setup_store(store.as_mut(), size);

            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| store.get_range(0, RANGE_LEN - 1).expect("range failed"));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_point_lookup, bench_range);
criterion_main!(benches);
