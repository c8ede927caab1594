//! Integration tests: both layouts behind the `VectorStore` contract, checked
//! against each other and against the inserted data.

use eav_bench::config::BenchConfig;
use eav_bench::populate::generate_vectors;
use eav_bench::report::Phase;
use eav_bench::schema::condensed::CondensedLayout;
use eav_bench::schema::eav::EavLayout;
use eav_bench::schema::{open_connection, Projection, SchemaSpec, Vector, VectorStore};
use eav_bench::workload::{cross_validate, BenchmarkDriver};
use eav_bench::BenchError;
use rusqlite::Connection;

const COLUMNS: u16 = 6;

fn spec(attrs: &[u16]) -> SchemaSpec {
    SchemaSpec::new(COLUMNS, Projection::new(attrs.to_vec(), COLUMNS).unwrap()).unwrap()
}

fn layouts(conn: &Connection) -> Vec<Box<dyn VectorStore + '_>> {
    vec![
        Box::new(CondensedLayout::new(conn).unwrap()),
        Box::new(EavLayout::new(conn).unwrap()),
    ]
}

fn fill(store: &mut dyn VectorStore, vectors: &[Vector]) {
    for (i, v) in vectors.iter().enumerate() {
        assert_eq!(store.insert(v).unwrap(), i as u32, "{}", store.name());
    }
    store.commit().unwrap();
}

// ── Contract, per layout ────────────────────────────────────────────

#[test]
fn insert_then_read_back() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(20, COLUMNS, 7);
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[0, 1, 2, 3, 4, 5])).unwrap();
        fill(store.as_mut(), &data);

        assert_eq!(store.vector_count().unwrap(), 20);
        assert_eq!(store.get_by_id(0).unwrap().as_ref(), Some(&data[0]));
        assert_eq!(store.get_by_id(19).unwrap().as_ref(), Some(&data[19]));
        assert_eq!(store.get_by_id(20).unwrap(), None, "{}", store.name());
        assert_eq!(store.get_all().unwrap(), data);
    }
}

#[test]
fn range_is_inclusive_ordered_and_clipped() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(10, COLUMNS, 11);
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[1, 4])).unwrap();
        fill(store.as_mut(), &data);

        let expected: Vec<Vector> = data[3..=6].iter().map(|v| vec![v[1], v[4]]).collect();
        assert_eq!(store.get_range(3, 6).unwrap(), expected);
        assert_eq!(store.get_range(8, 100).unwrap().len(), 2);
        assert!(store.get_range(6, 3).unwrap().is_empty());
        assert!(store.get_range(50, 60).unwrap().is_empty());
        assert_eq!(store.get_range(5, 5).unwrap().len(), 1);
    }
}

#[test]
fn operations_before_create_schema_fail() {
    let conn = open_connection(":memory:").unwrap();
    for mut store in layouts(&conn) {
        assert!(matches!(
            store.insert(&[0.0; COLUMNS as usize]),
            Err(BenchError::NotInitialized)
        ));
        assert!(matches!(store.get_all(), Err(BenchError::NotInitialized)));
        assert!(matches!(
            store.set_projection(Projection::all(COLUMNS).unwrap()),
            Err(BenchError::NotInitialized)
        ));
    }
}

#[test]
fn create_schema_twice_starts_over() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(5, COLUMNS, 3);
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[0])).unwrap();
        fill(store.as_mut(), &data);

        store.create_schema(&spec(&[0])).unwrap();
        assert_eq!(store.vector_count().unwrap(), 0);
        assert_eq!(store.insert(&data[4]).unwrap(), 0, "{}", store.name());
        store.commit().unwrap();
        assert_eq!(store.get_by_id(0).unwrap(), Some(vec![data[4][0]]));
    }
}

#[test]
fn wrong_arity_leaves_store_unchanged() {
    let conn = open_connection(":memory:").unwrap();
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[0, 1])).unwrap();
        store.insert(&[1.0; COLUMNS as usize]).unwrap();
        store.commit().unwrap();

        for bad in [&[1.0, 2.0][..], &[0.5; COLUMNS as usize + 1][..], &[][..]] {
            assert!(matches!(
                store.insert(bad),
                Err(BenchError::ArityMismatch { .. })
            ));
        }
        assert_eq!(store.vector_count().unwrap(), 1);
        assert_eq!(store.insert(&[2.0; COLUMNS as usize]).unwrap(), 1);
        store.commit().unwrap();
    }
}

#[test]
fn nan_is_rejected_the_same_way_by_both_layouts() {
    let conn = open_connection(":memory:").unwrap();
    let mut vector = vec![0.25; COLUMNS as usize];
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[0, 3])).unwrap();
        store.insert(&vector).unwrap();
        store.commit().unwrap();

        vector[3] = f64::NAN;
        assert!(
            matches!(store.insert(&vector), Err(BenchError::NanValue { position: 3 })),
            "{}",
            store.name()
        );
        vector[3] = 0.25;

        assert_eq!(store.vector_count().unwrap(), 1);
        assert_eq!(store.get_all().unwrap(), vec![vec![0.25, 0.25]]);
        assert_eq!(store.insert(&vector).unwrap(), 1, "{}", store.name());
        store.commit().unwrap();
    }
}

#[test]
fn drop_failure_other_than_missing_table_is_fatal() {
    let conn = open_connection(":memory:").unwrap();
    conn.execute_batch(
        "CREATE VIEW vectors AS SELECT 1 AS x;
         CREATE VIEW vectors_eav AS SELECT 1 AS x;",
    )
    .unwrap();

    for mut store in layouts(&conn) {
        match store.create_schema(&spec(&[0])) {
            Err(BenchError::SchemaOperation { table, .. }) => {
                assert!(table.starts_with("vectors"), "{table}");
            }
            other => panic!("{}: expected SchemaOperation, got {other:?}", store.name()),
        }
        assert!(conn.is_autocommit(), "{} left a transaction open", store.name());
        assert!(matches!(store.get_all(), Err(BenchError::NotInitialized)));
    }
}

#[test]
fn rollback_discards_uncommitted_inserts() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(4, COLUMNS, 5);
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[2])).unwrap();
        fill(store.as_mut(), &data[..2]);

        store.insert(&data[2]).unwrap();
        store.insert(&data[3]).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.vector_count().unwrap(), 2, "{}", store.name());
        assert_eq!(store.get_by_id(2).unwrap(), None);
        assert_eq!(store.insert(&data[3]).unwrap(), 2, "{}", store.name());
        store.commit().unwrap();
        assert_eq!(store.get_by_id(2).unwrap(), Some(vec![data[3][2]]));
    }
}

#[test]
fn set_projection_changes_later_reads() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(3, COLUMNS, 9);
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[0, 1])).unwrap();
        fill(store.as_mut(), &data);

        store
            .set_projection(Projection::new(vec![5, 3], COLUMNS).unwrap())
            .unwrap();
        assert_eq!(store.get_by_id(1).unwrap(), Some(vec![data[1][5], data[1][3]]));

        // Out-of-range projections are rejected up front.
        assert!(matches!(
            Projection::new(vec![COLUMNS], COLUMNS),
            Err(BenchError::InvalidProjection(_))
        ));
    }
}

#[test]
fn dispose_is_idempotent_and_detaches() {
    let conn = open_connection(":memory:").unwrap();
    for mut store in layouts(&conn) {
        store.create_schema(&spec(&[0])).unwrap();
        store.dispose();
        store.dispose();
        assert!(matches!(store.get_all(), Err(BenchError::NotInitialized)));
    }
}

// ── Layout equivalence ──────────────────────────────────────────────

#[test]
fn layouts_agree_for_every_projection() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(30, COLUMNS, 21);
    let mut condensed = CondensedLayout::new(&conn).unwrap();
    let mut eav = EavLayout::new(&conn).unwrap();

    let projections: [&[u16]; 4] = [&[0, 1, 2, 3, 4, 5], &[5, 4, 3, 2, 1, 0], &[3], &[4, 0, 2]];
    for attrs in projections {
        condensed.create_schema(&spec(attrs)).unwrap();
        eav.create_schema(&spec(attrs)).unwrap();
        fill(&mut condensed, &data);
        fill(&mut eav, &data);

        let projection = Projection::new(attrs.to_vec(), COLUMNS).unwrap();
        for id in [0, 7, 29, 30] {
            let expected = data.get(id as usize).map(|v| projection.apply(v));
            assert_eq!(condensed.get_by_id(id).unwrap(), expected);
            assert_eq!(eav.get_by_id(id).unwrap(), expected);
        }
        assert_eq!(condensed.get_range(10, 19).unwrap(), eav.get_range(10, 19).unwrap());
        cross_validate(&mut condensed, &mut eav).unwrap();
    }
}

#[test]
fn rollback_through_either_layout_keeps_ids_dense() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(4, COLUMNS, 17);
    let mut condensed = CondensedLayout::new(&conn).unwrap();
    let mut eav = EavLayout::new(&conn).unwrap();
    condensed.create_schema(&spec(&[1])).unwrap();
    eav.create_schema(&spec(&[1])).unwrap();
    fill(&mut condensed, &data[..2]);
    fill(&mut eav, &data[..2]);

    // One connection, one transaction: rolling back via the condensed
    // layout discards the eav rows too.
    eav.insert(&data[2]).unwrap();
    condensed.insert(&data[2]).unwrap();
    condensed.rollback().unwrap();

    assert_eq!(eav.vector_count().unwrap(), 2);
    assert_eq!(eav.insert(&data[3]).unwrap(), 2);
    assert_eq!(condensed.insert(&data[3]).unwrap(), 2);
    eav.commit().unwrap();
    cross_validate(&mut condensed, &mut eav).unwrap();
}

#[test]
fn cross_validate_detects_divergence() {
    let conn = open_connection(":memory:").unwrap();
    let data = generate_vectors(3, COLUMNS, 2);
    let mut condensed = CondensedLayout::new(&conn).unwrap();
    let mut eav = EavLayout::new(&conn).unwrap();
    condensed.create_schema(&spec(&[0, 1])).unwrap();
    eav.create_schema(&spec(&[0, 1])).unwrap();
    fill(&mut condensed, &data);
    fill(&mut eav, &data);

    assert!(condensed.write_values(1, &[-1.0, -2.0]).unwrap());
    condensed.commit().unwrap();
    assert!(matches!(
        cross_validate(&mut condensed, &mut eav),
        Err(BenchError::VerificationFailed { .. })
    ));

    eav.insert(&data[0]).unwrap();
    eav.commit().unwrap();
    assert!(cross_validate(&mut condensed, &mut eav).is_err());
}

// ── Persistence ─────────────────────────────────────────────────────

#[test]
fn open_schema_resumes_ids_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.db");
    let path = path.to_str().unwrap();
    let data = generate_vectors(6, COLUMNS, 13);

    {
        let conn = open_connection(path).unwrap();
        for mut store in layouts(&conn) {
            store.create_schema(&spec(&[0, 5])).unwrap();
            fill(store.as_mut(), &data[..4]);
        }
    }

    let conn = open_connection(path).unwrap();
    for mut store in layouts(&conn) {
        store.open_schema(&spec(&[5, 0])).unwrap();
        assert_eq!(store.vector_count().unwrap(), 4);
        assert_eq!(store.get_by_id(3).unwrap(), Some(vec![data[3][5], data[3][0]]));
        assert_eq!(store.insert(&data[4]).unwrap(), 4, "{}", store.name());
        store.commit().unwrap();
    }
}

#[test]
fn open_schema_rejects_missing_or_mismatched_tables() {
    let conn = open_connection(":memory:").unwrap();
    for mut store in layouts(&conn) {
        assert!(matches!(
            store.open_schema(&spec(&[0])),
            Err(BenchError::SchemaMismatch { .. })
        ));
    }

    let mut condensed = CondensedLayout::new(&conn).unwrap();
    condensed.create_schema(&spec(&[0])).unwrap();
    let wider = SchemaSpec::new(COLUMNS + 1, Projection::all(COLUMNS + 1).unwrap()).unwrap();
    assert!(matches!(
        condensed.open_schema(&wider),
        Err(BenchError::SchemaMismatch { .. })
    ));
}

// ── Driver ──────────────────────────────────────────────────────────

fn small_config() -> BenchConfig {
    let mut config = BenchConfig {
        table_sizes: vec![40, 15],
        batch_sizes: vec![5, 20],
        attributes: vec![4, 1, 2],
        columns: COLUMNS,
        test_runs: 2,
        ..BenchConfig::default()
    };
    config.validate().unwrap();
    config
}

#[test]
fn driver_sweeps_both_layouts_and_they_agree() {
    let config = small_config();
    let conn = open_connection(&config.database).unwrap();
    let driver = BenchmarkDriver::new(&config);
    let mut condensed = CondensedLayout::new(&conn).unwrap();
    let mut eav = EavLayout::new(&conn).unwrap();

    let condensed_results = driver.run(&mut condensed).unwrap();
    let eav_results = driver.run(&mut eav).unwrap();

    // Per table size: fill + commit, then per batch size: runs + one range.
    let per_size = 2 + config.batch_sizes.len() * (config.test_runs as usize + 1);
    assert_eq!(condensed_results.len(), config.table_sizes.len() * per_size);
    assert_eq!(eav_results.len(), condensed_results.len());

    let fills: Vec<u64> = eav_results
        .iter()
        .filter(|r| r.phase == Phase::Fill)
        .map(|r| r.summary.count)
        .collect();
    assert_eq!(fills, vec![15, 25]);
    assert!(eav_results.iter().all(|r| r.layout == "eav"));

    assert_eq!(condensed.vector_count().unwrap(), 40);
    assert_eq!(eav.vector_count().unwrap(), 40);
    cross_validate(&mut condensed, &mut eav).unwrap();
}
