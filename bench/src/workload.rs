//! Benchmark driver: pushes one layout through the fill / random access /
//! range sweep and records a [`TimingStatistics`] summary per phase.
//!
//! | Phase         | Per table size                   | Samples                 |
//! |---------------|----------------------------------|-------------------------|
//! | Fill          | insert up to the new size        | one per insert          |
//! | Commit        | commit the fill                  | one                     |
//! | Random access | per batch size, per test run     | `batch_size` lookups    |
//! | Range         | per batch size                   | `test_runs` range reads |
//!
//! Both layouts see identical vectors and probe identical ids for a given
//! seed, which is what makes their numbers (and results) comparable.

use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::populate::VectorGenerator;
use crate::report::{Phase, PhaseResult};
use crate::schema::{Projection, Vector, VectorId, VectorStore};
use vecbench_core::TimingStatistics;

/// Probe ids come from their own stream so they do not shift with the data.
const PROBE_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// Runs the sweep in `config` against one layout.
pub struct BenchmarkDriver<'a> {
    config: &'a BenchConfig,
}

impl<'a> BenchmarkDriver<'a> {
    pub fn new(config: &'a BenchConfig) -> Self {
        Self { config }
    }

    /// Create the layout's schema and run the whole sweep against it.
    ///
    /// The layout is left populated (and its statements prepared) so callers
    /// can cross-check it against another layout afterwards.
    pub fn run(&self, store: &mut dyn VectorStore) -> Result<Vec<PhaseResult>> {
        let config = self.config;
        let spec = config.schema_spec()?;
        store.create_schema(&spec)?;

        let mut data = VectorGenerator::new(config.columns, config.seed);
        let mut probes =
            VectorGenerator::new(config.columns, config.seed.wrapping_add(PROBE_SEED_OFFSET));
        let mut expected: Vec<Vector> = Vec::new();
        let mut results = Vec::new();
        let mut current_size: u32 = 0;

        for &table_size in &config.table_sizes {
            log::info!(
                "{}: filling table from {current_size} to {table_size} vectors",
                store.name()
            );
            results.extend(self.fill(
                store,
                &mut data,
                spec.projection(),
                &mut expected,
                current_size,
                table_size,
            )?);
            current_size = table_size;

            for &batch_size in &config.batch_sizes {
                results.extend(self.random_access(
                    store,
                    &mut probes,
                    &expected,
                    table_size,
                    batch_size,
                )?);
                results.push(self.range(store, &expected, table_size, batch_size)?);
            }
        }
        Ok(results)
    }

    fn fill(
        &self,
        store: &mut dyn VectorStore,
        data: &mut VectorGenerator,
        projection: &Projection,
        expected: &mut Vec<Vector>,
        from_size: u32,
        to_size: u32,
    ) -> Result<[PhaseResult; 2]> {
        let mut inserts = TimingStatistics::new();
        for _ in from_size..to_size {
            let vector = data.next_vector();
            inserts.start();
            store.insert(&vector)?;
            inserts.stop()?;
            if self.config.verify {
                expected.push(projection.apply(&vector));
            }
        }

        let mut commit = TimingStatistics::new();
        commit.start();
        store.commit()?;
        commit.stop()?;
        log::info!(
            "{}: inserted {} vectors, mean {:.4}ms",
            store.name(),
            inserts.count(),
            inserts.average()?
        );

        Ok([
            PhaseResult::new(store.name(), Phase::Fill, to_size, 0, None, &inserts)?,
            PhaseResult::new(store.name(), Phase::Commit, to_size, 0, None, &commit)?,
        ])
    }

    fn random_access(
        &self,
        store: &mut dyn VectorStore,
        probes: &mut VectorGenerator,
        expected: &[Vector],
        table_size: u32,
        batch_size: u32,
    ) -> Result<Vec<PhaseResult>> {
        let mut results = Vec::with_capacity(self.config.test_runs as usize);
        let mut lookups = TimingStatistics::new();

        for run in 0..self.config.test_runs {
            for _ in 0..batch_size {
                let id = probes.random_id(table_size);
                lookups.start();
                let vector = store.get_by_id(id)?;
                lookups.stop()?;
                if self.config.verify {
                    self.check_lookup(store.name(), id, vector.as_ref(), expected)?;
                }
            }
            log::info!(
                "{}: random access run {run}, table {table_size}, batch {batch_size}: \
                 avg {:.4}ms, std {:.4}ms",
                store.name(),
                lookups.average()?,
                lookups.std_dev()?
            );
            results.push(PhaseResult::new(
                store.name(),
                Phase::RandomAccess,
                table_size,
                batch_size,
                Some(run),
                &lookups,
            )?);
            lookups.clear();
        }
        Ok(results)
    }

    fn range(
        &self,
        store: &mut dyn VectorStore,
        expected: &[Vector],
        table_size: u32,
        batch_size: u32,
    ) -> Result<PhaseResult> {
        let mut scans = TimingStatistics::new();
        let last: VectorId = batch_size - 1;

        for _ in 0..self.config.test_runs {
            scans.start();
            let vectors = store.get_range(0, last)?;
            scans.stop()?;
            if self.config.verify {
                self.check_range(store.name(), &vectors, expected, batch_size)?;
            }
        }
        log::info!(
            "{}: range 0..={last}, table {table_size}: avg {:.4}ms, std {:.4}ms",
            store.name(),
            scans.average()?,
            scans.std_dev()?
        );
        PhaseResult::new(
            store.name(),
            Phase::Range,
            table_size,
            batch_size,
            None,
            &scans,
        )
    }

    fn check_lookup(
        &self,
        layout: &str,
        id: VectorId,
        actual: Option<&Vector>,
        expected: &[Vector],
    ) -> Result<()> {
        let wanted = expected.get(id as usize);
        if actual != wanted {
            return Err(BenchError::VerificationFailed {
                layout: layout.to_string(),
                detail: format!("lookup of id {id} returned {actual:?}, expected {wanted:?}"),
            });
        }
        Ok(())
    }

    fn check_range(
        &self,
        layout: &str,
        actual: &[Vector],
        expected: &[Vector],
        batch_size: u32,
    ) -> Result<()> {
        let wanted = &expected[..expected.len().min(batch_size as usize)];
        if actual.len() != wanted.len() {
            return Err(BenchError::VerificationFailed {
                layout: layout.to_string(),
                detail: format!(
                    "range returned {} vectors, expected {}",
                    actual.len(),
                    wanted.len()
                ),
            });
        }
        if let Some(pos) = actual.iter().zip(wanted).position(|(a, w)| a != w) {
            return Err(BenchError::VerificationFailed {
                layout: layout.to_string(),
                detail: format!("range vector {pos} differs from the inserted one"),
            });
        }
        Ok(())
    }
}

/// Check that two layouts hold the same vectors under their projections.
pub fn cross_validate(left: &mut dyn VectorStore, right: &mut dyn VectorStore) -> Result<()> {
    let left_all = left.get_all()?;
    let right_all = right.get_all()?;

    if left_all.len() != right_all.len() {
        return Err(BenchError::VerificationFailed {
            layout: format!("{}/{}", left.name(), right.name()),
            detail: format!(
                "{} holds {} vectors, {} holds {}",
                left.name(),
                left_all.len(),
                right.name(),
                right_all.len()
            ),
        });
    }
    if let Some(id) = left_all.iter().zip(&right_all).position(|(l, r)| l != r) {
        return Err(BenchError::VerificationFailed {
            layout: format!("{}/{}", left.name(), right.name()),
            detail: format!("vector {id} differs between layouts"),
        });
    }
    log::info!(
        "{} and {} agree on all {} vectors",
        left.name(),
        right.name(),
        left_all.len()
    );
    Ok(())
}
