//! Run configuration, read from `EAV_BENCH_*` environment variables.
//!
//! The runner loads a `.env` file first (via `dotenvy`), so the same knobs
//! can be pinned per checkout. Unset variables fall back to the default
//! sweep of 1k, 10k and 100k vectors.

use crate::error::{BenchError, Result};
use crate::populate::DEFAULT_SEED;
use crate::schema::{Projection, SchemaSpec, MAX_COLUMNS};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DATABASE: &str = "EAV_BENCH_DB";
pub const ENV_TABLE_SIZES: &str = "EAV_BENCH_TABLE_SIZES";
pub const ENV_BATCH_SIZES: &str = "EAV_BENCH_BATCH_SIZES";
pub const ENV_ATTRIBUTES: &str = "EAV_BENCH_ATTRIBUTES";
pub const ENV_COLUMNS: &str = "EAV_BENCH_COLUMNS";
pub const ENV_TEST_RUNS: &str = "EAV_BENCH_TEST_RUNS";
pub const ENV_SEED: &str = "EAV_BENCH_SEED";
pub const ENV_VERIFY: &str = "EAV_BENCH_VERIFY";
pub const ENV_LOG_LEVEL: &str = "EAV_BENCH_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "EAV_BENCH_LOG_FILE";
pub const ENV_REPORT_JSON: &str = "EAV_BENCH_REPORT_JSON";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// SQLite path, or `:memory:`.
    pub database: String,
    /// Ascending; each layout grows from one size to the next.
    pub table_sizes: Vec<u32>,
    pub batch_sizes: Vec<u32>,
    /// Projection used for every read.
    pub attributes: Vec<u16>,
    pub columns: u16,
    pub test_runs: u32,
    pub seed: u64,
    /// Compare range results against the inserted vectors.
    pub verify: bool,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            database: ":memory:".to_string(),
            table_sizes: vec![1_000, 10_000, 100_000],
            batch_sizes: vec![100, 200],
            attributes: vec![0, 1, 2, 3, 4, 5],
            columns: 23,
            test_runs: 3,
            seed: DEFAULT_SEED,
            verify: true,
            log_level: LevelFilter::Info,
            log_file: None,
            report_json: None,
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(db) = get(ENV_DATABASE) {
            config.database = db.trim().to_string();
        }
        if let Some(raw) = get(ENV_TABLE_SIZES) {
            config.table_sizes = parse_list(ENV_TABLE_SIZES, &raw)?;
        }
        if let Some(raw) = get(ENV_BATCH_SIZES) {
            config.batch_sizes = parse_list(ENV_BATCH_SIZES, &raw)?;
        }
        if let Some(raw) = get(ENV_ATTRIBUTES) {
            config.attributes = parse_list(ENV_ATTRIBUTES, &raw)?;
        }
        if let Some(raw) = get(ENV_COLUMNS) {
            config.columns = parse_value(ENV_COLUMNS, &raw)?;
        }
        if let Some(raw) = get(ENV_TEST_RUNS) {
            config.test_runs = parse_value(ENV_TEST_RUNS, &raw)?;
        }
        if let Some(raw) = get(ENV_SEED) {
            config.seed = parse_value(ENV_SEED, &raw)?;
        }
        if let Some(raw) = get(ENV_VERIFY) {
            config.verify = parse_bool(ENV_VERIFY, &raw)?;
        }
        if let Some(raw) = get(ENV_LOG_LEVEL) {
            config.log_level = parse_value(ENV_LOG_LEVEL, &raw)?;
        }
        config.log_file = get(ENV_LOG_FILE).map(PathBuf::from);
        config.report_json = get(ENV_REPORT_JSON).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints and normalize the size sweep.
    pub fn validate(&mut self) -> Result<()> {
        self.table_sizes.sort_unstable();
        self.table_sizes.dedup();

        if self.table_sizes.is_empty() || self.table_sizes[0] == 0 {
            return Err(invalid(ENV_TABLE_SIZES, "need at least one non-zero size"));
        }
        if self.batch_sizes.is_empty() || self.batch_sizes.contains(&0) {
            return Err(invalid(ENV_BATCH_SIZES, "need at least one non-zero size"));
        }
        if self.test_runs == 0 {
            return Err(invalid(ENV_TEST_RUNS, "must be at least 1"));
        }
        if self.columns == 0 || self.columns > MAX_COLUMNS {
            return Err(invalid(
                ENV_COLUMNS,
                &format!("must be within 1..={MAX_COLUMNS}"),
            ));
        }
        self.schema_spec()
            .map_err(|err| invalid(ENV_ATTRIBUTES, &err.to_string()))?;
        Ok(())
    }

    pub fn schema_spec(&self) -> Result<SchemaSpec> {
        let projection = Projection::new(self.attributes.clone(), self.columns)?;
        SchemaSpec::new(self.columns, projection)
    }
}

fn invalid(var: &str, reason: &str) -> BenchError {
    BenchError::Config {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err: T::Err| invalid(var, &format!("`{}`: {err}", raw.trim())))
}

fn parse_list<T>(var: &str, raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| parse_value(var, item))
        .collect()
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(var, &format!("`{other}` is not a boolean"))),
    }
}
