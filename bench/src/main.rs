//! Standalone benchmark runner that prints the formatted report.
//!
//! Every knob is read from `EAV_BENCH_*` environment variables (a `.env` file
//! in the working directory is loaded first). See `.env.example`.
//!
//! Usage:
//!   cargo run --release
//!   EAV_BENCH_TABLE_SIZES=1000,5000 EAV_BENCH_DB=bench.db cargo run --release

use anyhow::Context;
use eav_bench::config::BenchConfig;
use eav_bench::report::{print_report, write_json, PhaseResult};
use eav_bench::schema::condensed::CondensedLayout;
use eav_bench::schema::eav::EavLayout;
use eav_bench::schema::{open_connection, VectorStore};
use eav_bench::workload::{cross_validate, BenchmarkDriver};

fn run_layout(
    driver: &BenchmarkDriver,
    store: &mut dyn VectorStore,
) -> anyhow::Result<Vec<PhaseResult>> {
    log::info!("benchmarking {} layout", store.name());
    let results = driver
        .run(store)
        .with_context(|| format!("{} layout benchmark failed", store.name()))?;
    log::info!("{} layout done ({} result rows)", store.name(), results.len());
    Ok(results)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BenchConfig::from_env().context("invalid benchmark configuration")?;
    vecbench_core::initialize_logger(config.log_level, config.log_file.as_deref())
        .context("failed to initialize logger")?;

    println!("Running EAV vs. condensed layout benchmark...");
    println!("  Database:     {}", config.database);
    println!("  Table sizes:  {:?}", config.table_sizes);
    println!("  Batch sizes:  {:?}", config.batch_sizes);
    println!("  Columns:      {}", config.columns);
    println!("  Projection:   {:?}", config.attributes);
    println!("  Test runs:    {}", config.test_runs);

    let conn = open_connection(&config.database)
        .with_context(|| format!("failed to open database {}", config.database))?;

    let driver = BenchmarkDriver::new(&config);
    let mut condensed = CondensedLayout::new(&conn)?;
    let mut eav = EavLayout::new(&conn)?;

    let mut results = run_layout(&driver, &mut condensed)?;
    results.extend(run_layout(&driver, &mut eav)?);

    if config.verify {
        cross_validate(&mut condensed, &mut eav).context("layouts disagree")?;
    }

    print_report(&results);

    if let Some(path) = &config.report_json {
        write_json(path, &results)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote JSON report to {}", path.display());
    }

    condensed.dispose();
    eav.dispose();
    Ok(())
}
