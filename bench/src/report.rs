//! Report module: prints per-phase timings and a layout comparison, and
//! optionally writes the raw results as JSON.

use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use vecbench_core::{TimingStatistics, TimingSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fill,
    Commit,
    RandomAccess,
    Range,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Fill => "fill (per insert)",
            Phase::Commit => "commit",
            Phase::RandomAccess => "random access",
            Phase::Range => "range",
        }
    }
}

/// Timing summary of one phase of one layout at one table size.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub layout: String,
    pub phase: Phase,
    pub table_size: u32,
    /// 0 for phases that do not depend on a batch size.
    pub batch_size: u32,
    /// Set for phases reported once per test run.
    pub run: Option<u32>,
    pub summary: TimingSummary,
}

impl PhaseResult {
    pub fn new(
        layout: &str,
        phase: Phase,
        table_size: u32,
        batch_size: u32,
        run: Option<u32>,
        stats: &TimingStatistics,
    ) -> Result<Self> {
        Ok(Self {
            layout: layout.to_string(),
            phase,
            table_size,
            batch_size,
            run,
            summary: stats.summary()?,
        })
    }
}

/// Mean over all results matching the key, weighting each by its sample count.
fn pooled_mean<'a>(results: impl Iterator<Item = &'a PhaseResult>) -> Option<f64> {
    let (total, count) = results.fold((0.0, 0u64), |(total, count), r| {
        (
            total + r.summary.mean_ms * r.summary.count as f64,
            count + r.summary.count,
        )
    });
    (count > 0).then(|| total / count as f64)
}

/// Print a formatted report of every phase followed by a per-layout comparison.
pub fn print_report(results: &[PhaseResult]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = write_report(&mut out, results) {
        log::error!("failed to print report: {err}");
    }
}

pub fn write_report(out: &mut impl Write, results: &[PhaseResult]) -> io::Result<()> {
    writeln!(out, "\n{}", "=".repeat(80))?;
    writeln!(out, "  EAV vs. condensed layout benchmark")?;
    writeln!(out, "{}", "=".repeat(80))?;

    let mut layouts: Vec<&str> = Vec::new();
    for r in results {
        if !layouts.contains(&r.layout.as_str()) {
            layouts.push(&r.layout);
        }
    }

    for layout in &layouts {
        writeln!(out, "\n  Layout: {layout}")?;
        writeln!(out, "  {}", "-".repeat(76))?;
        writeln!(
            out,
            "  {:20} {:>10} {:>6} {:>4} {:>7} {:>10} {:>10} {:>10}",
            "Phase", "Table", "Batch", "Run", "Samples", "Mean (ms)", "Std (ms)", "Max (ms)"
        )?;
        for r in results.iter().filter(|r| r.layout == *layout) {
            let run = r.run.map_or_else(|| "-".to_string(), |run| run.to_string());
            writeln!(
                out,
                "  {:20} {:>10} {:>6} {:>4} {:>7} {:>10.4} {:>10.4} {:>10.4}",
                r.phase.label(),
                r.table_size,
                r.batch_size,
                run,
                r.summary.count,
                r.summary.mean_ms,
                r.summary.std_dev_ms,
                r.summary.max_ms
            )?;
        }
    }

    writeln!(out, "\n{}", "=".repeat(80))?;

    if layouts.len() >= 2 {
        let (base, other) = (layouts[0], layouts[1]);
        writeln!(out, "\n  Comparison Summary ({other} / {base}):")?;
        writeln!(
            out,
            "  {:20} {:>10} {:>6} {:>14} {:>14} {:>8}",
            "Phase",
            "Table",
            "Batch",
            format!("{base} (ms)"),
            format!("{other} (ms)"),
            "Ratio"
        )?;
        writeln!(out, "  {}", "-".repeat(76))?;

        let mut keys: Vec<(Phase, u32, u32)> = results
            .iter()
            .map(|r| (r.phase, r.table_size, r.batch_size))
            .collect();
        keys.sort_unstable_by_key(|&(phase, size, batch)| (size, phase, batch));
        keys.dedup();

        for (phase, table_size, batch_size) in keys {
            let mean_for = |layout: &str| {
                pooled_mean(results.iter().filter(|r| {
                    r.layout == layout
                        && r.phase == phase
                        && r.table_size == table_size
                        && r.batch_size == batch_size
                }))
            };
            if let (Some(b), Some(o)) = (mean_for(base), mean_for(other)) {
                let ratio = if b > 0.0 { o / b } else { f64::NAN };
                writeln!(
                    out,
                    "  {:20} {:>10} {:>6} {:>14.4} {:>14.4} {:>8.2}",
                    phase.label(),
                    table_size,
                    batch_size,
                    b,
                    o,
                    ratio
                )?;
            }
        }
    }

    writeln!(out)?;
    Ok(())
}

/// Write all results as a pretty-printed JSON array.
pub fn write_json(path: &Path, results: &[PhaseResult]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
