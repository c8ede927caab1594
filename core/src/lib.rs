//! Shared pieces of the vector layout benchmark.
//!
//! - [`timing::TimingStatistics`] accumulates elapsed-time samples.
//! - [`initialize_logger`] wires the `log` facade to log4rs appenders.

use anyhow::Context;
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::path::Path;

pub mod timing;

pub use timing::{StatisticsError, TimingStatistics, TimingSummary};

const LOGGING_PATTERN: &str = "{d} {l} {f}:{L} - {m}\n";

/// Route `log` records to stderr, and to `file_path` when given.
///
/// The console only shows records at `log_level` or above. The file appender
/// receives everything down to `Trace` so a run can be inspected afterwards
/// without re-running it at a noisier level.
pub fn initialize_logger(log_level: LevelFilter, file_path: Option<&Path>) -> anyhow::Result<()> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOGGING_PATTERN)))
        .build();

    let mut config_builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(log_level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");
    let mut root_level = log_level;

    if let Some(path) = file_path {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOGGING_PATTERN)))
            .build(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        config_builder =
            config_builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
        root_level = LevelFilter::Trace;
    }

    let config = config_builder
        .build(root.build(root_level))
        .context("building log4rs configuration")?;

    log4rs::init_config(config).context("installing logger")?;
    Ok(())
}
