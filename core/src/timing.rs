use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsError {
    #[error("no timing samples have been recorded")]
    Underflow,
    #[error("stop() called without a preceding start()")]
    NotStarted,
}

/// Point-in-time view of a [`TimingStatistics`], in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub count: u64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Online accumulator for elapsed-time samples of one measured phase.
///
/// Samples are folded in with Welford's update, so the running mean and the
/// sum of squared deviations never need the full sample list. The reported
/// standard deviation is the population one (divide by `n`).
///
/// Not meant to be shared between threads: every mutation takes `&mut self`.
#[derive(Debug, Default, Clone)]
pub struct TimingStatistics {
    started: Option<Instant>,
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl TimingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a sample.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, instant: Instant) {
        self.started = Some(instant);
    }

    /// Close the current sample and fold its duration into the statistics.
    ///
    /// The start mark is kept, so calling `stop` twice measures both samples
    /// from the same start.
    pub fn stop(&mut self) -> Result<Duration, StatisticsError> {
        self.stop_at(Instant::now())
    }

    pub fn stop_at(&mut self, instant: Instant) -> Result<Duration, StatisticsError> {
        let started = self.started.ok_or(StatisticsError::NotStarted)?;
        let elapsed = instant.saturating_duration_since(started);
        self.record(elapsed);
        Ok(elapsed)
    }

    /// Fold an already measured duration into the statistics.
    pub fn record(&mut self, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1e3;

        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);

        if self.count == 1 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean sample duration in milliseconds.
    pub fn average(&self) -> Result<f64, StatisticsError> {
        self.ensure_samples()?;
        Ok(self.mean)
    }

    /// Population standard deviation in milliseconds.
    pub fn std_dev(&self) -> Result<f64, StatisticsError> {
        self.ensure_samples()?;
        // m2 can dip a hair below zero through rounding when all samples match.
        Ok((self.m2 / self.count as f64).max(0.0).sqrt())
    }

    pub fn min(&self) -> Result<f64, StatisticsError> {
        self.ensure_samples()?;
        Ok(self.min)
    }

    pub fn max(&self) -> Result<f64, StatisticsError> {
        self.ensure_samples()?;
        Ok(self.max)
    }

    pub fn summary(&self) -> Result<TimingSummary, StatisticsError> {
        Ok(TimingSummary {
            count: self.count,
            mean_ms: self.average()?,
            std_dev_ms: self.std_dev()?,
            min_ms: self.min()?,
            max_ms: self.max()?,
        })
    }

    /// Forget all samples. An in-flight `start()` survives.
    pub fn clear(&mut self) {
        self.count = 0;
        self.mean = 0.0;
        self.m2 = 0.0;
        self.min = 0.0;
        self.max = 0.0;
    }

    fn ensure_samples(&self) -> Result<(), StatisticsError> {
        if self.count == 0 {
            return Err(StatisticsError::Underflow);
        }
        Ok(())
    }
}
