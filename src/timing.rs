//! Timing engine: repeated kernel executions under controlled conditions
//!
//! Every measured launch is bracketed by device synchronization barriers,
//! one before the clock starts and one before it stops, so asynchronous
//! launch queuing cannot corrupt elapsed-time readings. Warm-up launches
//! run through the same path and are literally discarded: their outputs
//! and durations are never recorded, which keeps one-time compilation and
//! allocation cost out of the samples. Statistics are computed once over
//! an explicit immutable sequence of durations, never from incrementally
//! mutated counters.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BarridoError, Result};
use crate::launch::{KernelLauncher, LaunchConfig};
use crate::pattern::{InputPattern, PatternKind};

// ============================================================================
// Timing options
// ============================================================================

/// Repetition and watchdog parameters for one timed cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingOptions {
    /// Number of timed executions recorded per cell
    pub runs: usize,
    /// Untimed launches executed and discarded before measurement begins
    pub warmup_launches: usize,
    /// Per-launch watchdog timeout; `Duration::ZERO` disables the watchdog
    pub launch_timeout: Duration,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self {
            runs: 10,
            warmup_launches: 1,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl TimingOptions {
    /// Set the number of timed runs
    #[must_use]
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    /// Set the number of discarded warm-up launches
    #[must_use]
    pub fn with_warmup_launches(mut self, warmup_launches: usize) -> Self {
        self.warmup_launches = warmup_launches;
        self
    }

    /// Set the per-launch watchdog timeout
    #[must_use]
    pub fn with_launch_timeout(mut self, launch_timeout: Duration) -> Self {
        self.launch_timeout = launch_timeout;
        self
    }

    /// Validate option values
    ///
    /// # Errors
    ///
    /// Returns [`BarridoError::InvalidConfig`] when `runs` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            return Err(BarridoError::InvalidConfig {
                reason: "runs must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Timing sample
// ============================================================================

/// Timing distribution for one `(pattern, config)` cell
///
/// `raw_times` holds exactly `runs` elapsed durations; `mean` and `stddev`
/// are computed once at construction and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSample {
    /// Configuration the cell was launched with
    pub config: LaunchConfig,
    /// Pattern the cell was timed against
    pub pattern: PatternKind,
    /// Elapsed duration of each timed run, in execution order
    pub raw_times: Vec<Duration>,
    /// Arithmetic mean of `raw_times`
    pub mean: Duration,
    /// Sample standard deviation (n−1) of `raw_times`
    pub stddev: Duration,
}

impl TimingSample {
    /// Compute a sample from raw run durations.
    ///
    /// # Panics
    ///
    /// Panics if `raw_times` is empty; the timing engine always records
    /// at least one run.
    #[must_use]
    pub fn from_times(config: LaunchConfig, pattern: PatternKind, raw_times: Vec<Duration>) -> Self {
        assert!(!raw_times.is_empty(), "raw_times must not be empty");

        let n = raw_times.len();
        let sum_nanos: u128 = raw_times.iter().map(Duration::as_nanos).sum();
        let mean_nanos = sum_nanos / n as u128;
        let mean = Duration::from_nanos(mean_nanos as u64);

        let variance: f64 = raw_times
            .iter()
            .map(|t| {
                let diff = t.as_nanos() as f64 - mean_nanos as f64;
                diff * diff
            })
            .sum::<f64>()
            / (n as f64 - 1.0).max(1.0);
        let stddev = Duration::from_nanos(variance.sqrt() as u64);

        Self {
            config,
            pattern,
            raw_times,
            mean,
            stddev,
        }
    }

    /// Mean elapsed time in milliseconds
    #[must_use]
    pub fn mean_ms(&self) -> f64 {
        self.mean.as_secs_f64() * 1_000.0
    }

    /// Standard deviation in milliseconds
    #[must_use]
    pub fn stddev_ms(&self) -> f64 {
        self.stddev.as_secs_f64() * 1_000.0
    }
}

// ============================================================================
// Timing engine
// ============================================================================

/// Time one `(pattern, config)` cell: warm up, then record exactly
/// `opts.runs` barrier-bracketed executions.
///
/// # Errors
///
/// - [`BarridoError::InvalidConfig`] when options are malformed or the
///   configuration does not match the pattern length (a harness bug, not
///   a device failure; fatal to the sweep).
/// - [`BarridoError::KernelLaunch`] when any launch fails or exceeds the
///   watchdog timeout; carries the cell coordinates so the sweep can
///   record the failure and continue.
pub fn time_kernel(
    launcher: &Arc<dyn KernelLauncher>,
    pattern: &Arc<InputPattern>,
    config: LaunchConfig,
    opts: &TimingOptions,
) -> Result<TimingSample> {
    opts.validate()?;
    if pattern.len() != config.total_elements {
        return Err(BarridoError::InvalidConfig {
            reason: format!(
                "config covers {} elements but pattern '{}' has {}",
                config.total_elements,
                pattern.kind,
                pattern.len()
            ),
        });
    }

    let cell_err = |source: BarridoError| match source {
        already @ BarridoError::KernelLaunch { .. } => already,
        other => BarridoError::KernelLaunch {
            pattern: pattern.kind.as_str().to_string(),
            block_size: config.block_size,
            reason: other.to_string(),
        },
    };

    for i in 0..opts.warmup_launches {
        debug!(
            pattern = %pattern.kind,
            block_size = config.block_size,
            warmup = i + 1,
            "warm-up launch (discarded)"
        );
        timed_launch(launcher, pattern, config, opts.launch_timeout).map_err(cell_err)?;
    }

    let mut raw_times = Vec::with_capacity(opts.runs);
    for _ in 0..opts.runs {
        let elapsed =
            timed_launch(launcher, pattern, config, opts.launch_timeout).map_err(cell_err)?;
        raw_times.push(elapsed);
    }

    let sample = TimingSample::from_times(config, pattern.kind, raw_times);
    debug!(
        pattern = %pattern.kind,
        block_size = config.block_size,
        mean_ms = sample.mean_ms(),
        stddev_ms = sample.stddev_ms(),
        "cell timed"
    );
    Ok(sample)
}

/// One barrier-bracketed execution, measured on the launch thread.
///
/// With a nonzero timeout the launch runs on a watchdog worker; expiry is
/// reported as a launch failure and the worker is abandoned (a hung
/// device call cannot be cancelled from safe host code). The clock runs
/// inside the worker, between the two barriers, so watchdog plumbing
/// never lands in the measured window.
fn timed_launch(
    launcher: &Arc<dyn KernelLauncher>,
    pattern: &Arc<InputPattern>,
    config: LaunchConfig,
    timeout: Duration,
) -> Result<Duration> {
    if timeout.is_zero() {
        return measure(launcher.as_ref(), pattern, &config);
    }

    let (tx, rx) = mpsc::channel();
    let worker_launcher = Arc::clone(launcher);
    let worker_pattern = Arc::clone(pattern);
    let handle = thread::Builder::new()
        .name("barrido-launch".to_string())
        .spawn(move || {
            let _ = tx.send(measure(worker_launcher.as_ref(), &worker_pattern, &config));
        })
        .map_err(|e| BarridoError::Device {
            reason: format!("failed to spawn launch worker: {e}"),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = handle.join();
            result
        }
        Err(_) => Err(BarridoError::KernelLaunch {
            pattern: pattern.kind.as_str().to_string(),
            block_size: config.block_size,
            reason: format!("launch exceeded timeout of {timeout:?}"),
        }),
    }
}

fn measure(
    launcher: &dyn KernelLauncher,
    pattern: &InputPattern,
    config: &LaunchConfig,
) -> Result<Duration> {
    launcher.synchronize()?;
    let start = Instant::now();
    let _output = launcher.launch(pattern, config)?;
    launcher.synchronize()?;
    Ok(start.elapsed())
}
