//! Sweep controller: the full experiment matrix and its result aggregate
//!
//! Runs 3 patterns × N block sizes strictly sequentially on a single
//! launcher, so concurrent launches can never overlap on the device and
//! skew timings. Cells are independent: a device failure in one cell is
//! recorded and the sweep continues, returning partial coverage plus an
//! explicit failure list rather than aborting on first error.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BarridoError, Result};
use crate::launch::{KernelLauncher, LaunchConfig, LauncherInfo};
use crate::metrics::{derive_metrics, DerivedMetrics};
use crate::pattern::{InputPattern, PatternKind};
use crate::timing::{time_kernel, TimingOptions, TimingSample};

// ============================================================================
// Sweep configuration
// ============================================================================

/// Parameters for one full sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Elements per input pattern
    pub total_elements: usize,
    /// Threshold as a fraction of the value range (0.5 splits in half)
    pub threshold_fraction: f32,
    /// Block sizes to sweep, in execution order
    pub block_sizes: Vec<u32>,
    /// Timed runs per cell
    pub runs: usize,
    /// Discarded warm-up launches per cell
    pub warmup_launches: usize,
    /// Per-launch watchdog timeout; `Duration::ZERO` disables it
    pub launch_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            total_elements: 1_048_576,
            threshold_fraction: 0.5,
            block_sizes: vec![32, 64, 128, 256, 512, 1024],
            runs: 10,
            warmup_launches: 1,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl SweepConfig {
    /// Create a config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of elements per pattern
    #[must_use]
    pub fn with_total_elements(mut self, total_elements: usize) -> Self {
        self.total_elements = total_elements;
        self
    }

    /// Set the threshold fraction
    #[must_use]
    pub fn with_threshold_fraction(mut self, threshold_fraction: f32) -> Self {
        self.threshold_fraction = threshold_fraction;
        self
    }

    /// Set the block sizes to sweep
    #[must_use]
    pub fn with_block_sizes(mut self, block_sizes: Vec<u32>) -> Self {
        self.block_sizes = block_sizes;
        self
    }

    /// Set the timed runs per cell
    #[must_use]
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    /// Set the discarded warm-up launches per cell
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

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`BarridoError::InvalidConfig`] when elements, runs, or
    /// the block-size list is empty, or any block size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.total_elements == 0 {
            return Err(BarridoError::InvalidConfig {
                reason: "total_elements must be at least 1".to_string(),
            });
        }
        if self.runs == 0 {
            return Err(BarridoError::InvalidConfig {
                reason: "runs must be at least 1".to_string(),
            });
        }
        if self.block_sizes.is_empty() {
            return Err(BarridoError::InvalidConfig {
                reason: "block_sizes must not be empty".to_string(),
            });
        }
        if let Some(&zero) = self.block_sizes.iter().find(|&&b| b == 0) {
            return Err(BarridoError::InvalidConfig {
                reason: format!("block size {zero} is not positive"),
            });
        }
        if !self.threshold_fraction.is_finite() {
            return Err(BarridoError::InvalidConfig {
                reason: "threshold_fraction must be finite".to_string(),
            });
        }
        Ok(())
    }

    fn timing_options(&self) -> TimingOptions {
        TimingOptions::default()
            .with_runs(self.runs)
            .with_warmup_launches(self.warmup_launches)
            .with_launch_timeout(self.launch_timeout)
    }
}

// ============================================================================
// Result aggregate
// ============================================================================

/// One `(block_size, pattern)` cell that failed to execute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCell {
    /// Block size of the failed cell
    pub block_size: u32,
    /// Pattern of the failed cell
    pub pattern: PatternKind,
    /// Why the cell failed
    pub reason: String,
}

/// Results for one block size: its timed samples and, when all three
/// patterns succeeded, the derived metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    /// Block size the entry describes
    pub block_size: u32,
    /// Timed samples for the patterns that succeeded
    pub samples: Vec<TimingSample>,
    /// Derived metrics; `None` when any of the three cells failed
    pub metrics: Option<DerivedMetrics>,
}

/// The complete sweep record, read-only once returned
///
/// This is the harness's external surface: reporting and plotting code
/// consumes it (typically as JSON) and must show failed cells distinctly
/// from measured ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResults {
    /// The configuration the sweep ran with
    pub config: SweepConfig,
    /// The launcher that executed the cells
    pub launcher: LauncherInfo,
    /// One entry per swept block size, in sweep order
    pub entries: Vec<SweepEntry>,
    /// Cells that failed, in the order the failures occurred
    pub failures: Vec<FailedCell>,
}

impl SweepResults {
    /// Entry for a specific block size
    #[must_use]
    pub fn entry(&self, block_size: u32) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.block_size == block_size)
    }

    /// Sample for a specific cell
    #[must_use]
    pub fn sample(&self, block_size: u32, pattern: PatternKind) -> Option<&TimingSample> {
        self.entry(block_size)?
            .samples
            .iter()
            .find(|s| s.pattern == pattern)
    }

    /// Total number of timed samples across all entries
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.entries.iter().map(|e| e.samples.len()).sum()
    }

    /// Whether every cell of the matrix was measured
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Render the results as markdown tables: per-cell timings first,
    /// then per-block-size metrics. Failed cells appear as explicit rows.
    #[must_use]
    pub fn to_markdown_table(&self) -> String {
        let mut table = String::new();

        table.push_str("| Block Size | Pattern | Mean | Std Dev | Runs | Status |\n");
        table.push_str("|-----------:|---------|------:|--------:|-----:|--------|\n");
        for entry in &self.entries {
            for kind in PatternKind::all() {
                if let Some(sample) = entry.samples.iter().find(|s| s.pattern == kind) {
                    let _ = writeln!(
                        table,
                        "| {} | {} | {:.3}ms | {:.3}ms | {} | ok |",
                        entry.block_size,
                        kind,
                        sample.mean_ms(),
                        sample.stddev_ms(),
                        sample.raw_times.len(),
                    );
                } else if let Some(failure) = self
                    .failures
                    .iter()
                    .find(|f| f.block_size == entry.block_size && f.pattern == kind)
                {
                    let _ = writeln!(
                        table,
                        "| {} | {} | - | - | - | failed: {} |",
                        entry.block_size, kind, failure.reason,
                    );
                }
            }
        }

        table.push('\n');
        table.push_str("| Block Size | Warps/Block | Blocks/Grid | Total Warps | Divergence Penalty |\n");
        table.push_str("|-----------:|------------:|------------:|------------:|-------------------:|\n");
        for entry in &self.entries {
            if let Some(metrics) = &entry.metrics {
                let _ = writeln!(
                    table,
                    "| {} | {} | {} | {} | {:+.1}% |",
                    metrics.block_size,
                    metrics.warps_per_block,
                    metrics.blocks_per_grid,
                    metrics.total_warps,
                    metrics.divergence_penalty_pct,
                );
            } else {
                let _ = writeln!(table, "| {} | - | - | - | incomplete |", entry.block_size);
            }
        }

        table
    }

    /// Serialize to JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    ///
    /// # Errors
    ///
    /// Returns error if JSON is invalid.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Sweep controller
// ============================================================================

/// Run the full experiment matrix: every pattern at every block size.
///
/// Cells execute strictly sequentially on the given launcher. A cell
/// whose launch fails is recorded in the failure list and the sweep
/// continues; a block size with one or more failed cells carries
/// `metrics: None`. Configuration problems are fatal and returned
/// immediately.
///
/// # Errors
///
/// Returns [`BarridoError::InvalidConfig`] for malformed sweep
/// parameters and [`BarridoError::InvalidSize`] if pattern generation is
/// asked for zero elements (prevented by validation).
pub fn run_sweep(launcher: &Arc<dyn KernelLauncher>, config: &SweepConfig) -> Result<SweepResults> {
    config.validate()?;

    let info = launcher.info();
    info!(
        launcher = %info.name,
        device = %info.device,
        elements = config.total_elements,
        block_sizes = ?config.block_sizes,
        runs = config.runs,
        "starting sweep"
    );

    let threshold = config.threshold_fraction * config.total_elements as f32;
    let patterns: Vec<Arc<InputPattern>> = PatternKind::all()
        .iter()
        .map(|&kind| {
            InputPattern::generate(kind, config.total_elements, threshold).map(Arc::new)
        })
        .collect::<Result<_>>()?;

    let opts = config.timing_options();
    let mut entries = Vec::with_capacity(config.block_sizes.len());
    let mut failures = Vec::new();

    for &block_size in &config.block_sizes {
        let launch_config = LaunchConfig::for_elements(block_size, config.total_elements)?;
        if launch_config.wastes_lanes() {
            warn!(
                block_size,
                "block size is not a warp multiple; the last warp of every block has idle lanes"
            );
        }
        let mut samples = Vec::with_capacity(patterns.len());

        for pattern in &patterns {
            match time_kernel(launcher, pattern, launch_config, &opts) {
                Ok(sample) => samples.push(sample),
                Err(BarridoError::KernelLaunch {
                    pattern: cell_pattern,
                    block_size: cell_block,
                    reason,
                }) => {
                    warn!(
                        pattern = %cell_pattern,
                        block_size = cell_block,
                        %reason,
                        "cell failed; continuing sweep"
                    );
                    failures.push(FailedCell {
                        block_size: cell_block,
                        pattern: pattern.kind,
                        reason,
                    });
                }
                // Anything else is a harness bug, not a device failure.
                Err(fatal) => return Err(fatal),
            }
        }

        let metrics = match derive_metrics(block_size, &samples, config.total_elements) {
            Ok(metrics) => Some(metrics),
            Err(BarridoError::IncompleteSampleSet { .. }) => None,
            Err(fatal) => return Err(fatal),
        };

        entries.push(SweepEntry {
            block_size,
            samples,
            metrics,
        });
    }

    info!(
        measured = entries.iter().map(|e| e.samples.len()).sum::<usize>(),
        failed = failures.len(),
        "sweep finished"
    );

    Ok(SweepResults {
        config: config.clone(),
        launcher: info,
        entries,
        failures,
    })
}
