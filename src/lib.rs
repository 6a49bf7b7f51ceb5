//! # Barrido
//!
//! Host-side kernel launch sweep harness for observing GPU branch
//! divergence and thread-block-size sensitivity with one trivial
//! thresholding kernel.
//!
//! The harness generates input arrays with controlled branch-outcome
//! distributions, launches the kernel across a sweep of thread-block
//! configurations, times repeated executions under barrier discipline,
//! and derives occupancy-related metrics from the raw timings.
//!
//! ## Architecture
//!
//! ```text
//! +------------------------+
//! |    run_sweep           |  <- experiment matrix, partial-failure tolerant
//! +------------------------+
//! |    time_kernel         |  <- warm-up discard, barriers, watchdog
//! +------------------------+
//! |    KernelLauncher      |  <- capability trait over the device boundary
//! +-----------+------------+
//! | CpuLauncher | OpenCL   |  <- simulated grid walk | real device (feature)
//! +-----------+------------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use barrido::{run_sweep, CpuLauncher, KernelLauncher, SweepConfig};
//!
//! let launcher: Arc<dyn KernelLauncher> = Arc::new(CpuLauncher::new());
//! let config = SweepConfig::new()
//!     .with_total_elements(1024)
//!     .with_block_sizes(vec![32, 64])
//!     .with_runs(2);
//!
//! let results = run_sweep(&launcher, &config).unwrap();
//! assert_eq!(results.sample_count(), 6); // 2 block sizes x 3 patterns
//! assert!(results.is_complete());
//! ```
//!
//! All sweep state lives inside one invocation; the returned
//! [`SweepResults`] record is immutable and serializes to JSON for
//! external reporting and plotting consumers.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f32/f64 for value sequences and stats
#![allow(clippy::cast_possible_truncation)] // u128 nanos -> u64 Duration is safe here
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod launch;
pub mod metrics;
pub mod pattern;
pub mod sweep;
pub mod timing;

/// OpenCL-backed launcher (requires the `opencl` feature).
#[cfg(feature = "opencl")]
pub mod opencl;

pub use error::{BarridoError, Result};
pub use launch::{CpuLauncher, KernelLauncher, LaunchConfig, LauncherInfo, WARP_SIZE};
pub use metrics::{blocks_per_grid, derive_metrics, warps_per_block, DerivedMetrics};
#[cfg(feature = "opencl")]
pub use opencl::OpenClLauncher;
pub use pattern::{InputPattern, PatternKind};
pub use sweep::{run_sweep, FailedCell, SweepConfig, SweepEntry, SweepResults};
pub use timing::{time_kernel, TimingOptions, TimingSample};
