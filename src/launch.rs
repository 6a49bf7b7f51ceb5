//! Kernel launch adapter: grid/block configuration and the device boundary
//!
//! The [`KernelLauncher`] trait is the only surface that touches a
//! device-execution API. Everything above it (timing, sweep, metrics) sees
//! a pure function of its inputs: same pattern + config always yields the
//! same output array. Two implementations exist: [`CpuLauncher`], a
//! deterministic software-simulated device that needs no hardware, and the
//! OpenCL-backed launcher in [`crate::opencl`] (feature `opencl`).

use serde::{Deserialize, Serialize};

use crate::error::{BarridoError, Result};
use crate::pattern::InputPattern;

/// Hardware warp width: the fixed thread count the device schedules in
/// lockstep.
pub const WARP_SIZE: u32 = 32;

// ============================================================================
// Launch configuration
// ============================================================================

/// One thread-block configuration for a kernel launch
///
/// Invariant: `block_size * grid_size >= total_elements`, so every element
/// is covered by exactly one thread and any excess threads are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Threads per block
    pub block_size: u32,
    /// Blocks per grid
    pub grid_size: u32,
    /// Elements of real work (threads beyond this are padding)
    pub total_elements: usize,
}

impl LaunchConfig {
    /// Build the minimal covering configuration for `total_elements`:
    /// `grid_size = ceil(total_elements / block_size)`.
    ///
    /// # Errors
    ///
    /// Returns [`BarridoError::InvalidConfig`] when `block_size` or
    /// `total_elements` is zero.
    pub fn for_elements(block_size: u32, total_elements: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(BarridoError::InvalidConfig {
                reason: "block_size must be at least 1".to_string(),
            });
        }
        if total_elements == 0 {
            return Err(BarridoError::InvalidConfig {
                reason: "total_elements must be at least 1".to_string(),
            });
        }

        let grid_size = u32::try_from(total_elements.div_ceil(block_size as usize)).map_err(
            |_| BarridoError::InvalidConfig {
                reason: format!(
                    "grid of {total_elements} elements at block size {block_size} overflows u32"
                ),
            },
        )?;

        Ok(Self {
            block_size,
            grid_size,
            total_elements,
        })
    }

    /// Total threads the device will schedule, padding included
    #[must_use]
    pub fn threads_launched(&self) -> usize {
        self.block_size as usize * self.grid_size as usize
    }

    /// Threads past the end of the input; these must perform no write
    #[must_use]
    pub fn padding_threads(&self) -> usize {
        self.threads_launched().saturating_sub(self.total_elements)
    }

    /// Whether every element is covered by a thread
    #[must_use]
    pub fn covers(&self, elements: usize) -> bool {
        self.threads_launched() >= elements
    }

    /// A block size that is not a warp multiple leaves lanes idle in the
    /// last warp of every block.
    #[must_use]
    pub fn wastes_lanes(&self) -> bool {
        self.block_size % WARP_SIZE != 0
    }
}

// ============================================================================
// Launcher capability trait
// ============================================================================

/// Launcher identification, reported alongside results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherInfo {
    /// Launcher name ("cpu", "opencl")
    pub name: String,
    /// Device the launches execute on
    pub device: String,
    /// True when execution is software-simulated rather than on hardware
    pub simulated: bool,
}

/// Capability interface over "run this kernel with this input and this
/// grid/block shape"
///
/// `launch` computes `output[i] = 1.0` if `values[i] > threshold` else
/// `0.0` for every `i < total_elements`; padding threads are
/// bounds-checked and perform no write. Implementations must be
/// deterministic: repeated launches with identical inputs yield identical
/// output vectors.
pub trait KernelLauncher: Send + Sync {
    /// Identify the launcher and its device
    fn info(&self) -> LauncherInfo;

    /// Execute the thresholding kernel once and return the output array
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration does not cover the input
    /// or when device execution fails.
    fn launch(&self, pattern: &InputPattern, config: &LaunchConfig) -> Result<Vec<f32>>;

    /// Block until all previously issued device work has completed
    ///
    /// The timing engine brackets every measured launch with this
    /// barrier so asynchronous queuing cannot corrupt elapsed times.
    ///
    /// # Errors
    ///
    /// Returns [`BarridoError::Device`] when the device wait fails.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Software-simulated launcher
// ============================================================================

/// Deterministic software-simulated device
///
/// Walks the virtual grid the way the hardware would schedule it: block by
/// block, thread by thread, with the global thread id bounds-checked
/// against the input length exactly as the device kernel is. Execution is
/// synchronous, so [`KernelLauncher::synchronize`] is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuLauncher;

impl CpuLauncher {
    /// Create a simulated launcher
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl KernelLauncher for CpuLauncher {
    fn info(&self) -> LauncherInfo {
        LauncherInfo {
            name: "cpu".to_string(),
            device: "host (simulated grid)".to_string(),
            simulated: true,
        }
    }

    fn launch(&self, pattern: &InputPattern, config: &LaunchConfig) -> Result<Vec<f32>> {
        let n = pattern.len();
        if !config.covers(n) {
            return Err(BarridoError::InvalidConfig {
                reason: format!(
                    "launch of {} threads does not cover {n} elements",
                    config.threads_launched()
                ),
            });
        }

        let mut output = vec![0.0f32; n];
        for block_id in 0..config.grid_size as usize {
            for thread_id in 0..config.block_size as usize {
                let gid = block_id * config.block_size as usize + thread_id;
                // Padding threads fall outside the input and write nothing.
                if gid < n {
                    output[gid] = if pattern.values[gid] > pattern.threshold {
                        1.0
                    } else {
                        0.0
                    };
                }
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    // =========================================================================
    // LaunchConfig
    // =========================================================================

    #[test]
    fn test_for_elements_exact_division() {
        let config = LaunchConfig::for_elements(256, 1024).unwrap();
        assert_eq!(config.grid_size, 4);
        assert_eq!(config.padding_threads(), 0);
        assert!(config.covers(1024));
    }

    #[test]
    fn test_for_elements_rounds_grid_up() {
        let config = LaunchConfig::for_elements(256, 1000).unwrap();
        assert_eq!(config.grid_size, 4);
        assert_eq!(config.padding_threads(), 24);
        assert!(config.covers(1000));
    }

    #[test]
    fn test_for_elements_rejects_zero_block() {
        assert!(LaunchConfig::for_elements(0, 1024).is_err());
        assert!(LaunchConfig::for_elements(32, 0).is_err());
    }

    #[test]
    fn test_warp_multiple_blocks_waste_no_lanes() {
        for block_size in [32, 64, 128, 256, 512, 1024] {
            let config = LaunchConfig::for_elements(block_size, 4096).unwrap();
            assert!(!config.wastes_lanes(), "block size {block_size}");
        }
    }

    #[test]
    fn test_non_warp_multiple_block_flagged() {
        let config = LaunchConfig::for_elements(50, 1000).unwrap();
        assert!(config.wastes_lanes());
        assert_eq!(config.grid_size, 20);
    }

    // =========================================================================
    // CpuLauncher
    // =========================================================================

    fn launch_pattern(kind: PatternKind, size: usize, block_size: u32) -> Vec<f32> {
        let pattern = InputPattern::generate(kind, size, size as f32 / 2.0).unwrap();
        let config = LaunchConfig::for_elements(block_size, size).unwrap();
        CpuLauncher::new().launch(&pattern, &config).unwrap()
    }

    #[test]
    fn test_all_below_outputs_zeros() {
        let out = launch_pattern(PatternKind::AllBelow, 16, 8);
        assert_eq!(out, vec![0.0; 16]);
    }

    #[test]
    fn test_all_above_outputs_ones() {
        let out = launch_pattern(PatternKind::AllAbove, 16, 8);
        assert_eq!(out, vec![1.0; 16]);
    }

    #[test]
    fn test_out_of_range_thresholds_are_uniform() {
        // The concrete boundary cases: one threshold far above the value
        // range, one far below.
        let config = LaunchConfig::for_elements(8, 16).unwrap();
        let below = InputPattern {
            kind: PatternKind::AllBelow,
            values: (1..=16).map(|i| i as f32).collect(),
            threshold: 100.0,
        };
        let above = InputPattern {
            kind: PatternKind::AllAbove,
            values: (1..=16).map(|i| i as f32).collect(),
            threshold: -100.0,
        };
        let launcher = CpuLauncher::new();
        assert_eq!(launcher.launch(&below, &config).unwrap(), vec![0.0; 16]);
        assert_eq!(launcher.launch(&above, &config).unwrap(), vec![1.0; 16]);
    }

    #[test]
    fn test_half_split_output_matches_threshold() {
        let out = launch_pattern(PatternKind::HalfSplit, 1024, 128);
        let ones = out.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(ones, 512);
        // Taken lanes are exactly the upper half of the increasing sequence.
        assert!(out[..512].iter().all(|&v| v == 0.0));
        assert!(out[512..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_padding_threads_do_not_write() {
        // 7 blocks of 150 = 1050 threads for 1000 elements.
        let out = launch_pattern(PatternKind::AllAbove, 1000, 150);
        assert_eq!(out.len(), 1000);
        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_launch_is_idempotent() {
        let pattern = InputPattern::generate(PatternKind::HalfSplit, 777, 388.5).unwrap();
        let config = LaunchConfig::for_elements(64, 777).unwrap();
        let launcher = CpuLauncher::new();
        let first = launcher.launch(&pattern, &config).unwrap();
        let second = launcher.launch(&pattern, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_launch_rejects_non_covering_config() {
        let pattern = InputPattern::generate(PatternKind::AllBelow, 1024, 512.0).unwrap();
        let config = LaunchConfig {
            block_size: 32,
            grid_size: 2,
            total_elements: 64,
        };
        let err = CpuLauncher::new().launch(&pattern, &config).unwrap_err();
        assert!(matches!(err, BarridoError::InvalidConfig { .. }));
    }

    #[test]
    fn test_synchronize_is_noop() {
        assert!(CpuLauncher::new().synchronize().is_ok());
    }
}
