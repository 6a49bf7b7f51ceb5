//! Occupancy-related metrics derived from raw cell timings
//!
//! Warp and block counts come straight from the launch geometry; the
//! divergence penalty compares the divergent pattern's mean against the
//! average of the two single-branch patterns at the same block size.

use serde::{Deserialize, Serialize};

use crate::error::{BarridoError, Result};
use crate::launch::WARP_SIZE;
use crate::pattern::PatternKind;
use crate::timing::TimingSample;

/// Warps needed to schedule one block: `ceil(block_size / 32)`
#[must_use]
pub fn warps_per_block(block_size: u32) -> u32 {
    block_size.div_ceil(WARP_SIZE)
}

/// Blocks needed to cover the input: `ceil(total_elements / block_size)`
#[must_use]
pub fn blocks_per_grid(total_elements: usize, block_size: u32) -> u32 {
    total_elements.div_ceil(block_size as usize) as u32
}

/// Per-block-size metrics derived from a complete sample set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Block size the metrics describe
    pub block_size: u32,
    /// Warps per block at this block size
    pub warps_per_block: u32,
    /// Blocks per grid at this block size
    pub blocks_per_grid: u32,
    /// Total warps scheduled for the whole grid
    pub total_warps: u64,
    /// Relative timing delta of the divergent pattern versus the
    /// single-branch patterns, in percent
    pub divergence_penalty_pct: f64,
}

/// Derive metrics for one block size from its three pattern samples.
///
/// The divergence penalty is
/// `(divergent_mean - nondivergent_mean) / nondivergent_mean * 100`,
/// where `nondivergent_mean` averages the `AllBelow` and `AllAbove`
/// means. A zero nondivergent mean reports a penalty of `0.0` rather
/// than dividing by zero.
///
/// # Errors
///
/// Returns [`BarridoError::IncompleteSampleSet`] naming the missing
/// pattern kinds when fewer than all three are present.
pub fn derive_metrics(
    block_size: u32,
    samples: &[TimingSample],
    total_elements: usize,
) -> Result<DerivedMetrics> {
    let find = |kind: PatternKind| {
        samples
            .iter()
            .find(|s| s.pattern == kind && s.config.block_size == block_size)
    };

    let missing: Vec<&str> = PatternKind::all()
        .iter()
        .filter(|&&kind| find(kind).is_none())
        .map(PatternKind::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(BarridoError::IncompleteSampleSet {
            block_size,
            missing: missing.join(", "),
        });
    }

    let mean_ns = |kind: PatternKind| {
        // The missing check above guarantees presence.
        find(kind).map_or(0.0, |s| s.mean.as_nanos() as f64)
    };
    let below_ns = mean_ns(PatternKind::AllBelow);
    let above_ns = mean_ns(PatternKind::AllAbove);
    let split_ns = mean_ns(PatternKind::HalfSplit);

    let nondivergent_ns = (below_ns + above_ns) / 2.0;
    let divergence_penalty_pct = if nondivergent_ns == 0.0 {
        0.0
    } else {
        (split_ns - nondivergent_ns) / nondivergent_ns * 100.0
    };

    let warps = warps_per_block(block_size);
    let blocks = blocks_per_grid(total_elements, block_size);

    Ok(DerivedMetrics {
        block_size,
        warps_per_block: warps,
        blocks_per_grid: blocks,
        total_warps: u64::from(warps) * u64::from(blocks),
        divergence_penalty_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::LaunchConfig;
    use std::time::Duration;

    fn sample(kind: PatternKind, block_size: u32, total: usize, mean_us: u64) -> TimingSample {
        let config = LaunchConfig::for_elements(block_size, total).unwrap();
        TimingSample::from_times(config, kind, vec![Duration::from_micros(mean_us)])
    }

    #[test]
    fn test_warps_per_block_rounds_up() {
        assert_eq!(warps_per_block(50), 2);
        assert_eq!(warps_per_block(256), 8);
        assert_eq!(warps_per_block(32), 1);
        assert_eq!(warps_per_block(33), 2);
        assert_eq!(warps_per_block(1), 1);
    }

    #[test]
    fn test_blocks_per_grid_rounds_up() {
        assert_eq!(blocks_per_grid(1024, 256), 4);
        assert_eq!(blocks_per_grid(1000, 256), 4);
        assert_eq!(blocks_per_grid(1024, 32), 32);
    }

    #[test]
    fn test_total_warps_invariant_across_block_sizes() {
        // 1 Mi elements divide exactly by every block size in the sweep,
        // so the grid always schedules the same 32,768 warps.
        let total = 1_048_576;
        for block_size in [32, 64, 128, 256, 512, 1024] {
            let samples = vec![
                sample(PatternKind::AllBelow, block_size, total, 100),
                sample(PatternKind::AllAbove, block_size, total, 100),
                sample(PatternKind::HalfSplit, block_size, total, 150),
            ];
            let metrics = derive_metrics(block_size, &samples, total).unwrap();
            assert_eq!(metrics.total_warps, 32_768, "block size {block_size}");
        }
    }

    #[test]
    fn test_identical_means_give_exactly_zero_penalty() {
        let samples = vec![
            sample(PatternKind::AllBelow, 128, 4096, 250),
            sample(PatternKind::AllAbove, 128, 4096, 250),
            sample(PatternKind::HalfSplit, 128, 4096, 250),
        ];
        let metrics = derive_metrics(128, &samples, 4096).unwrap();
        assert_eq!(metrics.divergence_penalty_pct, 0.0);
    }

    #[test]
    fn test_penalty_relative_to_nondivergent_average() {
        // Non-divergent average is (90 + 110) / 2 = 100us; divergent 150us
        // is a 50% penalty.
        let samples = vec![
            sample(PatternKind::AllBelow, 64, 1024, 90),
            sample(PatternKind::AllAbove, 64, 1024, 110),
            sample(PatternKind::HalfSplit, 64, 1024, 150),
        ];
        let metrics = derive_metrics(64, &samples, 1024).unwrap();
        assert!((metrics.divergence_penalty_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_faster_divergent_pattern_gives_negative_penalty() {
        let samples = vec![
            sample(PatternKind::AllBelow, 64, 1024, 100),
            sample(PatternKind::AllAbove, 64, 1024, 100),
            sample(PatternKind::HalfSplit, 64, 1024, 80),
        ];
        let metrics = derive_metrics(64, &samples, 1024).unwrap();
        assert!(metrics.divergence_penalty_pct < 0.0);
    }

    #[test]
    fn test_missing_patterns_reported_by_name() {
        let samples = vec![sample(PatternKind::AllBelow, 64, 1024, 100)];
        let err = derive_metrics(64, &samples, 1024).unwrap_err();
        match err {
            BarridoError::IncompleteSampleSet {
                block_size,
                missing,
            } => {
                assert_eq!(block_size, 64);
                assert!(missing.contains("all_above"));
                assert!(missing.contains("half_split"));
                assert!(!missing.contains("all_below"));
            }
            other => panic!("expected IncompleteSampleSet, got {other:?}"),
        }
    }

    #[test]
    fn test_samples_for_other_block_sizes_ignored() {
        let samples = vec![
            sample(PatternKind::AllBelow, 32, 1024, 100),
            sample(PatternKind::AllAbove, 32, 1024, 100),
            sample(PatternKind::HalfSplit, 64, 1024, 100),
        ];
        let err = derive_metrics(32, &samples, 1024).unwrap_err();
        assert!(matches!(err, BarridoError::IncompleteSampleSet { .. }));
    }

    #[test]
    fn test_zero_nondivergent_mean_guarded() {
        let samples = vec![
            sample(PatternKind::AllBelow, 32, 64, 0),
            sample(PatternKind::AllAbove, 32, 64, 0),
            sample(PatternKind::HalfSplit, 32, 64, 10),
        ];
        let metrics = derive_metrics(32, &samples, 64).unwrap();
        assert_eq!(metrics.divergence_penalty_pct, 0.0);
    }
}
