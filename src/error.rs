//! Error types for the sweep harness
//!
//! One crate-wide error enum. Per-cell launch failures are recoverable
//! (the sweep records them and continues); everything else is fatal to
//! the call that raised it.

use thiserror::Error;

/// Errors produced by the benchmarking harness
#[derive(Debug, Error)]
pub enum BarridoError {
    /// Pattern generation was asked for an empty array
    #[error("invalid pattern size: {size} (must be at least 1)")]
    InvalidSize {
        /// The rejected size
        size: usize,
    },

    /// Malformed launch or sweep configuration
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration
        reason: String,
    },

    /// Device execution failure (or timeout) for one sweep cell
    ///
    /// The sweep controller records the cell as failed and continues;
    /// the remaining cells are unaffected.
    #[error("kernel launch failed for pattern '{pattern}' at block size {block_size}: {reason}")]
    KernelLaunch {
        /// Pattern being timed when the launch failed
        pattern: String,
        /// Block size of the failed cell
        block_size: u32,
        /// Underlying failure description
        reason: String,
    },

    /// Metrics requested without samples for all three pattern kinds
    #[error("incomplete sample set for block size {block_size}: missing {missing}")]
    IncompleteSampleSet {
        /// Block size whose metrics could not be derived
        block_size: u32,
        /// Comma-separated missing pattern kinds
        missing: String,
    },

    /// Launcher construction or synchronization failure
    #[error("device error: {reason}")]
    Device {
        /// Underlying device failure description
        reason: String,
    },
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, BarridoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_size_display() {
        let err = BarridoError::InvalidSize { size: 0 };
        assert_eq!(err.to_string(), "invalid pattern size: 0 (must be at least 1)");
    }

    #[test]
    fn test_kernel_launch_display_carries_cell_coordinates() {
        let err = BarridoError::KernelLaunch {
            pattern: "half_split".to_string(),
            block_size: 256,
            reason: "device lost".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("half_split"));
        assert!(msg.contains("256"));
        assert!(msg.contains("device lost"));
    }

    #[test]
    fn test_incomplete_sample_set_display() {
        let err = BarridoError::IncompleteSampleSet {
            block_size: 64,
            missing: "all_above, half_split".to_string(),
        };
        assert!(err.to_string().contains("all_above, half_split"));
    }
}
