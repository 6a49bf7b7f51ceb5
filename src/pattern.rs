//! Input pattern generation with controlled branch-outcome distributions
//!
//! Three canonical patterns drive the thresholding kernel: two where every
//! lane takes the same branch (`AllBelow`, `AllAbove`) and one where the
//! branch splits 50/50 across the array and across most individual warps
//! (`HalfSplit`). Generation is deterministic, with no randomness, so
//! timing runs are exactly reproducible.

use serde::{Deserialize, Serialize};

use crate::error::{BarridoError, Result};

/// The three canonical branch-outcome distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    /// Every element below threshold (uniform branch, no divergence)
    AllBelow,
    /// Every element above threshold (uniform branch, no divergence)
    AllAbove,
    /// Half the elements on each side of the threshold (divergent)
    HalfSplit,
}

impl PatternKind {
    /// Get string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllBelow => "all_below",
            Self::AllAbove => "all_above",
            Self::HalfSplit => "half_split",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all_below" | "below" => Some(Self::AllBelow),
            "all_above" | "above" => Some(Self::AllAbove),
            "half_split" | "half" | "split" => Some(Self::HalfSplit),
            _ => None,
        }
    }

    /// All pattern kinds, in sweep order
    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::AllBelow, Self::AllAbove, Self::HalfSplit]
    }

    /// Whether warps running this pattern take both branch paths
    #[must_use]
    pub fn is_divergent(&self) -> bool {
        matches!(self, Self::HalfSplit)
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable input array with a known branch-outcome distribution
///
/// All patterns in one sweep share the same length, so timings at equal
/// block size are directly comparable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPattern {
    /// Which distribution this array realizes
    pub kind: PatternKind,
    /// The input values, the strictly increasing sequence `1..=size`
    pub values: Vec<f32>,
    /// Threshold the kernel compares against
    pub threshold: f32,
}

impl InputPattern {
    /// Generate a pattern of `size` elements.
    ///
    /// Values are always the sequence `1.0, 2.0, .., size`, so with the
    /// kernel's strict `>` comparison a [`PatternKind::HalfSplit`]
    /// threshold of `size / 2` puts exactly `size - size / 2` elements on
    /// the taken branch for even and odd sizes alike. For `HalfSplit` the
    /// given `threshold` is used as-is (the sweep passes
    /// `threshold_fraction * size`); for the uniform kinds the requested
    /// threshold is replaced by one outside the value range so every
    /// element resolves to the same branch.
    ///
    /// # Errors
    ///
    /// Returns [`BarridoError::InvalidSize`] when `size` is zero.
    pub fn generate(kind: PatternKind, size: usize, threshold: f32) -> Result<Self> {
        if size == 0 {
            return Err(BarridoError::InvalidSize { size });
        }

        let values: Vec<f32> = (1..=size).map(|i| i as f32).collect();
        let threshold = match kind {
            // Max value is size, so a threshold of size keeps every lane on
            // the not-taken side of the strict comparison.
            PatternKind::AllBelow => size as f32,
            PatternKind::AllAbove => 0.0,
            PatternKind::HalfSplit => threshold,
        };

        Ok(Self {
            kind,
            values,
            threshold,
        })
    }

    /// Number of elements in the pattern
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the pattern is empty (never true for generated patterns)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Count of elements strictly above the threshold
    #[must_use]
    pub fn count_above(&self) -> usize {
        self.values.iter().filter(|&&v| v > self.threshold).count()
    }
}
