//! Alignment tracking for write contiguity.
//!
//! Every sample in a channel carries an alignment: a monotonic position in the
//! channel's total logical ordering. Two runs of samples are contiguous when
//! the second starts exactly one position after the last sample of the first.
//! Anything else (a gap from a reconnect, an overlap from a backfill) is a
//! discontinuity, and the cache must start a fresh buffer.
//!
//! The tracker holds no state. The live buffer knows its own bounds and the
//! cache asks [`continues`] before every append.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::telem::DataType;

/// A sample's position in a channel's logical ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alignment(pub u64);

impl Alignment {
    /// Returns the alignment `count` positions after this one.
    ///
    /// Saturates at `u64::MAX`; a channel never produces that many samples.
    #[inline]
    pub fn advance(self, count: usize) -> Self {
        Self(self.0.saturating_add(count as u64))
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alignment bounds of a run of samples, `[lower, upper)`.
///
/// `upper` is one past the alignment of the last sample, so an empty run has
/// `lower == upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AlignmentBounds {
    /// Alignment of the first sample.
    pub lower: Alignment,
    /// One past the alignment of the last sample.
    pub upper: Alignment,
}

impl AlignmentBounds {
    /// Returns the bounds of `len` samples starting at `lower`.
    pub fn from_len(lower: Alignment, len: usize) -> Self {
        Self {
            lower,
            upper: lower.advance(len),
        }
    }

    /// Returns whether the bounds contain no samples.
    pub fn is_empty(&self) -> bool {
        self.lower == self.upper
    }
}

/// How a candidate run relates to the end of the live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// The candidate starts exactly where the live buffer ends.
    Contiguous,
    /// The candidate starts this many positions past the live buffer's end.
    Gap(u64),
    /// The candidate starts this many positions before the live buffer's end.
    Overlap(u64),
}

/// Classifies a candidate start against the live buffer's upper bound.
///
/// `live_upper` is one past the live buffer's last sample, i.e. the live end
/// alignment plus one.
pub fn classify(live_upper: Alignment, candidate_start: Alignment) -> Continuity {
    match candidate_start.cmp(&live_upper) {
        std::cmp::Ordering::Equal => Continuity::Contiguous,
        std::cmp::Ordering::Greater => Continuity::Gap(candidate_start.0 - live_upper.0),
        std::cmp::Ordering::Less => Continuity::Overlap(live_upper.0 - candidate_start.0),
    }
}

/// Returns whether a candidate run directly continues the live buffer.
///
/// True iff the candidate starts at the live buffer's end alignment plus one
/// (`live_upper`) and both carry the same data type.
///
/// # Examples
///
/// ```rust
/// use livetail::alignment::{continues, Alignment};
/// use livetail::DataType;
///
/// // A live buffer holding alignments 0, 1, 2 has an upper bound of 3.
/// let upper = Alignment(3);
/// assert!(continues(upper, DataType::Float32, Alignment(3), DataType::Float32));
/// assert!(!continues(upper, DataType::Float32, Alignment(5), DataType::Float32));
/// assert!(!continues(upper, DataType::Float32, Alignment(3), DataType::Int32));
/// ```
#[inline]
pub fn continues(
    live_upper: Alignment,
    live_type: DataType,
    candidate_start: Alignment,
    candidate_type: DataType,
) -> bool {
    live_type == candidate_type && classify(live_upper, candidate_start) == Continuity::Contiguous
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous() {
        assert!(continues(Alignment(10), DataType::Float64, Alignment(10), DataType::Float64));
        assert_eq!(classify(Alignment(10), Alignment(10)), Continuity::Contiguous);
    }

    #[test]
    fn test_gap_is_discontinuous() {
        assert!(!continues(Alignment(3), DataType::Float32, Alignment(5), DataType::Float32));
        assert_eq!(classify(Alignment(3), Alignment(5)), Continuity::Gap(2));
    }

    #[test]
    fn test_overlap_is_discontinuous() {
        // Re-sending the same run is not a continuation.
        assert!(!continues(Alignment(3), DataType::Float32, Alignment(0), DataType::Float32));
        assert_eq!(classify(Alignment(3), Alignment(0)), Continuity::Overlap(3));
    }

    #[test]
    fn test_type_mismatch_is_discontinuous() {
        assert!(!continues(Alignment(3), DataType::Float32, Alignment(3), DataType::Float64));
    }

    #[test]
    fn test_bounds() {
        let bounds = AlignmentBounds::from_len(Alignment(5), 3);
        assert_eq!(bounds.upper, Alignment(8));
        assert!(!bounds.is_empty());
        assert!(AlignmentBounds::from_len(Alignment(5), 0).is_empty());
    }

    #[test]
    fn test_advance_saturates() {
        assert_eq!(Alignment(u64::MAX - 1).advance(10), Alignment(u64::MAX));
    }
}
