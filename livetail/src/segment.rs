//! Buffer segments: the physical append-only regions behind a live tail.
//!
//! A [`Segment`] is one storage region for a single channel's samples. It is
//! either count-bound (a fixed sample capacity, reserved up front) or
//! time-bound (open-ended, growing until its first sample is older than the
//! configured span).
//!
//! # Design
//!
//! - The segment is exclusively owned and mutated by the dynamic cache.
//! - Storage is shared with every [`Series`] window handed out, so exposing a
//!   region never copies it.
//! - [`Segment::append`] trusts its caller: the cache's dispatch loop never
//!   offers more than [`Segment::remaining_capacity`].
//! - [`Segment::seal`] consumes the segment. Once sealed nothing can append to
//!   its storage again, so the returned series is immutable. Sealing also
//!   releases the unused part of the reservation.

use std::sync::Arc;

use crate::alignment::{Alignment, AlignmentBounds};
use crate::config::{CacheConfig, Sizing};
use crate::series::{Series, Storage};
use crate::telem::{DataType, TimeRange, TimeStamp};

/// Room left in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// This many more samples fit.
    Samples(usize),
    /// No per-sample ceiling (time-bound).
    Unbounded,
}

impl Capacity {
    /// Returns how many of `wanted` samples fit.
    #[inline]
    pub fn fit(self, wanted: usize) -> usize {
        match self {
            Self::Samples(n) => n.min(wanted),
            Self::Unbounded => wanted,
        }
    }
}

/// One append-only storage region for a channel's live samples.
#[derive(Debug)]
pub struct Segment {
    storage: Arc<Storage>,
    data_type: DataType,
    sizing: Sizing,
    /// Time the segment was allocated, i.e. the arrival of its first sample.
    start: TimeStamp,
    /// Time of the most recent append.
    last_write: TimeStamp,
    /// Alignment of the first sample.
    alignment: Alignment,
    /// Write cursor, in samples.
    len: usize,
}

impl Segment {
    /// Allocates an empty segment seeded at `start` and `alignment`.
    ///
    /// Count-bound segments reserve their full capacity; `config` must have
    /// passed [`CacheConfig::validate`].
    pub fn allocate(config: &CacheConfig, start: TimeStamp, alignment: Alignment) -> Self {
        let reserve = match config.sizing {
            #[allow(clippy::cast_possible_truncation)] // validate() keeps capacity * density within usize
            Sizing::CountBound(capacity) => capacity as usize * config.data_type.density(),
            Sizing::TimeBound(_) => 0,
        };

        Self {
            storage: Arc::new(Storage::with_capacity(reserve)),
            data_type: config.data_type,
            sizing: config.sizing,
            start,
            last_write: start,
            alignment,
            len: 0,
        }
    }

    /// Returns how many more samples fit.
    pub fn remaining_capacity(&self) -> Capacity {
        match self.sizing {
            #[allow(clippy::cast_possible_truncation)] // validate() keeps capacity * density within usize
            Sizing::CountBound(capacity) => Capacity::Samples((capacity as usize).saturating_sub(self.len)),
            Sizing::TimeBound(_) => Capacity::Unbounded,
        }
    }

    /// Appends every sample of `slice` and returns a window over the newly
    /// written region.
    ///
    /// `slice` must carry the segment's data type, continue its alignment, and
    /// fit in [`Segment::remaining_capacity`].
    pub fn append(&mut self, slice: &Series, now: TimeStamp) -> Series {
        debug_assert_eq!(slice.data_type(), self.data_type);
        debug_assert_eq!(slice.alignment(), self.upper_alignment());
        debug_assert_eq!(self.remaining_capacity().fit(slice.len()), slice.len());

        let offset = self.len;
        self.storage.append(&slice.to_bytes());
        self.len += slice.len();
        self.last_write = now;

        tracing::trace!(
            alignment = %slice.alignment(),
            samples = slice.len(),
            len = self.len,
            "appended to live buffer"
        );

        Series::window(
            Arc::clone(&self.storage),
            self.data_type,
            offset,
            slice.len(),
            slice.alignment(),
            self.start.open_range(),
        )
    }

    /// Returns whether a count-bound segment has no room left.
    ///
    /// Time-bound segments are never full.
    pub fn is_full(&self) -> bool {
        self.remaining_capacity() == Capacity::Samples(0)
    }

    /// Returns whether a time-bound segment's first sample is older than its
    /// span at `now`.
    ///
    /// Count-bound segments never expire.
    pub fn is_expired(&self, now: TimeStamp) -> bool {
        match self.sizing {
            Sizing::CountBound(_) => false,
            Sizing::TimeBound(span) => now.span_since(self.start) > span,
        }
    }

    /// Returns the number of samples written.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the data type of the segment.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the time the segment was allocated.
    pub fn start(&self) -> TimeStamp {
        self.start
    }

    /// Returns one past the alignment of the last sample written.
    ///
    /// This is where the next contiguous run must start.
    pub fn upper_alignment(&self) -> Alignment {
        self.alignment.advance(self.len)
    }

    /// Returns the alignment bounds of the samples written so far.
    pub fn alignment_bounds(&self) -> AlignmentBounds {
        AlignmentBounds::from_len(self.alignment, self.len)
    }

    /// Returns a window over everything written so far, with an open-ended
    /// time range.
    pub fn view(&self) -> Series {
        Series::window(
            Arc::clone(&self.storage),
            self.data_type,
            0,
            self.len,
            self.alignment,
            self.start.open_range(),
        )
    }

    /// Seals the segment and returns its contents with a closed time range.
    ///
    /// A count-bound segment closes at its last append; a time-bound segment
    /// closes at `now`, the moment its span was found elapsed.
    pub fn seal(self, now: TimeStamp) -> Series {
        let end = match self.sizing {
            Sizing::CountBound(_) => self.last_write,
            Sizing::TimeBound(_) => now,
        };
        self.storage.shrink_to_fit();
        Series::window(
            self.storage,
            self.data_type,
            0,
            self.len,
            self.alignment,
            TimeRange::new(self.start, end),
        )
    }
}
