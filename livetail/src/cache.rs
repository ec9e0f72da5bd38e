//! Dynamic cache: the live tail of one channel's stream.
//!
//! The cache accepts write batches of timestamped, alignment-tagged samples
//! and keeps them in a single live [`Segment`]. It rotates (flushes) that
//! segment when a write is discontinuous, when a time-bound segment has
//! outlived its span, or when a count-bound segment runs out of room. Every
//! write reports what it sealed and what it newly exposed.
//!
//! # Write Algorithm
//!
//! For each series in the batch, in order:
//!
//! 1. With no live segment, allocate one seeded at the series' alignment.
//! 2. If the series does not start exactly at the live segment's end
//!    alignment plus one, flush the live segment and allocate a fresh one.
//! 3. If a time-bound segment's first sample is older than the span, flush it
//!    and allocate a fresh one.
//! 4. Append as many samples as fit. When a count-bound segment fills with
//!    samples still pending, flush it, allocate the next one at the following
//!    alignment, and repeat until the series is consumed.
//!
//! A segment that becomes exactly full stays live. It is flushed by the next
//! write that has a sample for it.
//!
//! # Results
//!
//! - `flushed`: every segment sealed during the call, in order.
//! - `allocated`: every region written during the call, in order. This is new
//!   exposure, not the whole live tail.
//!
//! When a segment fills and is sealed in the same call that wrote it, its
//! sealed series and its allocated region are the same window over the same
//! storage ([`Series::ptr_eq`]). Callers may use that to skip a copy. A segment
//! flushed for a discontinuity after being written in an earlier call shares
//! storage with the earlier call's regions, not with this call's.
//!
//! # Concurrency
//!
//! `write` takes `&mut self`, runs to completion, and never blocks on I/O. The
//! owner serializes writes per channel; windows already handed out can be read
//! from any thread.

use std::fmt;
use std::sync::Arc;

use crate::alignment::{self, Continuity};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{Result, WriteError};
use crate::segment::Segment;
use crate::series::{MultiSeries, Series};
use crate::telem::TimeStamp;

/// What a single write sealed and exposed.
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    /// Segments sealed during the write, in order. Hand these to the
    /// historical store.
    pub flushed: MultiSeries,

    /// Regions written during the write, in order. Hand these to live
    /// consumers.
    pub allocated: MultiSeries,
}

/// Per-channel live tail with buffer rotation.
///
/// # Example
///
/// ```rust
/// use livetail::{Alignment, CacheConfig, DataType, DynamicCache, MultiSeries, Series, TimeStamp};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut cache = DynamicCache::new(CacheConfig::count_bound(2, DataType::Float32)?)?;
///
/// let batch = MultiSeries::from(Series::from_values(
///     &[1.0f32, 2.0, 3.0],
///     Alignment(0),
///     TimeStamp::now().open_range(),
/// ));
/// let result = cache.write(&batch)?;
///
/// assert_eq!(result.flushed.len(), 2);
/// assert_eq!(result.allocated.len(), 3);
/// assert!(result.flushed.series()[0].ptr_eq(&result.allocated.series()[0]));
/// assert_eq!(cache.length(), 1);
/// # Ok(())
/// # }
/// ```
pub struct DynamicCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    /// The live segment; `None` until the first non-empty write.
    live: Option<Segment>,
}

impl DynamicCache {
    /// Creates a cache reading wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if the configuration
    /// is invalid.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if the configuration
    /// is invalid.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            live: None,
        })
    }

    /// Returns the cache's configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the number of samples in the live segment.
    pub fn length(&self) -> usize {
        self.live.as_ref().map_or(0, Segment::len)
    }

    /// Returns a window over the live segment, with an open-ended time range.
    ///
    /// Returns `None` before the first write or while the live segment is
    /// empty.
    pub fn live(&self) -> Option<Series> {
        self.live.as_ref().filter(|s| !s.is_empty()).map(Segment::view)
    }

    /// Writes a batch and reports what was flushed and what was allocated.
    ///
    /// A batch with no samples is a no-op. Empty series within a batch carry
    /// no samples and no alignment information, and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::DataTypeMismatch`] if any series in the batch does
    /// not carry the configured data type. The whole batch is rejected and the
    /// cache is left untouched.
    pub fn write(&mut self, batch: &MultiSeries) -> Result<WriteResult> {
        if batch.is_empty() {
            return Ok(WriteResult::default());
        }

        let expected = self.config.data_type;
        if let Some((index, series)) = batch
            .iter()
            .enumerate()
            .find(|(_, s)| s.data_type() != expected)
        {
            return Err(WriteError::DataTypeMismatch {
                expected,
                found: series.data_type(),
                index,
            }
            .into());
        }

        let mut result = WriteResult::default();
        for series in batch.iter().filter(|s| !s.is_empty()) {
            let now = self.clock.now();
            self.write_one(series, now, &mut result);
        }
        Ok(result)
    }

    /// Consumes the cache and seals its live segment.
    ///
    /// Returns `None` if nothing is live. Used when a channel's subscription
    /// ends so its tail reaches the historical store.
    pub fn seal(self) -> Option<Series> {
        let now = self.clock.now();
        self.live
            .filter(|s| !s.is_empty())
            .map(|s| s.seal(now))
    }

    fn write_one(&mut self, series: &Series, now: TimeStamp, out: &mut WriteResult) {
        let mut segment = match self.live.take() {
            None => Segment::allocate(&self.config, now, series.alignment()),
            Some(live) => {
                if !alignment::continues(
                    live.upper_alignment(),
                    live.data_type(),
                    series.alignment(),
                    series.data_type(),
                ) {
                    let continuity = alignment::classify(live.upper_alignment(), series.alignment());
                    debug_assert_ne!(continuity, Continuity::Contiguous);
                    tracing::debug!(
                        ?continuity,
                        expected = %live.upper_alignment(),
                        found = %series.alignment(),
                        "discontinuous write"
                    );
                    flush(live, now, "discontinuity", out);
                    Segment::allocate(&self.config, now, series.alignment())
                } else if live.is_expired(now) {
                    flush(live, now, "expired", out);
                    Segment::allocate(&self.config, now, series.alignment())
                } else {
                    live
                }
            }
        };

        let mut remaining = series.clone();
        loop {
            let take = segment.remaining_capacity().fit(remaining.len());
            if take > 0 {
                out.allocated.push(segment.append(&remaining.slice(0..take), now));
            }
            if take == remaining.len() {
                break;
            }

            remaining = remaining.slice(take..remaining.len());
            let next = segment.upper_alignment();
            flush(segment, now, "full", out);
            segment = Segment::allocate(&self.config, now, next);
        }

        self.live = Some(segment);
    }
}

/// Seals `segment` into the flushed result set. Empty segments are dropped.
fn flush(segment: Segment, now: TimeStamp, reason: &'static str, out: &mut WriteResult) {
    if segment.is_empty() {
        return;
    }
    let sealed = segment.seal(now);
    tracing::debug!(
        reason,
        samples = sealed.len(),
        alignment = %sealed.alignment(),
        time_range = %sealed.time_range(),
        "sealed live buffer"
    );
    out.flushed.push(sealed);
}

impl fmt::Debug for DynamicCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCache")
            .field("config", &self.config)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
