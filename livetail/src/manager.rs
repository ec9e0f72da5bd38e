//! Channel routing: one dynamic cache per channel, flushes handed to a sink.
//!
//! The [`CacheManager`] owns every cache in a single index keyed by
//! [`ChannelKey`]. Caches never reference each other or the manager. Each
//! write's `flushed` output goes to the manager's [`FlushSink`] (the
//! historical store, in production) and its `allocated` output is returned to
//! the caller for live consumers.
//!
//! # Example
//!
//! ```rust
//! use livetail::{Alignment, CacheConfig, CacheManager, ChannelKey, DataType, MemorySink, MultiSeries, Series, TimeStamp};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = CacheManager::new(MemorySink::default());
//! let channel = ChannelKey(1);
//! manager.open(channel, CacheConfig::count_bound(2, DataType::Float64)?)?;
//!
//! let batch = MultiSeries::from(Series::from_values(
//!     &[1.0f64, 2.0, 3.0],
//!     Alignment(0),
//!     TimeStamp::now().open_range(),
//! ));
//! let allocated = manager.write(channel, &batch)?;
//! assert_eq!(allocated.len(), 3);
//!
//! // The first full buffer went to the sink.
//! assert_eq!(manager.sink().samples(channel), 2);
//!
//! // Closing seals the live tail into the sink too.
//! manager.close(channel)?;
//! assert_eq!(manager.sink().samples(channel), 3);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::DynamicCache;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{ChannelError, Result};
use crate::series::{MultiSeries, Series};

/// Identifier of a telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(pub u32);

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination for sealed buffers.
///
/// Any `FnMut(ChannelKey, MultiSeries)` closure is a sink.
pub trait FlushSink {
    /// Takes ownership of the buffers sealed for `channel` by one call.
    fn accept(&mut self, channel: ChannelKey, flushed: MultiSeries);
}

impl<F> FlushSink for F
where
    F: FnMut(ChannelKey, MultiSeries),
{
    fn accept(&mut self, channel: ChannelKey, flushed: MultiSeries) {
        self(channel, flushed);
    }
}

/// In-memory sink that keeps every sealed buffer per channel.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    flushed: BTreeMap<ChannelKey, Vec<Series>>,
}

impl MemorySink {
    /// Returns the buffers sealed for `channel`, oldest first.
    pub fn flushed(&self, channel: ChannelKey) -> &[Series] {
        self.flushed.get(&channel).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the total number of samples sealed for `channel`.
    pub fn samples(&self, channel: ChannelKey) -> usize {
        self.flushed(channel).iter().map(Series::len).sum()
    }

    /// Returns the channels that have received at least one buffer.
    pub fn channels(&self) -> impl Iterator<Item = ChannelKey> + '_ {
        self.flushed.keys().copied()
    }

    /// Removes and returns the buffers sealed for `channel`.
    pub fn take(&mut self, channel: ChannelKey) -> Vec<Series> {
        self.flushed.remove(&channel).unwrap_or_default()
    }
}

impl FlushSink for MemorySink {
    fn accept(&mut self, channel: ChannelKey, flushed: MultiSeries) {
        self.flushed.entry(channel).or_default().extend(flushed);
    }
}

/// Owner of every channel's dynamic cache.
///
/// # Thread Safety
///
/// All methods take `&self` or `&mut self`, so writes to a channel are
/// serialized by the borrow. Share the manager behind a lock if several tasks
/// ingest at once.
pub struct CacheManager<S: FlushSink = MemorySink> {
    caches: HashMap<ChannelKey, DynamicCache>,
    sink: S,
    clock: Arc<dyn Clock>,
}

impl<S: FlushSink> CacheManager<S> {
    /// Creates a manager whose caches read wall-clock time.
    pub fn new(sink: S) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock))
    }

    /// Creates a manager whose caches all read time from `clock`.
    pub fn with_clock(sink: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            caches: HashMap::new(),
            sink,
            clock,
        }
    }

    /// Opens a cache for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyOpen`] if the channel has a cache, or
    /// [`ConfigError`](crate::error::ConfigError) if `config` is invalid.
    pub fn open(&mut self, channel: ChannelKey, config: CacheConfig) -> Result<()> {
        if self.caches.contains_key(&channel) {
            return Err(ChannelError::AlreadyOpen { channel }.into());
        }
        let cache = DynamicCache::with_clock(config, Arc::clone(&self.clock))?;
        self.caches.insert(channel, cache);
        tracing::debug!(%channel, ?config, "opened channel cache");
        Ok(())
    }

    /// Writes a batch to `channel`'s cache and returns the newly allocated
    /// regions. Sealed buffers go to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotFound`] for an unknown channel, or the
    /// cache's [`WriteError`](crate::error::WriteError). A rejected batch
    /// leaves the cache and the sink untouched.
    pub fn write(&mut self, channel: ChannelKey, batch: &MultiSeries) -> Result<MultiSeries> {
        let cache = self
            .caches
            .get_mut(&channel)
            .ok_or(ChannelError::NotFound { channel })?;

        let result = match cache.write(batch) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%channel, error = %e, "rejected write");
                return Err(e);
            }
        };

        if !result.flushed.is_empty() {
            self.sink.accept(channel, result.flushed);
        }
        Ok(result.allocated)
    }

    /// Returns a window over `channel`'s live buffer.
    ///
    /// `None` if the channel is not open or nothing is live.
    pub fn live(&self, channel: ChannelKey) -> Option<Series> {
        self.caches.get(&channel).and_then(DynamicCache::live)
    }

    /// Returns the number of live samples for `channel`, or `None` if the
    /// channel is not open.
    pub fn length(&self, channel: ChannelKey) -> Option<usize> {
        self.caches.get(&channel).map(DynamicCache::length)
    }

    /// Closes `channel`, sealing its live buffer into the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotFound`] for an unknown channel.
    pub fn close(&mut self, channel: ChannelKey) -> Result<()> {
        let cache = self
            .caches
            .remove(&channel)
            .ok_or(ChannelError::NotFound { channel })?;

        if let Some(sealed) = cache.seal() {
            tracing::debug!(
                reason = "close",
                %channel,
                samples = sealed.len(),
                time_range = %sealed.time_range(),
                "sealed live buffer"
            );
            self.sink.accept(channel, MultiSeries::from(sealed));
        }
        Ok(())
    }

    /// Returns whether `channel` has an open cache.
    pub fn is_open(&self, channel: ChannelKey) -> bool {
        self.caches.contains_key(&channel)
    }

    /// Returns the open channels in ascending order.
    pub fn channels(&self) -> Vec<ChannelKey> {
        let mut channels: Vec<_> = self.caches.keys().copied().collect();
        channels.sort_unstable();
        channels
    }

    /// Returns the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the manager and returns the sink. Live buffers are dropped
    /// unsealed; call [`CacheManager::close`] first to keep them.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: FlushSink + fmt::Debug> fmt::Debug for CacheManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("caches", &self.caches)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::Alignment;
    use crate::clock::ManualClock;
    use crate::error::{LiveTailError, WriteError};
    use crate::telem::{DataType, TimeStamp};

    fn batch(values: &[f64], alignment: u64) -> MultiSeries {
        MultiSeries::from(Series::from_values(
            values,
            Alignment(alignment),
            TimeStamp::ZERO.open_range(),
        ))
    }

    fn manager() -> CacheManager {
        let clock = ManualClock::new(TimeStamp::from_millis(5));
        CacheManager::with_clock(MemorySink::default(), Arc::new(clock))
    }

    fn config(capacity: u64) -> CacheConfig {
        CacheConfig::count_bound(capacity, DataType::Float64).unwrap()
    }

    #[test]
    fn test_open_twice_fails() {
        let mut manager = manager();
        manager.open(ChannelKey(1), config(4)).unwrap();

        let err = manager.open(ChannelKey(1), config(4)).unwrap_err();
        assert!(matches!(
            err,
            LiveTailError::Channel(ChannelError::AlreadyOpen { channel: ChannelKey(1) })
        ));
    }

    #[test]
    fn test_unknown_channel() {
        let mut manager = manager();
        let err = manager.write(ChannelKey(9), &batch(&[1.0], 0)).unwrap_err();
        assert!(matches!(err, LiveTailError::Channel(ChannelError::NotFound { .. })));
        assert!(manager.close(ChannelKey(9)).is_err());
        assert!(manager.live(ChannelKey(9)).is_none());
        assert_eq!(manager.length(ChannelKey(9)), None);
    }

    #[test]
    fn test_write_routes_flushed_to_sink() {
        let mut manager = manager();
        manager.open(ChannelKey(1), config(2)).unwrap();

        let allocated = manager.write(ChannelKey(1), &batch(&[1.0, 2.0, 3.0], 0)).unwrap();
        assert_eq!(allocated.to_f64_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(manager.length(ChannelKey(1)), Some(1));

        let sunk = manager.sink().flushed(ChannelKey(1));
        assert_eq!(sunk.len(), 1);
        assert_eq!(sunk[0].to_f64_vec(), vec![1.0, 2.0]);
        assert!(sunk[0].ptr_eq(&allocated.series()[0]));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut manager = manager();
        manager.open(ChannelKey(2), config(10)).unwrap();
        manager.open(ChannelKey(1), config(10)).unwrap();

        manager.write(ChannelKey(1), &batch(&[1.0, 2.0], 0)).unwrap();
        manager.write(ChannelKey(2), &batch(&[5.0], 100)).unwrap();
        // Continues channel 1; would be a gap if alignment leaked across channels.
        manager.write(ChannelKey(1), &batch(&[3.0], 2)).unwrap();

        assert_eq!(manager.channels(), vec![ChannelKey(1), ChannelKey(2)]);
        assert_eq!(manager.length(ChannelKey(1)), Some(3));
        assert_eq!(manager.length(ChannelKey(2)), Some(1));
        assert_eq!(manager.sink().channels().count(), 0);
    }

    #[test]
    fn test_rejected_write_leaves_state() {
        let mut manager = manager();
        manager.open(ChannelKey(1), config(10)).unwrap();
        manager.write(ChannelKey(1), &batch(&[1.0], 0)).unwrap();

        let wrong = MultiSeries::from(Series::from_values(
            &[1i32],
            Alignment(1),
            TimeStamp::ZERO.open_range(),
        ));
        let err = manager.write(ChannelKey(1), &wrong).unwrap_err();
        assert!(matches!(err, LiveTailError::Write(WriteError::DataTypeMismatch { .. })));
        assert_eq!(manager.length(ChannelKey(1)), Some(1));
    }

    #[test]
    fn test_close_seals_into_sink() {
        let mut manager = manager();
        manager.open(ChannelKey(1), config(10)).unwrap();
        manager.open(ChannelKey(2), config(10)).unwrap();
        manager.write(ChannelKey(1), &batch(&[1.0, 2.0], 0)).unwrap();

        manager.close(ChannelKey(1)).unwrap();
        manager.close(ChannelKey(2)).unwrap();

        assert!(!manager.is_open(ChannelKey(1)));
        let sink = manager.into_sink();
        assert_eq!(sink.samples(ChannelKey(1)), 2);
        assert!(!sink.flushed(ChannelKey(1))[0].time_range().is_open());
        // Nothing was ever written to channel 2.
        assert!(sink.flushed(ChannelKey(2)).is_empty());
    }

    #[test]
    fn test_memory_sink_take_drains_channel() {
        let mut manager = manager();
        manager.open(ChannelKey(1), config(1)).unwrap();
        manager.write(ChannelKey(1), &batch(&[1.0, 2.0, 3.0], 0)).unwrap();

        let mut sink = manager.into_sink();
        let taken = sink.take(ChannelKey(1));
        assert_eq!(taken.iter().map(Series::len).sum::<usize>(), 2);
        assert!(sink.flushed(ChannelKey(1)).is_empty());
        assert!(sink.take(ChannelKey(1)).is_empty());
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let sink = |channel: ChannelKey, flushed: MultiSeries| seen.push((channel, flushed.len()));
            let mut manager = CacheManager::new(sink);
            manager.open(ChannelKey(3), config(1)).unwrap();
            manager.write(ChannelKey(3), &batch(&[1.0, 2.0], 0)).unwrap();
        }
        assert_eq!(seen, vec![(ChannelKey(3), 1)]);
    }
}
