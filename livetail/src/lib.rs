//! # livetail
//!
//! Dynamic streaming cache for live telemetry.
//!
//! livetail holds the live tail of each telemetry channel in memory. Writers
//! push batches of alignment-tagged samples; the cache keeps them in a single
//! live buffer per channel, rotates that buffer when it fills, ages out, or
//! stops being contiguous, and reports on every write which buffers were
//! sealed (for the historical store) and which regions are newly visible (for
//! live consumers).
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Count-bound or time-bound buffers, fixed per channel
//! - Zero-copy exposure: returned series are windows over shared buffer storage
//! - Contiguity by alignment; any gap or overlap starts a new buffer
//! - No I/O, no background threads, no suspension points on the write path
//! - Injectable clock for deterministic time-bound rotation
//!
//! ## Quick Start
//!
//! ```rust
//! use livetail::{Alignment, CacheConfig, DataType, DynamicCache, MultiSeries, Series, TimeStamp};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // One cache per channel: rotate every 1000 float32 samples.
//! let mut cache = DynamicCache::new(CacheConfig::count_bound(1_000, DataType::Float32)?)?;
//!
//! // A batch that starts at alignment 0.
//! let batch = MultiSeries::from(Series::from_values(
//!     &[0.1f32, 0.2, 0.3],
//!     Alignment(0),
//!     TimeStamp::now().open_range(),
//! ));
//! let result = cache.write(&batch)?;
//!
//! // Newly visible samples for live readers.
//! assert_eq!(result.allocated.to_f64_vec().len(), 3);
//! // Nothing sealed yet.
//! assert!(result.flushed.is_empty());
//!
//! // The next batch continues at alignment 3.
//! let next = MultiSeries::from(Series::from_values(&[0.4f32], Alignment(3), TimeStamp::now().open_range()));
//! cache.write(&next)?;
//! assert_eq!(cache.length(), 4);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`DynamicCache`]: Per-channel live tail; owns one live buffer
//! - [`CacheManager`]: Owns every channel's cache; routes flushes to a [`FlushSink`]
//! - [`CacheConfig`]: Count-bound or time-bound sizing plus data type
//! - [`Series`] / [`MultiSeries`]: Typed windows over shared sample storage
//! - [`Clock`]: Time source for buffer start, end, and expiry
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`cache`]: Write dispatch, rotation, and flush/allocate results
//! - [`manager`]: Channel index and flush routing
//! - [`segment`]: Append-only buffer segments
//! - [`alignment`]: Alignment counters and continuity checks
//! - [`series`]: Series and multi-series windows
//! - [`config`]: Cache configuration and validation
//! - [`clock`]: System and manual clocks
//! - [`telem`]: Timestamps, time ranges, and data types
//! - [`error`]: Error types

pub mod alignment;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod segment;
pub mod series;
pub mod telem;

// Re-export primary API types at crate root for convenience.
pub use alignment::{Alignment, AlignmentBounds};
pub use cache::{DynamicCache, WriteResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, Sizing};
pub use error::{LiveTailError, Result};
pub use manager::{CacheManager, ChannelKey, FlushSink, MemorySink};
pub use series::{MultiSeries, Sample, Series};
pub use telem::{DataType, TimeRange, TimeStamp};
