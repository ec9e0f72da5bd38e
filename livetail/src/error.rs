//! Error types for the livetail streaming cache.

use thiserror::Error;

use crate::manager::ChannelKey;
use crate::telem::DataType;

/// The main error type for all livetail operations.
///
/// Every failure is a caller or configuration error surfaced synchronously.
/// The cache performs no I/O, so there is nothing to retry: the caller decides
/// whether to drop the batch, disconnect, or report a status.
#[derive(Error, Debug)]
pub enum LiveTailError {
    /// Error in cache configuration, raised at construction.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error during a cache write (ingest path).
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Error accessing or building a series.
    #[error("series error: {0}")]
    Series(#[from] SeriesError),

    /// Error routing to a channel through the manager.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Errors that can occur when validating a cache configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A count-bound buffer must hold at least one sample.
    #[error("count-bound capacity must be > 0")]
    ZeroCapacity,

    /// A time-bound buffer must span a positive duration.
    #[error("time-bound span must be > 0")]
    ZeroSpan,

    /// The capacity cannot be addressed in memory for the configured data type.
    #[error("count-bound capacity {capacity} exceeds the maximum of {max} samples")]
    CapacityTooLarge {
        /// The requested capacity in samples.
        capacity: u64,
        /// The largest supported capacity for the data type.
        max: u64,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse cache config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur during a cache write.
#[derive(Error, Debug)]
pub enum WriteError {
    /// A series in the batch does not carry the cache's data type.
    #[error("series {index} has data type {found}, cache expects {expected}")]
    DataTypeMismatch {
        /// The data type the cache was configured with.
        expected: DataType,
        /// The data type found on the offending series.
        found: DataType,
        /// Position of the offending series within the batch.
        index: usize,
    },
}

/// Errors that can occur when building or reading a series.
#[derive(Error, Debug)]
pub enum SeriesError {
    /// Values were requested as a primitive that does not match the series.
    #[error("cannot read {actual} series as {requested}")]
    DataTypeMismatch {
        /// The data type requested by the reader.
        requested: DataType,
        /// The data type stored in the series.
        actual: DataType,
    },

    /// Raw bytes do not divide evenly into samples.
    #[error("{len} bytes is not a multiple of the {data_type} density ({density} bytes)")]
    InvalidByteLength {
        /// The number of bytes supplied.
        len: usize,
        /// The declared data type.
        data_type: DataType,
        /// Bytes per sample for the data type.
        density: usize,
    },
}

/// Errors that can occur when routing through the cache manager.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No cache is open for the channel.
    #[error("no cache open for channel {channel}")]
    NotFound {
        /// The channel that was requested.
        channel: ChannelKey,
    },

    /// A cache is already open for the channel.
    #[error("cache for channel {channel} is already open")]
    AlreadyOpen {
        /// The channel that was requested.
        channel: ChannelKey,
    },
}

/// Type alias for `Result<T, LiveTailError>`.
pub type Result<T> = std::result::Result<T, LiveTailError>;
