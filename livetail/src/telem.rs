//! Telemetry primitives: timestamps, time ranges, and sample data types.
//!
//! Timestamps are signed nanoseconds since the Unix epoch. A live buffer's
//! time range ends at [`TimeStamp::MAX`] until it is sealed, so the sentinel
//! doubles as the "still being written" marker for consumers.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A point in time, in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(i64);

impl TimeStamp {
    /// The open-ended sentinel used as the end of a live range.
    pub const MAX: Self = Self(i64::MAX);

    /// The Unix epoch.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from nanoseconds since the epoch.
    pub const fn new(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Creates a timestamp from milliseconds since the epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Returns the current wall-clock time.
    ///
    /// Times before the epoch clamp to [`TimeStamp::ZERO`]; times past the
    /// representable range clamp to [`TimeStamp::MAX`].
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        Self(i64::try_from(nanos).unwrap_or(i64::MAX))
    }

    /// Returns the raw nanosecond value.
    pub const fn nanos(self) -> i64 {
        self.0
    }

    /// Returns the time elapsed from `earlier` to `self`.
    ///
    /// Saturates to zero when `earlier` is after `self`.
    pub fn span_since(self, earlier: Self) -> Duration {
        let diff = self.0.saturating_sub(earlier.0);
        Duration::from_nanos(u64::try_from(diff).unwrap_or(0))
    }

    /// Returns this timestamp advanced by `span`, saturating at [`TimeStamp::MAX`].
    pub fn saturating_add(self, span: Duration) -> Self {
        let nanos = i64::try_from(span.as_nanos()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// Returns the range from this timestamp to `end`.
    pub const fn range(self, end: Self) -> TimeRange {
        TimeRange { start: self, end }
    }

    /// Returns an open-ended range starting at this timestamp.
    pub const fn open_range(self) -> TimeRange {
        TimeRange {
            start: self,
            end: Self::MAX,
        }
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MAX {
            write!(f, "+inf")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start.
    pub start: TimeStamp,
    /// Exclusive end, or [`TimeStamp::MAX`] while open.
    pub end: TimeStamp,
}

impl TimeRange {
    /// Creates a new range.
    pub const fn new(start: TimeStamp, end: TimeStamp) -> Self {
        Self { start, end }
    }

    /// Returns whether the range has no closing bound yet.
    pub fn is_open(&self) -> bool {
        self.end == TimeStamp::MAX
    }

    /// Returns the duration covered by the range.
    pub fn span(&self) -> Duration {
        self.end.span_since(self.start)
    }

    /// Returns whether `ts` falls inside the range.
    pub fn contains(&self, ts: TimeStamp) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The type of every sample in a series.
///
/// Only fixed-density types are supported; every sample of a given type
/// occupies exactly [`DataType::density`] bytes in little-endian order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit IEEE float.
    Float64,
    /// 32-bit IEEE float.
    Float32,
    /// Signed 64-bit integer.
    Int64,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 64-bit integer.
    Uint64,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Nanosecond timestamp (stored as a signed 64-bit integer).
    Timestamp,
}

impl DataType {
    /// Returns the number of bytes occupied by one sample.
    pub const fn density(self) -> usize {
        match self {
            Self::Float64 | Self::Int64 | Self::Uint64 | Self::Timestamp => 8,
            Self::Float32 | Self::Int32 | Self::Uint32 => 4,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int8 | Self::Uint8 => 1,
        }
    }

    /// Returns the lowercase name used in configuration and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float64 => "float64",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Int32 => "int32",
            Self::Int16 => "int16",
            Self::Int8 => "int8",
            Self::Uint64 => "uint64",
            Self::Uint32 => "uint32",
            Self::Uint16 => "uint16",
            Self::Uint8 => "uint8",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
