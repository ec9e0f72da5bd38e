//! Cache configuration: sizing policy and data type.
//!
//! A cache is configured once per channel and never reconfigured mid-stream.
//! The sizing policy is a single tagged enum, so a configuration can never
//! carry both a sample capacity and a time span, or neither.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::telem::DataType;

/// Largest byte size a single count-bound buffer may occupy.
///
/// Count-bound buffers reserve their full capacity up front; this keeps a
/// misconfigured capacity from reserving more than 4 GiB per channel. The
/// effective ceiling is also capped at `usize::MAX` on narrower targets.
pub const MAX_BUFFER_BYTES: u64 = 1 << 32;

/// How a live buffer decides it is done.
///
/// # Serialization
///
/// Externally tagged, with the span in floating-point seconds:
///
/// ```json
/// {"count_bound": 1000}
/// {"time_bound": 1.5}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sizing {
    /// Rotate after a fixed number of samples.
    CountBound(u64),

    /// Rotate once the buffer's first sample is older than the span.
    TimeBound(#[serde(with = "duration_serde")] Duration),
}

impl Sizing {
    /// Returns the fixed sample capacity, or `None` for a time-bound policy.
    pub fn capacity(&self) -> Option<u64> {
        match self {
            Self::CountBound(capacity) => Some(*capacity),
            Self::TimeBound(_) => None,
        }
    }

    /// Returns the rotation span, or `None` for a count-bound policy.
    pub fn span(&self) -> Option<Duration> {
        match self {
            Self::CountBound(_) => None,
            Self::TimeBound(span) => Some(*span),
        }
    }
}

/// Static configuration for one channel's dynamic cache.
///
/// # Example
///
/// ```rust
/// use livetail::{CacheConfig, DataType, Sizing};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let by_count = CacheConfig::count_bound(10_000, DataType::Float32)?;
/// let by_time = CacheConfig::time_bound(Duration::from_secs(5), DataType::Float64)?;
///
/// assert_eq!(by_count.sizing, Sizing::CountBound(10_000));
/// assert!(CacheConfig::count_bound(0, DataType::Float32).is_err());
/// # let _ = by_time;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Buffer rotation policy.
    pub sizing: Sizing,

    /// Data type every written series must carry.
    pub data_type: DataType,
}

impl CacheConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the sizing is not positive or the capacity
    /// is too large.
    pub fn new(sizing: Sizing, data_type: DataType) -> Result<Self> {
        let config = Self { sizing, data_type };
        config.validate()?;
        Ok(config)
    }

    /// Creates a validated count-bound configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] or [`ConfigError::CapacityTooLarge`].
    pub fn count_bound(capacity: u64, data_type: DataType) -> Result<Self> {
        Self::new(Sizing::CountBound(capacity), data_type)
    }

    /// Creates a validated time-bound configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSpan`] if `span` is zero.
    pub fn time_bound(span: Duration, data_type: DataType) -> Result<Self> {
        Self::new(Sizing::TimeBound(span), data_type)
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, or any validation
    /// error.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        match self.sizing {
            Sizing::CountBound(0) => Err(ConfigError::ZeroCapacity.into()),
            Sizing::CountBound(capacity) => {
                let max = self.max_capacity();
                if capacity > max {
                    return Err(ConfigError::CapacityTooLarge { capacity, max }.into());
                }
                Ok(())
            }
            Sizing::TimeBound(span) if span.is_zero() => Err(ConfigError::ZeroSpan.into()),
            Sizing::TimeBound(_) => Ok(()),
        }
    }

    /// Returns the largest count-bound capacity allowed for the data type.
    ///
    /// `max_capacity() * density` always fits in a `usize`.
    pub fn max_capacity(&self) -> u64 {
        let addressable = u64::try_from(usize::MAX).unwrap_or(u64::MAX);
        MAX_BUFFER_BYTES.min(addressable) / self.data_type.density() as u64
    }
}

/// Serde support for `Duration` as floating-point seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}
