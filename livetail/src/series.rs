//! Series and multi-series: typed windows over shared sample storage.
//!
//! A [`Series`] is a contiguous, ordered run of samples of one [`DataType`],
//! tagged with the alignment of its first sample and a time range. It does not
//! own its bytes. It is a window (`offset`, `len`) over a reference-counted,
//! append-only storage region, so cloning or slicing a series never copies
//! sample data.
//!
//! # Zero-copy sharing
//!
//! The dynamic cache hands out windows over its live buffer's storage in both
//! of a write's result sets. When a buffer fills and is sealed during the same
//! write that introduced its samples, the sealed series in `flushed` and the
//! region in `allocated` are windows over the same storage object. Callers can
//! detect this with [`Series::ptr_eq`] and skip re-uploading the region.
//!
//! Storage is append-only: bytes inside any window handed out are never
//! rewritten, so a window stays valid and unchanged for as long as the caller
//! holds it, even while the cache keeps appending past its end.

use std::ops::Range;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use crate::alignment::{Alignment, AlignmentBounds};
use crate::error::{Result, SeriesError};
use crate::telem::{DataType, TimeRange, TimeStamp};

/// Append-only sample bytes shared between a buffer and every window over it.
#[derive(Debug, Default)]
pub(crate) struct Storage {
    bytes: RwLock<Vec<u8>>,
}

impl Storage {
    /// Creates empty storage with room for `capacity` bytes.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Wraps already-encoded bytes.
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    // Appends never touch existing bytes, so a guard poisoned by a panicking
    // writer still guards a consistent prefix.
    fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.bytes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends bytes to the end of the region.
    pub(crate) fn append(&self, src: &[u8]) {
        self.bytes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(src);
    }

    /// Releases reserved space past the written bytes.
    pub(crate) fn shrink_to_fit(&self) {
        self.bytes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shrink_to_fit();
    }

    /// Returns the allocated size in bytes.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.read().capacity()
    }
}

/// A primitive that can be stored as a sample.
///
/// Implemented for every Rust primitive with a matching [`DataType`], and for
/// [`TimeStamp`].
pub trait Sample: Copy + Send + Sync + 'static {
    /// The data type this primitive is stored as.
    const DATA_TYPE: DataType;

    /// Appends the little-endian encoding of `self` to `out`.
    fn encode(self, out: &mut Vec<u8>);

    /// Decodes one sample from exactly [`DataType::density`] bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Converts the sample to `f64` for rendering and export.
    fn to_f64(self) -> f64;

    /// Converts an `f64` into this primitive, saturating for integers.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_sample {
    ($($ty:ty => $data_type:expr),* $(,)?) => {
        $(
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_lossless,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::unnecessary_cast
            )]
            impl Sample for $ty {
                const DATA_TYPE: DataType = $data_type;

                #[inline]
                fn encode(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_sample! {
    f64 => DataType::Float64,
    f32 => DataType::Float32,
    i64 => DataType::Int64,
    i32 => DataType::Int32,
    i16 => DataType::Int16,
    i8 => DataType::Int8,
    u64 => DataType::Uint64,
    u32 => DataType::Uint32,
    u16 => DataType::Uint16,
    u8 => DataType::Uint8,
}

impl Sample for TimeStamp {
    const DATA_TYPE: DataType = DataType::Timestamp;

    fn encode(self, out: &mut Vec<u8>) {
        self.nanos().encode(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        Self::new(i64::decode(bytes))
    }

    #[allow(clippy::cast_precision_loss)] // Display-only conversion
    fn to_f64(self) -> f64 {
        self.nanos() as f64
    }

    #[allow(clippy::cast_possible_truncation)] // Saturating float-to-int cast
    fn from_f64(value: f64) -> Self {
        Self::new(value as i64)
    }
}

fn encode_all<T: Sample>(values: impl IntoIterator<Item = T>, capacity: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(capacity * T::DATA_TYPE.density());
    for value in values {
        value.encode(&mut bytes);
    }
    bytes
}

fn decode_all<T: Sample>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::DATA_TYPE.density()).map(T::decode).collect()
}

fn decode_f64<T: Sample>(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(T::DATA_TYPE.density())
        .map(|chunk| T::decode(chunk).to_f64())
        .collect()
}

fn from_f64_values<T: Sample>(values: &[f64]) -> Vec<u8> {
    encode_all(values.iter().map(|v| T::from_f64(*v)), values.len())
}

/// A typed, alignment-tagged run of samples.
///
/// Cloning is cheap: clones share the underlying storage.
#[derive(Debug, Clone)]
pub struct Series {
    data_type: DataType,
    storage: Arc<Storage>,
    /// Offset of the first sample within the storage, in samples.
    offset: usize,
    /// Number of samples in the window.
    len: usize,
    alignment: Alignment,
    time_range: TimeRange,
}

impl Series {
    /// Creates a series from typed values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use livetail::{Alignment, DataType, Series, TimeStamp};
    ///
    /// let series = Series::from_values(&[1.0f32, 2.0, 3.0], Alignment(0), TimeStamp::ZERO.open_range());
    /// assert_eq!(series.len(), 3);
    /// assert_eq!(series.data_type(), DataType::Float32);
    /// assert_eq!(series.alignment_bounds().upper, Alignment(3));
    /// ```
    pub fn from_values<T: Sample>(values: &[T], alignment: Alignment, time_range: TimeRange) -> Self {
        let bytes = encode_all(values.iter().copied(), values.len());
        Self {
            data_type: T::DATA_TYPE,
            storage: Arc::new(Storage::from_vec(bytes)),
            offset: 0,
            len: values.len(),
            alignment,
            time_range,
        }
    }

    /// Creates a series of `data_type` from `f64` values, converting each one.
    ///
    /// Integer types saturate on overflow and truncate fractions.
    pub fn from_f64(
        data_type: DataType,
        values: &[f64],
        alignment: Alignment,
        time_range: TimeRange,
    ) -> Self {
        let bytes = match data_type {
            DataType::Float64 => from_f64_values::<f64>(values),
            DataType::Float32 => from_f64_values::<f32>(values),
            DataType::Int64 => from_f64_values::<i64>(values),
            DataType::Int32 => from_f64_values::<i32>(values),
            DataType::Int16 => from_f64_values::<i16>(values),
            DataType::Int8 => from_f64_values::<i8>(values),
            DataType::Uint64 => from_f64_values::<u64>(values),
            DataType::Uint32 => from_f64_values::<u32>(values),
            DataType::Uint16 => from_f64_values::<u16>(values),
            DataType::Uint8 => from_f64_values::<u8>(values),
            DataType::Timestamp => from_f64_values::<TimeStamp>(values),
        };
        Self {
            data_type,
            storage: Arc::new(Storage::from_vec(bytes)),
            offset: 0,
            len: values.len(),
            alignment,
            time_range,
        }
    }

    /// Creates a series from raw little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::InvalidByteLength`] if `bytes` is not a whole
    /// number of samples.
    pub fn from_bytes(
        data_type: DataType,
        bytes: Vec<u8>,
        alignment: Alignment,
        time_range: TimeRange,
    ) -> Result<Self> {
        let density = data_type.density();
        if !bytes.len().is_multiple_of(density) {
            return Err(SeriesError::InvalidByteLength {
                len: bytes.len(),
                data_type,
                density,
            }
            .into());
        }
        Ok(Self {
            data_type,
            len: bytes.len() / density,
            storage: Arc::new(Storage::from_vec(bytes)),
            offset: 0,
            alignment,
            time_range,
        })
    }

    /// Returns the allocated size of the underlying storage in bytes.
    #[cfg(test)]
    pub(crate) fn storage_capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Creates a window over existing storage.
    pub(crate) fn window(
        storage: Arc<Storage>,
        data_type: DataType,
        offset: usize,
        len: usize,
        alignment: Alignment,
        time_range: TimeRange,
    ) -> Self {
        Self {
            data_type,
            storage,
            offset,
            len,
            alignment,
            time_range,
        }
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the data type of every sample.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the alignment of the first sample.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Returns the alignment bounds `[first, last + 1)`.
    pub fn alignment_bounds(&self) -> AlignmentBounds {
        AlignmentBounds::from_len(self.alignment, self.len)
    }

    /// Returns the time range. Open-ended while the series is live.
    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    /// Returns the number of bytes the samples occupy.
    pub fn byte_len(&self) -> usize {
        self.len * self.data_type.density()
    }

    /// Returns a sub-window of this series, clamped to its bounds.
    ///
    /// The slice shares storage with `self`; its alignment starts at the
    /// alignment of the first selected sample.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let start = range.start.min(self.len);
        let end = range.end.clamp(start, self.len);
        Self {
            data_type: self.data_type,
            storage: Arc::clone(&self.storage),
            offset: self.offset + start,
            len: end - start,
            alignment: self.alignment.advance(start),
            time_range: self.time_range,
        }
    }

    /// Returns whether both series are the same window over the same storage
    /// object.
    ///
    /// This is the zero-copy signal: a flushed buffer and an allocated region
    /// that satisfy `ptr_eq` hold identical bytes without a copy.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
            && self.offset == other.offset
            && self.len == other.len
    }

    /// Returns whether both series read from the same storage object, possibly
    /// through different windows.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Copies the window's bytes out of the shared storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        let density = self.data_type.density();
        let start = self.offset * density;
        let bytes = self.storage.read();
        bytes[start..start + self.len * density].to_vec()
    }

    /// Returns the samples as typed values.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::DataTypeMismatch`] if `T` is not stored as this
    /// series' data type.
    pub fn values<T: Sample>(&self) -> Result<Vec<T>> {
        if T::DATA_TYPE != self.data_type {
            return Err(SeriesError::DataTypeMismatch {
                requested: T::DATA_TYPE,
                actual: self.data_type,
            }
            .into());
        }
        Ok(decode_all(&self.to_bytes()))
    }

    /// Returns the samples converted to `f64`, whatever the data type.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let bytes = self.to_bytes();
        match self.data_type {
            DataType::Float64 => decode_f64::<f64>(&bytes),
            DataType::Float32 => decode_f64::<f32>(&bytes),
            DataType::Int64 => decode_f64::<i64>(&bytes),
            DataType::Int32 => decode_f64::<i32>(&bytes),
            DataType::Int16 => decode_f64::<i16>(&bytes),
            DataType::Int8 => decode_f64::<i8>(&bytes),
            DataType::Uint64 => decode_f64::<u64>(&bytes),
            DataType::Uint32 => decode_f64::<u32>(&bytes),
            DataType::Uint16 => decode_f64::<u16>(&bytes),
            DataType::Uint8 => decode_f64::<u8>(&bytes),
            DataType::Timestamp => decode_f64::<TimeStamp>(&bytes),
        }
    }
}

/// An ordered list of series sharing a data type.
///
/// Used both for write batches and for the `flushed`/`allocated` result sets.
/// [`MultiSeries::len`] counts samples across all series, not series.
#[derive(Debug, Clone, Default)]
pub struct MultiSeries {
    series: Vec<Series>,
}

impl MultiSeries {
    /// Creates a multi-series from an ordered list of series.
    pub fn new(series: Vec<Series>) -> Self {
        Self { series }
    }

    /// Returns the total number of samples across all series.
    pub fn len(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    /// Returns whether there are no samples at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the series in order.
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Returns an iterator over the series.
    pub fn iter(&self) -> std::slice::Iter<'_, Series> {
        self.series.iter()
    }

    /// Appends a series.
    pub fn push(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Returns the data type of the first series, if any.
    pub fn data_type(&self) -> Option<DataType> {
        self.series.first().map(Series::data_type)
    }

    /// Returns the alignment bounds from the first series' start to the last
    /// series' end.
    pub fn alignment_bounds(&self) -> Option<AlignmentBounds> {
        let first = self.series.first()?;
        let last = self.series.last()?;
        Some(AlignmentBounds {
            lower: first.alignment(),
            upper: last.alignment_bounds().upper,
        })
    }

    /// Returns every sample, in order, converted to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        for series in &self.series {
            out.extend(series.to_f64_vec());
        }
        out
    }
}

impl From<Vec<Series>> for MultiSeries {
    fn from(series: Vec<Series>) -> Self {
        Self::new(series)
    }
}

impl From<Series> for MultiSeries {
    fn from(series: Series) -> Self {
        Self::new(vec![series])
    }
}

impl FromIterator<Series> for MultiSeries {
    fn from_iter<I: IntoIterator<Item = Series>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Extend<Series> for MultiSeries {
    fn extend<I: IntoIterator<Item = Series>>(&mut self, iter: I) {
        self.series.extend(iter);
    }
}

impl IntoIterator for MultiSeries {
    type Item = Series;
    type IntoIter = std::vec::IntoIter<Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiSeries {
    type Item = &'a Series;
    type IntoIter = std::slice::Iter<'a, Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}
