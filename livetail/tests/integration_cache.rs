//! Integration tests for the dynamic cache write path.
//!
//! Covers the capacity, continuity, and time-bound rotation properties, the
//! reference scenarios, and a seeded round-trip over arbitrary write shapes.

#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use livetail::clock::ManualClock;
use livetail::{
    Alignment, CacheConfig, Clock, DataType, DynamicCache, MultiSeries, Series, TimeRange, TimeStamp,
};

/// Creates a count-bound float32 cache driven by a manual clock.
fn count_cache(capacity: u64) -> (DynamicCache, ManualClock) {
    let clock = ManualClock::new(TimeStamp::from_millis(1_700_000_000_000));
    let config = CacheConfig::count_bound(capacity, DataType::Float32).unwrap();
    let cache = DynamicCache::with_clock(config, Arc::new(clock.clone())).unwrap();
    (cache, clock)
}

fn series(values: &[f32], alignment: u64) -> Series {
    Series::from_values(values, Alignment(alignment), TimeStamp::ZERO.open_range())
}

fn batch(values: &[f32], alignment: u64) -> MultiSeries {
    MultiSeries::from(series(values, alignment))
}

/// `count` sequential values starting at `first`.
#[allow(clippy::cast_precision_loss)] // Test values stay well below 2^24
fn ramp(first: usize, count: usize) -> Vec<f32> {
    (first..first + count).map(|v| v as f32).collect()
}

#[test]
fn test_writes_within_capacity_never_flush() {
    let (mut cache, _) = count_cache(100);
    let mut alignment = 0u64;
    let mut total = 0usize;

    for count in [3, 1, 17, 40, 39] {
        let result = cache.write(&batch(&ramp(total, count), alignment)).unwrap();
        total += count;
        alignment += count as u64;

        assert!(result.flushed.is_empty());
        assert_eq!(result.allocated.len(), count, "allocated reports only new samples");
        assert_eq!(cache.length(), total);
    }
    assert_eq!(total, 100);
}

#[test]
fn test_exact_fill_flushes_one_full_buffer() {
    let (mut cache, _) = count_cache(10);
    cache.write(&batch(&ramp(0, 4), 0)).unwrap();
    let filled = cache.write(&batch(&ramp(4, 6), 4)).unwrap();
    assert!(filled.flushed.is_empty());
    assert_eq!(cache.length(), 10);

    let result = cache.write(&batch(&ramp(10, 1), 10)).unwrap();
    assert_eq!(result.flushed.series().len(), 1);
    assert_eq!(result.flushed.len(), 10);
    assert_eq!(result.flushed.to_f64_vec(), (0..10).map(f64::from).collect::<Vec<_>>());
    assert_eq!(cache.length(), 1);
}

#[test]
fn test_overflow_partitions_into_full_buffers() {
    for (capacity, total) in [(4u64, 10usize), (4, 12), (3, 1), (1, 5), (7, 50)] {
        let (mut cache, _) = count_cache(capacity);
        let result = cache.write(&batch(&ramp(0, total), 0)).unwrap();

        let capacity = capacity as usize;
        let buffers = total.div_ceil(capacity);
        assert_eq!(result.flushed.series().len(), buffers - 1);
        assert!(result.flushed.iter().all(|s| s.len() == capacity));
        assert_eq!(result.flushed.len() + cache.length(), total);
        assert_eq!(result.allocated.len(), total);
    }
}

#[test]
fn test_discontinuity_flushes_with_capacity_remaining() {
    let (mut cache, _) = count_cache(100);
    cache.write(&batch(&[1.0, 2.0, 3.0], 0)).unwrap();

    let result = cache.write(&batch(&[1.0, 2.0, 3.0], 5)).unwrap();
    assert_eq!(result.flushed.len(), 3);
    assert_eq!(result.allocated.len(), 3);
    assert_eq!(cache.length(), 3);
    assert_eq!(cache.live().unwrap().alignment(), Alignment(5));
}

#[test]
fn test_scenario_first_write() {
    let (mut cache, clock) = count_cache(100);
    let result = cache.write(&batch(&[1.0, 2.0, 3.0], 0)).unwrap();

    assert_eq!(result.allocated.len(), 3);
    assert_eq!(result.flushed.len(), 0);

    let range = result.allocated.series()[0].time_range();
    assert_eq!(range.start, clock.now());
    assert_eq!(range.end, TimeStamp::MAX);
}

#[test]
fn test_scenario_capacity_two_write_three() {
    let (mut cache, _) = count_cache(2);
    let result = cache.write(&batch(&[1.0, 2.0, 3.0], 0)).unwrap();

    assert_eq!(result.flushed.len(), 2);
    assert_eq!(result.allocated.len(), 3);
    assert!(result.flushed.series()[0].ptr_eq(&result.allocated.series()[0]));
    assert_eq!(cache.length(), 1);
}

#[test]
fn test_scenario_capacity_one_write_three() {
    let (mut cache, _) = count_cache(1);
    let result = cache.write(&batch(&[1.0, 2.0, 3.0], 0)).unwrap();

    assert_eq!(result.flushed.len(), 2);
    assert_eq!(result.allocated.len(), 3);
    assert_eq!(cache.length(), 1);

    let flushed = result.flushed.series();
    assert!(flushed[0].ptr_eq(&result.allocated.series()[0]));
    assert!(flushed[1].ptr_eq(&result.allocated.series()[1]));
    assert_eq!(cache.live().unwrap().alignment(), Alignment(2));
}

#[test]
fn test_time_bound_manual_clock() {
    let clock = ManualClock::new(TimeStamp::from_millis(10_000));
    let span = Duration::from_millis(250);
    let config = CacheConfig::time_bound(span, DataType::Float32).unwrap();
    let mut cache = DynamicCache::with_clock(config, Arc::new(clock.clone())).unwrap();
    let start = clock.now();

    cache.write(&batch(&ramp(0, 3), 0)).unwrap();
    clock.advance(Duration::from_millis(100));
    let result = cache.write(&batch(&ramp(3, 2), 3)).unwrap();
    assert!(result.flushed.is_empty());

    clock.advance(Duration::from_millis(200));
    let result = cache.write(&batch(&ramp(5, 1), 5)).unwrap();
    assert_eq!(result.flushed.len(), 5, "expiry flushes regardless of sample count");
    assert_eq!(
        result.flushed.series()[0].time_range(),
        TimeRange::new(start, start.saturating_add(Duration::from_millis(300)))
    );
    assert_eq!(cache.length(), 1);
}

#[test]
fn test_time_bound_system_clock() {
    let span = Duration::from_millis(20);
    let config = CacheConfig::time_bound(span, DataType::Float32).unwrap();
    let mut cache = DynamicCache::new(config).unwrap();

    let started = Instant::now();
    cache.write(&batch(&[1.0], 0)).unwrap();
    thread::sleep(Duration::from_millis(60));
    let result = cache.write(&batch(&[2.0], 1)).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.flushed.len(), 1);
    let flushed_span = result.flushed.series()[0].time_range().span();
    let drift = flushed_span.abs_diff(elapsed);
    assert!(drift <= Duration::from_millis(20), "span {flushed_span:?} vs elapsed {elapsed:?}");
}

#[test]
fn test_injected_closure_clock() {
    let clock: Arc<dyn Clock> = Arc::new(|| TimeStamp::from_millis(42));
    let config = CacheConfig::count_bound(8, DataType::Float32).unwrap();
    let mut cache = DynamicCache::with_clock(config, clock).unwrap();

    cache.write(&batch(&[1.0], 0)).unwrap();
    assert_eq!(cache.live().unwrap().time_range().start, TimeStamp::from_millis(42));
}

#[test]
fn test_flushed_buffers_are_immutable() {
    let (mut cache, _) = count_cache(2);
    let result = cache.write(&batch(&[1.0, 2.0, 3.0], 0)).unwrap();
    let sealed = result.flushed.series()[0].clone();

    for i in 0..20 {
        cache.write(&batch(&[9.0], 3 + i)).unwrap();
    }
    assert_eq!(sealed.values::<f32>().unwrap(), vec![1.0, 2.0]);
}

/// Minimal deterministic generator for write shapes.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn test_round_trip_reconstructs_stream() {
    for (seed, capacity) in [(1u64, 1u64), (7, 2), (42, 3), (1_234, 16), (99, 64)] {
        let (mut cache, clock) = count_cache(capacity);
        let mut rng = Lcg(seed);

        let mut next_value = 0usize;
        let mut alignment = 0u64;
        let mut written_values = Vec::new();
        let mut written_alignments = Vec::new();
        let mut flushed = MultiSeries::default();

        for _ in 0..200 {
            let mut parts = Vec::new();
            for _ in 0..=rng.next(3) {
                match rng.next(10) {
                    0 => alignment += 1 + rng.next(5),
                    1 => alignment = alignment.saturating_sub(1 + rng.next(3)),
                    _ => {}
                }
                let count = rng.next(9) as usize;
                let values = ramp(next_value, count);
                next_value += count;

                written_values.extend(values.iter().map(|&v| f64::from(v)));
                written_alignments.extend(alignment..alignment + count as u64);
                parts.push(series(&values, alignment));
                alignment += count as u64;
            }

            let batch: MultiSeries = parts.into_iter().collect();
            let result = cache.write(&batch).unwrap();
            assert_eq!(result.allocated.len(), batch.len());
            flushed.extend(result.flushed);
            clock.advance(Duration::from_millis(1));
        }

        let mut stream = flushed;
        stream.extend(cache.live());

        assert_eq!(stream.to_f64_vec(), written_values, "seed {seed}, capacity {capacity}");

        let alignments: Vec<u64> = stream
            .iter()
            .flat_map(|s| s.alignment().0..s.alignment().0 + s.len() as u64)
            .collect();
        assert_eq!(alignments, written_alignments);

        let capacity = capacity as usize;
        assert!(stream.iter().all(|s| !s.is_empty() && s.len() <= capacity));
    }
}
