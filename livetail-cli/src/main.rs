//! CLI for the livetail streaming cache.
//!
//! Provides commands for replaying recorded write sequences through a cache
//! and for benchmarking the write path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use livetail::clock::ManualClock;
use livetail::Clock;
use livetail::{
    Alignment, CacheConfig, CacheManager, ChannelKey, DataType, DynamicCache, MemorySink, MultiSeries, Series,
    TimeStamp,
};

/// livetail: Dynamic streaming cache for live telemetry.
#[derive(Parser)]
#[command(name = "livetail", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded write sequence and report each write's result.
    Replay {
        /// Path to the JSON replay file.
        file: PathBuf,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Run a write-path microbenchmark over a count-bound cache.
    Bench {
        /// Number of samples to write.
        #[arg(long, default_value = "10000000")]
        samples: u64,

        /// Buffer capacity in samples.
        #[arg(long, default_value = "10000")]
        capacity: u64,

        /// Samples per write batch.
        #[arg(long, default_value = "64")]
        batch: usize,
    },
}

/// Output format for replay results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON document.
    Json,
}

/// A recorded write sequence for one channel.
#[derive(Debug, Deserialize)]
struct ReplayFile {
    config: CacheConfig,
    writes: Vec<ReplayWrite>,
}

/// One recorded write call.
#[derive(Debug, Deserialize)]
struct ReplayWrite {
    /// Clock reading for this write; the clock holds still when omitted.
    #[serde(default)]
    at_ms: Option<u64>,
    series: Vec<ReplaySeries>,
}

/// One series in a recorded write batch.
#[derive(Debug, Deserialize)]
struct ReplaySeries {
    alignment: u64,
    values: Vec<f64>,
}

/// What one replayed write did.
#[derive(Debug, Serialize)]
struct WriteSummary {
    write: usize,
    at_ms: Option<u64>,
    flushed_buffers: usize,
    flushed: usize,
    allocated: usize,
    length: usize,
}

/// Replay channel; a replay file describes a single channel.
const REPLAY_CHANNEL: ChannelKey = ChannelKey(0);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay { file, format } => cmd_replay(&file, &format),
        Commands::Bench {
            samples,
            capacity,
            batch,
        } => cmd_bench(samples, capacity, batch),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Parses a replay document and validates its cache configuration.
fn parse_replay(json: &str) -> Result<ReplayFile, Box<dyn std::error::Error>> {
    let replay: ReplayFile = serde_json::from_str(json)?;
    replay.config.validate()?;
    Ok(replay)
}

/// Drives a manager through every recorded write and summarizes each call.
fn replay(replay: &ReplayFile) -> Result<(Vec<WriteSummary>, Vec<Series>), Box<dyn std::error::Error>> {
    let clock = ManualClock::new(TimeStamp::ZERO);
    let mut manager = CacheManager::with_clock(MemorySink::default(), Arc::new(clock.clone()));
    manager.open(REPLAY_CHANNEL, replay.config)?;

    let data_type = replay.config.data_type;
    let mut summaries = Vec::with_capacity(replay.writes.len());

    for (index, write) in replay.writes.iter().enumerate() {
        if let Some(at_ms) = write.at_ms {
            clock.set(TimeStamp::from_millis(i64::try_from(at_ms)?));
        }

        let batch: MultiSeries = write
            .series
            .iter()
            .map(|s| Series::from_f64(data_type, &s.values, Alignment(s.alignment), clock.now().open_range()))
            .collect();

        let sink = manager.sink();
        let (buffers_before, samples_before) = (sink.flushed(REPLAY_CHANNEL).len(), sink.samples(REPLAY_CHANNEL));

        let allocated = manager.write(REPLAY_CHANNEL, &batch)?;

        let sink = manager.sink();
        summaries.push(WriteSummary {
            write: index,
            at_ms: write.at_ms,
            flushed_buffers: sink.flushed(REPLAY_CHANNEL).len() - buffers_before,
            flushed: sink.samples(REPLAY_CHANNEL) - samples_before,
            allocated: allocated.len(),
            length: manager.length(REPLAY_CHANNEL).unwrap_or(0),
        });
    }

    manager.close(REPLAY_CHANNEL)?;
    let buffers = manager.into_sink().take(REPLAY_CHANNEL);
    tracing::debug!(
        writes = summaries.len(),
        buffers = buffers.len(),
        samples = buffers.iter().map(Series::len).sum::<usize>(),
        "replay complete"
    );
    Ok((summaries, buffers))
}

/// Implements `livetail replay <file>`.
fn cmd_replay(file: &Path, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read replay file '{}': {e}", file.display()))?;
    let parsed = parse_replay(&json)?;
    let (summaries, buffers) = replay(&parsed)?;

    match format {
        OutputFormat::Csv => {
            println!(
                "# config={}, writes={}, buffers={}",
                serde_json::to_string(&parsed.config)?,
                summaries.len(),
                buffers.len()
            );
            println!("write,at_ms,flushed_buffers,flushed,allocated,length");
            for s in &summaries {
                let at_ms = s.at_ms.map(|ms| ms.to_string()).unwrap_or_default();
                println!(
                    "{},{at_ms},{},{},{},{}",
                    s.write, s.flushed_buffers, s.flushed, s.allocated, s.length
                );
            }
        }
        OutputFormat::Json => {
            let buffers: Vec<serde_json::Value> = buffers
                .iter()
                .map(|b| {
                    serde_json::json!({
                        "alignment": b.alignment(),
                        "len": b.len(),
                        "time_range": b.time_range(),
                    })
                })
                .collect();

            let output = serde_json::json!({
                "config": parsed.config,
                "writes": summaries,
                "buffers": buffers,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `livetail bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(samples: u64, capacity: u64, batch: usize) -> Result<(), Box<dyn std::error::Error>> {
    if batch == 0 {
        return Err("batch must be > 0".into());
    }

    println!("livetail write-path benchmark");
    println!("  Samples: {samples}");
    println!("  Capacity: {capacity}");
    println!("  Batch: {batch}");
    println!();

    let mut cache = DynamicCache::new(CacheConfig::count_bound(capacity, DataType::Float64)?)?;
    let values: Vec<f64> = (0..batch).map(|i| i as f64).collect();
    let batch_len = batch as u64;
    let writes = samples / batch_len;

    println!("Writing {} samples in {writes} batches...", writes * batch_len);

    let mut alignment = Alignment(0);
    let mut flushed_buffers = 0usize;
    let start = Instant::now();

    for _ in 0..writes {
        let next = MultiSeries::from(Series::from_values(&values, alignment, TimeStamp::ZERO.open_range()));
        let result = cache.write(&next)?;
        flushed_buffers += result.flushed.series().len();
        alignment = alignment.advance(batch);
    }

    let elapsed = start.elapsed();
    let total = writes * batch_len;
    let ns_per_sample = elapsed.as_nanos() as f64 / total as f64;
    let samples_per_sec = total as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results:");
    println!("  Total samples: {total}");
    println!("  Buffers flushed: {flushed_buffers}");
    println!("  Live samples: {}", cache.length());
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {ns_per_sample:.1} ns/sample");
    println!("  Throughput: {samples_per_sec:.0} samples/sec");
    println!();

    Ok(())
}
