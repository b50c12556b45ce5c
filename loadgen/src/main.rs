//! Load generator: concurrent publishers pushing records through a batching pipeline

use anyhow::{Context, Result};
use batchlog::prelude::*;
use batchlog::pipeline::dispatch::DispatchOutcome;
use batchlog::pipeline::fields::Field;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "batchlog-loadgen")]
#[command(about = "Publishes records from concurrent tasks through a batching sink", version)]
struct Cli {
    /// number of concurrent publishing tasks
    #[arg(long, default_value_t = 8, env = "BATCHLOG_LOADGEN_PUBLISHERS")]
    publishers: usize,

    /// records emitted by each publisher
    #[arg(long, default_value_t = 1000, env = "BATCHLOG_LOADGEN_RECORDS")]
    records: usize,

    #[arg(long, default_value_t = 20)]
    max_batch: usize,

    #[arg(long, default_value_t = 1000)]
    flush_rate_ms: u64,

    /// json or text
    #[arg(long, default_value_t = EncoderKind::Json)]
    encoder: EncoderKind,

    #[arg(long, default_value_t = Level::Info)]
    min_level: Level,

    /// file to write to, `-` for stdout
    #[arg(long, default_value = "-")]
    output: String,
}

fn open_output(path: &str) -> Result<SharedOutput> {
    if path == "-" {
        return Ok(stdout_output());
    }
    let file = File::create(path).with_context(|| format!("creating {path}"))?;
    Ok(shared_output(BufWriter::new(file)))
}

async fn publish_records(pipeline: Arc<Pipeline>, publisher: usize, records: usize) -> usize {
    let mut dispatched = 0;
    for seq in 0..records {
        let entry = pipeline
            .entry()
            .with_fields([Field::new("publisher", publisher), Field::new("seq", seq)]);
        let outcome = match seq % 100 {
            0 => entry.error("simulated failure", "request failed"),
            n if n % 10 == 0 => entry.warn("request slow"),
            n if n % 2 == 0 => entry.debug("request details"),
            _ => entry.info("request served"),
        };
        if matches!(outcome, DispatchOutcome::Dispatched(_)) {
            dispatched += 1;
        }
        if seq % 64 == 0 {
            tokio::task::yield_now().await;
        }
    }
    dispatched
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let guard = PipelineGuardBuilder::default()
        .with_min_level(args.min_level)
        .with_encoder(args.encoder)
        .with_max_batch(args.max_batch)
        .with_flush_rate(Duration::from_millis(args.flush_rate_ms))
        .with_pool_prewarm(args.publishers * 2)
        .with_output(open_output(&args.output)?)
        .build()
        .with_context(|| "building pipeline")?;

    let begin = Instant::now();
    let mut tasks = Vec::with_capacity(args.publishers);
    for publisher in 0..args.publishers {
        tasks.push(tokio::spawn(publish_records(
            guard.pipeline().clone(),
            publisher,
            args.records,
        )));
    }
    let mut dispatched = 0;
    for task in tasks {
        dispatched += task.await.with_context(|| "joining publisher")?;
    }
    let pool = guard.pipeline().pool().stats();
    let stats = guard.shutdown().await;
    let elapsed = begin.elapsed();

    tracing::info!(?elapsed, "load generation done");
    eprintln!(
        "published={} dispatched={dispatched} flushes={} written={} write_errors={} pool_hit_rate={:.3} elapsed={elapsed:?}",
        args.publishers * args.records,
        stats.flushes,
        stats.blobs_written,
        stats.write_errors,
        pool.hit_rate(),
    );
    Ok(())
}
