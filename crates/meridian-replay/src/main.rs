//! Meridian Replay - synthetic order flow replay and latency report.
//!
//! Drives a deterministic workload through the matching engine, either
//! in-process or through a sequencer fed by several producer threads,
//! then checks the book's invariants and reports latency distributions.

mod config;
mod resting;
mod workload;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use meridian_core::{EngineError, MatchingEngine, Trade};
use meridian_metrics::{LatencyHistogram, Stopwatch};
use meridian_sequencer::{Sequencer, SequencerError, SequencerHandle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::ReplayConfig;
use crate::resting::RestingOrders;
use crate::workload::{Action, Workload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Call the engine directly on this thread.
    Direct,
    /// Go through a sequencer from several producer threads.
    Sequenced,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Replay a synthetic order flow through the matching engine")]
struct Args {
    /// Number of workload steps.
    #[arg(short = 'n', long, default_value_t = 100_000)]
    orders: u64,

    #[arg(short, long, value_enum, default_value_t = Mode::Direct)]
    mode: Mode,

    /// Producer threads in sequenced mode.
    #[arg(short, long, default_value_t = 4)]
    producers: u64,

    /// Every N-th step cancels a resting order (0 disables).
    #[arg(long, default_value_t = 7)]
    cancel_every: u64,

    /// Configuration file (toml, yaml or json).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write every trade to stdout as a JSON line.
    #[arg(long)]
    emit_trades: bool,
}

/// Per-producer results.
struct RunStats {
    submit_latency: LatencyHistogram,
    cancel_latency: LatencyHistogram,
    trades: Vec<Trade>,
    trade_count: u64,
    cancels: u64,
    cancel_misses: u64,
}

impl RunStats {
    fn new() -> Result<Self> {
        Ok(Self {
            submit_latency: LatencyHistogram::new()?,
            cancel_latency: LatencyHistogram::new()?,
            trades: Vec::new(),
            trade_count: 0,
            cancels: 0,
            cancel_misses: 0,
        })
    }

    fn merge(&mut self, other: RunStats) {
        self.submit_latency.merge(&other.submit_latency);
        self.cancel_latency.merge(&other.cancel_latency);
        self.trades.extend(other.trades);
        self.trade_count += other.trade_count;
        self.cancels += other.cancels;
        self.cancel_misses += other.cancel_misses;
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = ReplayConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    debug!(?config, "configuration loaded");

    info!(orders = args.orders, mode = ?args.mode, cancel_every = args.cancel_every, "starting replay");
    let workload = Workload::new(args.cancel_every);
    let engine = MatchingEngine::new(&config.engine);

    let started = Instant::now();
    let (engine, stats) = match args.mode {
        Mode::Direct => run_direct(engine, workload, args.orders, args.emit_trades)?,
        Mode::Sequenced => run_sequenced(engine, &config, workload, args.orders, args.producers.max(1), args.emit_trades)?,
    };
    let elapsed = started.elapsed();

    engine.verify().context("book invariants violated after replay")?;

    let rate = args.orders as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(elapsed = ?elapsed, rate = %format!("{rate:.0}/s"), trades = stats.trade_count, "replay finished");
    info!(summary = %stats.submit_latency.summary(), "submit latency");
    if stats.cancels > 0 {
        info!(summary = %stats.cancel_latency.summary(), misses = stats.cancel_misses, "cancel latency");
    }
    info!(
        best_bid = ?engine.best_bid(),
        best_ask = ?engine.best_ask(),
        bid_levels = engine.book().bids.level_count(),
        ask_levels = engine.book().asks.level_count(),
        resting = engine.order_count(),
        "final book"
    );

    if args.emit_trades {
        let mut out = BufWriter::new(io::stdout().lock());
        for trade in &stats.trades {
            serde_json::to_writer(&mut out, trade).context("failed to encode trade")?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }
    Ok(())
}

fn run_direct(
    mut engine: MatchingEngine,
    workload: Workload,
    steps: u64,
    keep_trades: bool,
) -> Result<(MatchingEngine, RunStats)> {
    let stopwatch = Stopwatch::new();
    let mut stats = RunStats::new()?;
    let mut resting = RestingOrders::new();

    for step in 0..steps {
        match workload.action(step) {
            Action::Submit(request) => {
                let start = stopwatch.start();
                let result = engine.submit(request);
                stats.submit_latency.record(stopwatch.elapsed_nanos(start));

                let submission = result.with_context(|| format!("step {step} rejected"))?;
                stats.trade_count += submission.trades.len() as u64;
                if keep_trades {
                    stats.trades.extend_from_slice(&submission.trades);
                }
                resting.on_submission(&submission);
            }
            Action::Cancel { pick } => {
                let Some(order_id) = resting.take(pick) else {
                    continue;
                };
                let start = stopwatch.start();
                let result = engine.cancel(order_id);
                stats.cancel_latency.record(stopwatch.elapsed_nanos(start));
                stats.cancels += 1;

                match result {
                    Ok(_) => {}
                    Err(EngineError::NotFound(_)) => stats.cancel_misses += 1,
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
    Ok((engine, stats))
}

fn run_sequenced(
    engine: MatchingEngine,
    config: &ReplayConfig,
    workload: Workload,
    steps: u64,
    producers: u64,
    keep_trades: bool,
) -> Result<(MatchingEngine, RunStats)> {
    let sequencer = Sequencer::start(engine, config.sequencer.clone()).context("failed to start sequencer")?;
    info!(producers, instrument = sequencer.handle().instrument(), "sequencer running");

    let workers: Vec<_> = (0..producers)
        .map(|producer| {
            let handle = sequencer.handle();
            thread::Builder::new()
                .name(format!("producer-{producer}"))
                .spawn(move || produce(handle, workload, (producer..steps).step_by(producers as usize), keep_trades))
                .context("failed to spawn producer")
        })
        .collect::<Result<_>>()?;

    let mut stats = RunStats::new()?;
    for worker in workers {
        let worker_stats = worker.join().map_err(|_| anyhow!("producer thread panicked"))??;
        stats.merge(worker_stats);
    }
    stats.trades.sort_by_key(|trade| trade.sequence);

    let engine = sequencer.shutdown().context("failed to stop sequencer")?;
    Ok((engine, stats))
}

fn produce(
    handle: SequencerHandle,
    workload: Workload,
    steps: impl Iterator<Item = u64>,
    keep_trades: bool,
) -> Result<RunStats> {
    let stopwatch = Stopwatch::new();
    let mut stats = RunStats::new()?;
    let mut resting = RestingOrders::new();

    for step in steps {
        match workload.action(step) {
            Action::Submit(request) => {
                let start = stopwatch.start();
                let submission = handle.submit(request)?;
                stats.submit_latency.record(stopwatch.elapsed_nanos(start));

                stats.trade_count += submission.trades.len() as u64;
                if keep_trades {
                    stats.trades.extend_from_slice(&submission.trades);
                }
                resting.on_submission(&submission);
            }
            Action::Cancel { pick } => {
                let Some(order_id) = resting.take(pick) else {
                    continue;
                };
                let start = stopwatch.start();
                let result = handle.cancel(order_id);
                stats.cancel_latency.record(stopwatch.elapsed_nanos(start));
                stats.cancels += 1;

                match result {
                    Ok(_) => {}
                    // Filled by another producer's order
                    Err(SequencerError::Engine(EngineError::NotFound(_))) => stats.cancel_misses += 1,
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
    Ok(stats)
}
