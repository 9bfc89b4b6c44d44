//! serialq CLI — exercise a serial queue from the command line.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serialq::config::Config;
use serialq::telemetry::{TelemetryConfig, init_telemetry};
use serialq::timeline::Timeline;
use serialq::{Error, SerialQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;

#[derive(Parser)]
#[command(name = "serialq", about = "Serialize async work through a single queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit sleeping work items concurrently and print the execution timeline
    Demo {
        /// Comma-separated work durations in milliseconds
        #[arg(long, value_delimiter = ',', default_value = "50,10,30")]
        durations: Vec<u64>,
        /// Print the timeline as JSON
        #[arg(long)]
        json: bool,
    },
    /// Race concurrent disposals against an in-flight work item
    DisposeRace {
        /// Number of concurrent dispose callers
        #[arg(long, default_value_t = 8)]
        callers: usize,
        /// How long the in-flight work item holds the queue
        #[arg(long, default_value_t = 100)]
        hold_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig::from(&config))?;

    match cli.command {
        Command::Demo { durations, json } => cmd_demo(durations, json).await,
        Command::DisposeRace { callers, hold_ms } => cmd_dispose_race(callers, hold_ms).await,
    }
}

async fn cmd_demo(durations: Vec<u64>, json: bool) -> anyhow::Result<()> {
    if durations.is_empty() {
        bail!("at least one duration is required");
    }

    let queue = Arc::new(SerialQueue::new());
    let timeline = Arc::new(Timeline::new());
    let started = tokio::time::Instant::now();

    let mut tasks = JoinSet::new();
    for (i, ms) in durations.iter().copied().enumerate() {
        let queue = Arc::clone(&queue);
        let timeline = Arc::clone(&timeline);
        tasks.spawn(async move {
            queue
                .enqueue(|| {
                    timeline.measure(
                        format!("item-{i} ({ms}ms)"),
                        tokio::time::sleep(Duration::from_millis(ms)),
                    )
                })
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.context("work task panicked")??;
    }

    let elapsed_ms = started.elapsed().as_millis();
    queue.dispose_async().await;

    let report = timeline.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{:<20} {:>10} {:>10}", "ITEM", "START", "END");
        println!("{}", "-".repeat(42));
        for interval in &report.intervals {
            println!(
                "{:<20} {:>8.1}ms {:>8.1}ms",
                interval.label, interval.start_ms, interval.end_ms
            );
        }
        println!();
        println!(
            "busy {:.1}ms, elapsed {elapsed_ms}ms (sum of durations {}ms)",
            report.busy_ms,
            durations.iter().sum::<u64>()
        );
    }

    let overlaps = timeline.overlapping_pairs();
    if !overlaps.is_empty() {
        bail!("{} overlapping work item pairs", overlaps.len());
    }
    Ok(())
}

async fn cmd_dispose_race(callers: usize, hold_ms: u64) -> anyhow::Result<()> {
    if callers == 0 {
        bail!("at least one dispose caller is required");
    }
    let queue = Arc::new(SerialQueue::new());

    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let in_flight = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .enqueue(|| async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(Duration::from_millis(hold_ms)).await;
                })
                .await
        })
    };
    started_rx.await.context("in-flight work never started")?;

    let mut disposers = JoinSet::new();
    for i in 0..callers {
        let queue = Arc::clone(&queue);
        if i % 2 == 0 {
            disposers.spawn(async move { queue.dispose_async().await });
        } else {
            disposers.spawn_blocking(move || queue.dispose());
        }
    }

    let mut teardowns = 0;
    while let Some(joined) = disposers.join_next().await {
        if joined.context("disposer panicked")? {
            teardowns += 1;
        }
    }
    in_flight.await.context("in-flight work panicked")??;

    let rejected = matches!(queue.enqueue(|| async {}).await, Err(Error::Disposed));
    info!(callers, teardowns, rejected, state = %queue.state(), "dispose race finished");
    println!("callers:   {callers}");
    println!("teardowns: {teardowns}");
    println!("state:     {}", queue.state());
    println!("rejects:   {rejected}");

    if teardowns != 1 || !rejected {
        bail!("disposal was not idempotent");
    }
    Ok(())
}
