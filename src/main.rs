//! Off The Grid - Binary Entry Point
//!
//! Reads JSON values from stdin, one per line, and records them in the
//! offline log. Whenever the buffer decides the consumer is reachable the
//! logged values are written to stdout.
//!
//! Connectivity is read from `OFFGRID_ONLINE_FILE`: when set, the consumer
//! counts as reachable while that file exists. When unset it always is.
//! See [`BufferConfig::from_env`] for the remaining variables.
//!
//! Exits on end of input or Ctrl+C, after one last decision cycle.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use off_the_grid::{BufferConfig, BufferResult, BufferStats, Condition, OfflineBuffer};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ONLINE_FILE_VAR: &str = "OFFGRID_ONLINE_FILE";

#[tokio::main]
async fn main() -> BufferResult<()> {
    // stdout carries replayed records; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "off_the_grid=info,offgrid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = BufferConfig::from_env();
    let buffer = OfflineBuffer::<Value>::builder(config)
        .condition(online_condition())
        .on_record(print_record)
        .start();

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<()>();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    }) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    let mut lines = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => record_line(&buffer, &line).await,
                None => {
                    info!("end of input");
                    break;
                }
            },
            _ = shutdown_rx.recv() => {
                info!("interrupted");
                break;
            }
        }
    }

    buffer.stop();

    // Queues behind a timer decision that may still be running
    let outcome = buffer.tick().await?;
    info!(?outcome, "final decision");

    let remaining = buffer.log().size().await?;
    let stats = buffer.stats();
    info!(
        appended = stats.records_appended,
        delivered = stats.records_delivered,
        dropped = stats.lines_dropped,
        evictions = stats.evictions,
        remaining = %BufferStats::format_size(remaining),
        "offline buffer shut down"
    );

    Ok(())
}

fn online_condition() -> Condition {
    match env::var_os(ONLINE_FILE_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(marker = %path.display(), "replaying while marker file exists");
            Condition::from_fn(move || path.exists())
        }
        None => Condition::always(),
    }
}

fn print_record(payload: Value) {
    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{payload}") {
        warn!(error = %e, "could not write replayed record");
    }
}

/// Blocking stdin reads live on their own thread so Ctrl+C is never stuck
/// behind them.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

async fn record_line(buffer: &OfflineBuffer<Value>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let payload: Value = match serde_json::from_str(line) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "skipping input that is not JSON");
            return;
        }
    };

    if let Err(e) = buffer.record(&payload).await {
        warn!(error = %e, "failed to record payload");
    }
}
