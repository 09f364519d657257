//! interrupt-arbiter: replay host for the interruption arbiter
//!
//! Reads newline-delimited JSON session events on stdin and writes the
//! resulting playback commands and arbiter events as JSON lines on stdout.
//! Logs go to stderr.
//!
//! Runs until stdin closes or SIGTERM/SIGINT arrives, then tears down
//! every open session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use interrupt_arbiter::config::Config;
use interrupt_arbiter::lifecycle::ShutdownSignal;
use interrupt_arbiter::replay::{write_records, Replay};
use interrupt_arbiter::state::ResumeSettings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for output records
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "interrupt-arbiter starting"
    );

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    let lexicon = Arc::new(config.lexicon().context("invalid word lists")?);
    info!(
        backchannel_words = lexicon.backchannel().len(),
        command_words = lexicon.command().len(),
        resume_timeout_ms = config.resume_timeout.as_millis() as u64,
        resume_false_interruption = config.resume_false_interruption,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Sessions -> stdout writer
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_records(tokio::io::stdout(), out_rx));

    let mut replay = Replay::new(lexicon, ResumeSettings::from(&config), out_tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("reading session events from stdin");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,

            _ = shutdown.wait() => {
                info!("shutdown signal received");
                break;
            }
        };

        let Some(line) = line else {
            info!("end of input");
            break;
        };

        // `wait` records sleep; a signal still ends the replay mid-record
        tokio::select! {
            result = replay.handle_line(&line) => result?,

            _ = shutdown.wait() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    let stats = replay.shutdown().await;
    writer
        .await
        .context("output writer task failed")?
        .context("failed to write output")?;

    info!(
        lines = stats.lines,
        skipped = stats.skipped,
        sessions = stats.sessions,
        "interrupt-arbiter stopped"
    );

    Ok(())
}
