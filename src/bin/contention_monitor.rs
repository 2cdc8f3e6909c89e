//! contention-monitor: headless console consumer
//!
//! Polls a synthetic IPC workload (optionally with live TCP connections),
//! prints each event as it arrives, and finishes with a contention chart and
//! a session summary.
//!
//! Run: `contention-monitor --demo --duration-secs 20`

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use clap::Parser;
use contention_monitor::collectors::SyntheticSampler;
use contention_monitor::{debug, Config, Event, Session, Severity, Thresholds};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

const RESET: &str = "\x1b[0m";
const BAR_WIDTH: usize = 40;

/// contention-monitor: resource contention analyzer
#[derive(Parser, Debug)]
#[command(name = "contention-monitor")]
#[command(author = "PAIML Team")]
#[command(version)]
#[command(about = "Watches shared-resource wait times and reports contention", long_about = None)]
struct Cli {
    /// Config file path (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Polling interval in milliseconds (overrides config)
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// How long to monitor before printing the summary
    #[arg(short, long, default_value = "30")]
    duration_secs: u64,

    /// Enable the simulated circular-wait fault injector
    #[arg(long)]
    demo: bool,

    /// Seed for reproducible runs (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Include established TCP connections in samples
    #[arg(long)]
    live_sockets: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Write debug log lines to stderr
    #[arg(long)]
    debug: bool,

    /// Disable ANSI colours
    #[arg(long)]
    no_color: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        debug::enable();
    } else {
        debug::init_from_env();
    }

    let config = resolve_config(&cli)?;
    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    run(&cli, config)
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default_path().map_or_else(Config::default, Config::load_or_default),
    };

    if cli.demo {
        config.fault_injector.enabled = true;
    }
    if let Some(ms) = cli.interval_ms {
        config.polling.interval_ms = ms;
    }
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }
    if cli.live_sockets {
        config.sampler.live_sockets = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: &Cli, config: Config) -> Result<()> {
    let sampler = SyntheticSampler::from_config(&config);
    let mut session = Session::new(config)?;
    let thresholds = session.analyzer().thresholds();
    let painter = Painter { color: !cli.no_color };

    // Events cross onto this thread; the poller never touches stdout.
    let (tx, rx) = mpsc::channel::<Event>();
    session.start(sampler, move |event| {
        // Receiver gone means main is shutting down
        let _ = tx.send(event);
    })?;

    let deadline = Instant::now() + Duration::from_secs(cli.duration_secs);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event) => painter.event(&event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }

    session.shutdown()?;
    for event in rx.try_iter() {
        painter.event(&event);
    }

    println!();
    painter.contention_chart(&session, thresholds);
    println!();
    let summary = session.summary();
    if summary.elapsed_seconds > 0.0 {
        println!(
            "Throughput: {:.1} units over {:.1}s ({:.2}/s)",
            summary.cumulative_transferred,
            summary.elapsed_seconds,
            summary.cumulative_transferred / summary.elapsed_seconds
        );
    }
    println!("Session: {summary}");
    if session.missed_samples() > 0 {
        println!("Missed samples: {}", session.missed_samples());
    }
    Ok(())
}

/// Console output with optional ANSI colour.
struct Painter {
    color: bool,
}

impl Painter {
    fn paint(&self, severity: Severity, text: &str) -> String {
        if self.color {
            format!("{}{text}{RESET}", severity.color_code())
        } else {
            text.to_string()
        }
    }

    fn event(&self, event: &Event) {
        println!("{}", self.paint(event.severity(), &event.to_string()));
    }

    fn contention_chart(&self, session: &Session, thresholds: Thresholds) {
        let snapshot = session.contention_snapshot();
        if snapshot.is_empty() {
            println!("No contention in the last sample.");
            return;
        }

        println!("Latest contention (wait ticks):");
        let label_width = snapshot.names.iter().map(String::len).max().unwrap_or(0);
        let scale = snapshot
            .wait_ticks
            .iter()
            .copied()
            .fold(thresholds.error() * 1.5, f64::max);

        for (name, wait) in snapshot.iter() {
            let filled = ((wait / scale) * BAR_WIDTH as f64).round() as usize;
            let bar = "█".repeat(filled.min(BAR_WIDTH));
            let severity = thresholds.classify(wait).unwrap_or(Severity::Info);
            println!("  {name:<label_width$} {} {wait:.0}", self.paint(severity, &bar));
        }
    }
}
