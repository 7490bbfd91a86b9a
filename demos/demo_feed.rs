//! Drive a session from the built-in demo feed (or a YAML config) and print
//! log lines as they are projected.
//!
//! ```text
//! cargo run --example demo_feed                 # 8 demo ticks
//! cargo run --example demo_feed -- lens.yaml    # feed from config
//! PIPELENS_TICK_MS=200 cargo run --example demo_feed
//! ```

use std::sync::Arc;

use colored::Colorize;
use parking_lot::Mutex;

use pipelens::{FeedConfig, FixSuggestion, LensConfig, LensError, LogLevel, Session};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(lens) = e.downcast_ref::<LensError>() {
            if let Some(suggestion) = lens.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => LensConfig::load(path)?,
        None => LensConfig {
            feed: FeedConfig::Demo {
                interval_ms: 1500,
                handoff_after: 5,
                max_ticks: Some(8),
            },
            ..LensConfig::default()
        },
    }
    .with_env()?;

    let mut session = Session::from_config(&config)?;

    let printed = Arc::new(Mutex::new(0usize));
    let seen = Arc::clone(&printed);
    let _logs = session.subscribe(move |snap| {
        let mut seen = seen.lock();
        for line in snap.logs.iter_from(*seen) {
            let level = match line.level {
                LogLevel::Info => "info ".green(),
                LogLevel::Warn => "warn ".yellow(),
                LogLevel::Error => "error".red(),
            };
            println!("{} {} {}", level, line.source.cyan(), line.message);
        }
        *seen = snap.logs.len();
    });

    let stats = session.run().await?;
    let snap = session.snapshot();

    println!(
        "\n{} applied={} rejected={} dropped={} progress={:.0}%",
        "✓".green(),
        stats.applied,
        stats.rejected,
        stats.dropped,
        snap.progress()
    );
    println!("{}", serde_json::to_string_pretty(&snap.to_json())?);
    Ok(())
}
