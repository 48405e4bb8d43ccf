//! idle-sentry - terminal demonstration of the inactivity monitor.
//!
//! Treats every line typed on stdin as user activity, prints the warning
//! countdown, and exits when the session is logged out for inactivity.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use idle_sentry::format_time_remaining;
use idle_sentry::{
    Callbacks, EventKind, EventRegistry, InactivityMonitor, InputSurface, MonitorConfig,
    Scheduler, TokioScheduler,
};

/// Inactivity monitor demo.
///
/// Every line of input counts as activity; stay silent long enough and the
/// session is logged out.
#[derive(Parser, Debug)]
#[command(name = "idle-sentry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the inactivity budget in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Override the warning window in seconds.
    #[arg(long)]
    warning: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print every state snapshot as a JSON line.
    #[arg(long)]
    print_state: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("idle-sentry v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = MonitorConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(timeout) = args.timeout {
        config.timeout_seconds = timeout;
    }
    if let Some(warning) = args.warning {
        config.warning_seconds = warning;
    }

    info!(
        "Configuration loaded (timeout={}s, warning={}s)",
        config.timeout_seconds, config.warning_seconds
    );

    run_demo(config, args.print_state).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("idle_sentry={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Wire the monitor to stdin activity and run until logout or Ctrl-C.
async fn run_demo(config: MonitorConfig, print_state: bool) -> Result<()> {
    let registry = Arc::new(EventRegistry::new());
    let scheduler = Arc::new(TokioScheduler::new());
    let logged_out = Arc::new(Notify::new());

    let notify = Arc::clone(&logged_out);
    let callbacks = Callbacks::new()
        .on_warning(|| {
            println!("Still there? Type anything to stay signed in.");
        })
        .on_extend(|| {
            println!("Session extended.");
        })
        .on_logout(move || {
            let notify = Arc::clone(&notify);
            async move {
                println!("Logged out after inactivity.");
                notify.notify_one();
                Ok(())
            }
            .boxed()
        });

    let monitor = InactivityMonitor::new(
        config,
        callbacks,
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        Arc::clone(&registry) as Arc<dyn InputSurface>,
    )?;

    // Forward stdin lines into the input surface as keydown activity.
    let surface = Arc::clone(&registry);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let keydown = EventKind::from("keydown");
        while let Ok(Some(_)) = lines.next_line().await {
            surface.emit(&keydown);
        }
    });

    // Report the countdown as it ticks.
    let mut state_rx = monitor.subscribe();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let snapshot = *state_rx.borrow_and_update();
            if print_state {
                match serde_json::to_string(&snapshot) {
                    Ok(line) => println!("{line}"),
                    Err(e) => debug!("Failed to serialize snapshot: {e}"),
                }
            } else if snapshot.is_warning_visible {
                println!(
                    "Logging out in {}",
                    format_time_remaining(snapshot.time_remaining)
                );
            }
        }
    });

    monitor.start();
    info!("Monitoring started, type to stay active");

    tokio::select! {
        () = logged_out.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping monitor");
            monitor.stop();
        }
    }

    Ok(())
}
