use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use routerwatch::config::Config;
use routerwatch::input::RouterOsSession;
use routerwatch::output::viewer_for;
use routerwatch::pipeline::{Monitor, RunError};

/// Polls the router on a fixed interval until interrupted
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting routerwatch daemon...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let mut config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file not found, using defaults");
        Config::default()
    };
    // Daemon passes never open a viewer
    config.display.open_artifacts = false;

    // Setup graceful shutdown signal handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, stopping after the current pass...");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut monitor = Monitor::from_config(&config, viewer_for(config.display.open_artifacts))?;
    let interval = Duration::from_secs(config.schedule.interval_seconds);

    log::info!(
        "Polling {}:{} every {}s. Press Ctrl+C to stop.",
        config.router.host,
        config.router.port,
        interval.as_secs()
    );

    while running.load(Ordering::SeqCst) {
        if let Err(e) = run_pass(&config, &mut monitor) {
            log::error!("Pass failed (exit code {}): {}", e.exit_code(), e);
        }

        // Sleep in short steps so a shutdown signal is noticed promptly
        let next = Instant::now() + interval;
        while running.load(Ordering::SeqCst) && Instant::now() < next {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    log::info!("routerwatch daemon stopped");
    Ok(())
}

/// One connect → run → disconnect cycle; the session is dropped on every path
fn run_pass(
    config: &Config,
    monitor: &mut Monitor<routerwatch::CsvLedger>,
) -> Result<(), RunError> {
    let mut session = RouterOsSession::connect(&config.router)?;
    let summary = monitor.run_once(&mut session)?;

    if summary.new_records.is_empty() {
        log::debug!("No new failed logins in {} entries", summary.fetched);
    }
    for alert in &summary.alerts {
        log::warn!(
            "BRUTE FORCE: {} failed logins from {}",
            alert.attempts.len(),
            alert.ip
        );
    }
    Ok(())
}
