use std::path::{Path, PathBuf};
use std::process;
use structopt::StructOpt;

use routerwatch::config::{Config, ConfigError};
use routerwatch::input::{JsonExportSource, LogSource, RouterOsSession};
use routerwatch::output::viewer_for;
use routerwatch::persistence::CsvLedger;
use routerwatch::pipeline::{Monitor, RunError, RunSummary, EXIT_CONFIG, EXIT_OK, EXIT_PERSISTENCE};

/// MikroTik failed-login and brute force monitor
#[derive(StructOpt, Debug)]
#[structopt(name = "routerwatch", about = "Failed login monitor for MikroTik routers")]
pub enum Cli {
    /// Fetch the router log once and report new failed logins
    Run {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Process an exported log file instead of the live router
    Scan {
        /// JSON array of {time, message, topics} entries
        #[structopt(short, long)]
        file: PathBuf,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Print the most recent ledger records
    ShowLedger {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Number of records to show
        #[structopt(short = "n", long, default_value = "10")]
        lines: usize,
    },
}

fn main() {
    // Status lines go to stdout; the log only carries warnings unless RUST_LOG says otherwise
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let code = match Cli::from_args() {
        Cli::Run { config } => {
            println!("=== MikroTik Security Monitor ===");
            match load_config(&config, true) {
                Ok(config) => run_pass(&config, |config| {
                    RouterOsSession::connect(&config.router).map(|s| Box::new(s) as Box<dyn LogSource>)
                }),
                Err(e) => report_error(&e),
            }
        }
        Cli::Scan { file, config } => {
            println!("=== MikroTik Security Monitor ===");
            match load_config(&config, false) {
                Ok(config) => run_pass(&config, move |_| {
                    Ok(Box::new(JsonExportSource::new(file)) as Box<dyn LogSource>)
                }),
                Err(e) => report_error(&e),
            }
        }
        Cli::Config { output } => match Config::default().to_file(&output) {
            Ok(()) => {
                println!("Default configuration written to: {:?}", output);
                EXIT_OK
            }
            Err(e) => {
                eprintln!("[!] Error: {}", e);
                EXIT_CONFIG
            }
        },
        Cli::ShowLedger { config, lines } => match load_config(&config, false) {
            Ok(config) => show_ledger(&config, lines),
            Err(e) => report_error(&e),
        },
    };

    process::exit(code);
}

fn load_config(path: &Path, required: bool) -> Result<Config, RunError> {
    if path.exists() {
        return Ok(Config::from_file(path)?);
    }
    if required {
        eprintln!("Configuration file not found: {:?}", path);
        eprintln!("Run 'routerwatch config' to generate a default configuration");
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "configuration file not found");
        return Err(ConfigError::Io(missing).into());
    }
    log::warn!("Config file {:?} not found, using defaults", path);
    Ok(Config::default())
}

/// Open the source, run one pass, and always release the source afterwards
fn run_pass<F>(config: &Config, open_source: F) -> i32
where
    F: FnOnce(&Config) -> Result<Box<dyn LogSource>, routerwatch::SourceError>,
{
    let mut monitor = match Monitor::from_config(config, viewer_for(config.display.open_artifacts)) {
        Ok(monitor) => monitor,
        Err(e) => return report_error(&e),
    };

    let mut source = match open_source(config) {
        Ok(source) => source,
        Err(e) => return report_error(&e.into()),
    };

    let result = monitor.run_once(source.as_mut());
    drop(source);

    match result {
        Ok(summary) => {
            print_summary(&summary, &monitor);
            EXIT_OK
        }
        Err(e) => report_error(&e),
    }
}

fn print_summary(summary: &RunSummary, monitor: &Monitor<CsvLedger>) {
    println!("[i] Retrieved {} log entries", summary.fetched);

    if summary.new_records.is_empty() {
        println!("[*] No new failed logins found");
        return;
    }

    println!("[+] Logged {} new failed login(s)", summary.new_records.len());
    if let Some(ref report) = summary.report {
        println!("[+] Report written to {}", report.display());
    }

    if !summary.alerts.is_empty() {
        let ips: Vec<&str> = summary.alerts.iter().map(|a| a.ip.as_str()).collect();
        println!("[!] Brute force detected from: {}", ips.join(", "));
        println!(
            "[!] Rule: {} attempts within {}s",
            monitor.detector().threshold(),
            monitor.detector().window().num_seconds()
        );
        if let Some(ref alert) = summary.alert_file {
            println!("[!] Alert written to {}", alert.display());
        }
    }
}

fn show_ledger(config: &Config, lines: usize) -> i32 {
    let ledger = match CsvLedger::open(&config.storage.ledger_path) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("[!] Error: {}", e);
            return EXIT_PERSISTENCE;
        }
    };

    let records = ledger.records();
    let start = records.len().saturating_sub(lines);
    println!(
        "{} record(s) in {:?} (showing {}):\n",
        records.len(),
        ledger.path(),
        records.len() - start
    );
    for record in &records[start..] {
        println!("  {}  {}  [{}]", record.timestamp, record.message, record.topics.join(","));
    }
    EXIT_OK
}

fn report_error(e: &RunError) -> i32 {
    if let RunError::Artifacts { appended, .. } = e {
        println!("[+] Logged {} new failed login(s)", appended);
    }
    eprintln!("[!] Error: {}", e);
    e.exit_code()
}
