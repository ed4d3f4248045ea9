pub mod display;

pub use display::{viewer_for, DisplayError, DisplaySink, NoViewer, SystemViewer};

use crate::models::{BruteForceAlert, FailureRecord};
use crate::persistence::PersistenceError;
use chrono::{Duration, NaiveDateTime};
use std::path::{Path, PathBuf};

const FILE_STAMP: &str = "%Y-%m-%d_%H-%M";
const HUMAN_STAMP: &str = "%Y-%m-%d %H:%M:%S";
const TABLE_COLUMNS: [&str; 4] = ["time", "message", "topics", "id"];

/// Writes the per-run report and alert files
///
/// Both file names carry the run time to the minute, so a second run
/// within the same minute replaces the earlier artifacts.
pub struct ReportEmitter {
    report_dir: PathBuf,
    sink: Box<dyn DisplaySink>,
}

impl ReportEmitter {
    pub fn new(report_dir: PathBuf, sink: Box<dyn DisplaySink>) -> Self {
        ReportEmitter { report_dir, sink }
    }

    pub fn report_path(&self, now: NaiveDateTime) -> PathBuf {
        self.report_dir
            .join(format!("failed_logins_{}.txt", now.format(FILE_STAMP)))
    }

    pub fn alert_path(&self, now: NaiveDateTime) -> PathBuf {
        self.report_dir
            .join(format!("brute_force_alert_{}.txt", now.format(FILE_STAMP)))
    }

    /// Write the new-failures report and show it
    pub fn write_report(
        &self,
        records: &[FailureRecord],
        now: NaiveDateTime,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.report_path(now);
        self.write_artifact(&path, &render_report(records, now))?;
        self.present(&path);
        Ok(path)
    }

    /// Write the brute force alert and show it
    pub fn write_alert(
        &self,
        alerts: &[BruteForceAlert],
        threshold: usize,
        window: Duration,
        now: NaiveDateTime,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.alert_path(now);
        self.write_artifact(&path, &render_alert(alerts, threshold, window, now))?;
        self.present(&path);
        Ok(path)
    }

    fn write_artifact(&self, path: &Path, contents: &str) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.report_dir)
            .and_then(|_| std::fs::write(path, contents))
            .map_err(|source| PersistenceError::Artifact {
                path: path.to_path_buf(),
                source,
            })
    }

    fn present(&self, path: &Path) {
        if let Err(e) = self.sink.open(path) {
            log::warn!("Could not open {:?}: {}", path, e);
        }
    }
}

pub fn render_report(records: &[FailureRecord], now: NaiveDateTime) -> String {
    let mut out = String::from("=== Failed Login Report ===\n");
    out.push_str(&format!("Generated: {}\n\n", now.format(HUMAN_STAMP)));
    out.push_str(&render_table(records));
    out
}

pub fn render_alert(
    alerts: &[BruteForceAlert],
    threshold: usize,
    window: Duration,
    now: NaiveDateTime,
) -> String {
    let ips: Vec<&str> = alerts.iter().map(|a| a.ip.as_str()).collect();

    let mut out = String::from("=== BRUTE FORCE ALERT ===\n");
    out.push_str(&format!("Time: {}\n", now.format(HUMAN_STAMP)));
    out.push_str(&format!(
        "Threshold: {} attempts in {}\n\n",
        threshold,
        describe_window(window)
    ));
    out.push_str("Suspicious IPs:\n");
    out.push_str(&ips.join("\n"));
    out.push('\n');
    out
}

/// "5 minutes", "1 minute" or "90 seconds"
pub fn describe_window(window: Duration) -> String {
    let seconds = window.num_seconds();
    if seconds != 0 && seconds % 60 == 0 {
        let minutes = seconds / 60;
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        format!("{} second{}", seconds, if seconds == 1 { "" } else { "s" })
    }
}

fn render_table(records: &[FailureRecord]) -> String {
    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|r| {
            [
                r.timestamp.clone(),
                r.message.clone(),
                r.topics.join(","),
                r.identity.clone(),
            ]
        })
        .collect();

    let mut widths = TABLE_COLUMNS.map(|c| c.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: [&str; 4]| -> String {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let mut out = format_line(TABLE_COLUMNS);
    for row in &rows {
        out.push_str(&format_line([row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogEntry;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    /// Remembers what it was asked to open, optionally failing
    struct RecordingSink {
        opened: Rc<RefCell<Vec<PathBuf>>>,
        fail: bool,
    }

    impl DisplaySink for RecordingSink {
        fn open(&self, path: &Path) -> Result<(), DisplayError> {
            self.opened.borrow_mut().push(path.to_path_buf());
            if self.fail {
                Err(DisplayError::Launch {
                    program: "xdg-open",
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no viewer"),
                })
            } else {
                Ok(())
            }
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 7, 42)
            .unwrap()
    }

    fn record(time: &str, message: &str) -> FailureRecord {
        FailureRecord::from_entry(&LogEntry::new(time, message, &["system", "error"]))
    }

    #[test]
    fn test_artifact_names_use_minute_stamp() {
        let emitter = ReportEmitter::new(PathBuf::from("reports"), Box::new(NoViewer));
        assert_eq!(
            emitter.report_path(now()),
            PathBuf::from("reports/failed_logins_2024-01-15_10-07.txt")
        );
        assert_eq!(
            emitter.alert_path(now()),
            PathBuf::from("reports/brute_force_alert_2024-01-15_10-07.txt")
        );
    }

    #[test]
    fn test_render_report() {
        let report = render_report(
            &[
                record("10:00:00", "login failure for user admin from 1.2.3.4 via ssh"),
                record("10:00:05", "denied"),
            ],
            now(),
        );

        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "=== Failed Login Report ===");
        assert_eq!(lines[1], "Generated: 2024-01-15 10:07:42");
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("time      message"));
        assert!(lines[4].starts_with("10:00:00  login failure for user admin from 1.2.3.4 via ssh  system,error"));
        assert!(lines[5].contains("10:00:05|denied"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_render_alert() {
        let alerts = vec![
            BruteForceAlert { ip: "10.0.0.5".to_string(), attempts: vec![now()] },
            BruteForceAlert { ip: "10.0.0.9".to_string(), attempts: vec![now()] },
        ];
        let alert = render_alert(&alerts, 2, Duration::minutes(5), now());

        assert_eq!(
            alert,
            "=== BRUTE FORCE ALERT ===\n\
             Time: 2024-01-15 10:07:42\n\
             Threshold: 2 attempts in 5 minutes\n\
             \n\
             Suspicious IPs:\n\
             10.0.0.5\n\
             10.0.0.9\n"
        );
    }

    #[test]
    fn test_describe_window() {
        assert_eq!(describe_window(Duration::minutes(5)), "5 minutes");
        assert_eq!(describe_window(Duration::minutes(1)), "1 minute");
        assert_eq!(describe_window(Duration::seconds(90)), "90 seconds");
        assert_eq!(describe_window(Duration::zero()), "0 seconds");
    }

    #[test]
    fn test_write_report_opens_it() {
        let dir = tempdir().unwrap();
        let opened = Rc::new(RefCell::new(Vec::new()));
        let emitter = ReportEmitter::new(
            dir.path().join("reports"),
            Box::new(RecordingSink { opened: opened.clone(), fail: false }),
        );

        let path = emitter.write_report(&[record("10:00:00", "failed")], now()).unwrap();
        assert!(path.exists());
        assert!(std::fs::read_to_string(&path).unwrap().contains("10:00:00|failed"));
        assert_eq!(*opened.borrow(), vec![path]);
    }

    #[test]
    fn test_viewer_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let opened = Rc::new(RefCell::new(Vec::new()));
        let emitter = ReportEmitter::new(
            dir.path().to_path_buf(),
            Box::new(RecordingSink { opened: opened.clone(), fail: true }),
        );

        let alerts = vec![BruteForceAlert { ip: "10.0.0.5".to_string(), attempts: vec![now()] }];
        let path = emitter
            .write_alert(&alerts, 2, Duration::minutes(5), now())
            .unwrap();
        assert!(path.exists());
        assert_eq!(opened.borrow().len(), 1);
    }

    #[test]
    fn test_unwritable_dir_is_persistence_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let emitter = ReportEmitter::new(blocker.join("reports"), Box::new(NoViewer));
        assert!(matches!(
            emitter.write_report(&[record("10:00:00", "failed")], now()),
            Err(PersistenceError::Artifact { .. })
        ));
    }
}
