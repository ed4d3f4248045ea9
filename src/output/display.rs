//! Opening report artifacts in a desktop viewer

use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("could not launch {program}: {source}")]
    Launch {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exit {
        program: &'static str,
        status: std::process::ExitStatus,
    },
}

/// Something that can show a written artifact to the operator
///
/// Failures are reported but never affect the run.
pub trait DisplaySink {
    fn open(&self, path: &Path) -> Result<(), DisplayError>;
}

/// Hands files to the platform's default application
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemViewer;

impl SystemViewer {
    #[cfg(target_os = "windows")]
    fn command(path: &Path) -> (&'static str, Command) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg("start").arg("").arg(path);
        ("cmd", cmd)
    }

    #[cfg(target_os = "macos")]
    fn command(path: &Path) -> (&'static str, Command) {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        ("open", cmd)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn command(path: &Path) -> (&'static str, Command) {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        ("xdg-open", cmd)
    }
}

impl DisplaySink for SystemViewer {
    fn open(&self, path: &Path) -> Result<(), DisplayError> {
        let (program, mut cmd) = Self::command(path);
        let status = cmd
            .status()
            .map_err(|source| DisplayError::Launch { program, source })?;
        if status.success() {
            Ok(())
        } else {
            Err(DisplayError::Exit { program, status })
        }
    }
}

/// Leaves artifacts on disk without opening them
#[derive(Debug, Default, Clone, Copy)]
pub struct NoViewer;

impl DisplaySink for NoViewer {
    fn open(&self, path: &Path) -> Result<(), DisplayError> {
        log::debug!("Not opening {:?}", path);
        Ok(())
    }
}

/// Pick the sink for this process
pub fn viewer_for(open_artifacts: bool) -> Box<dyn DisplaySink> {
    if open_artifacts {
        Box::new(SystemViewer)
    } else {
        Box::new(NoViewer)
    }
}
