//! External display tool adapter
//!
//! The core only talks to the tool through [`DisplayTool`], so detection and
//! layout application can be exercised without displayplacer installed.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::tool;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("display tool not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to run display tool: {0}")]
    Io(#[from] io::Error),
    #[error("display tool timed out after {}s", .0.as_secs_f32())]
    TimedOut(Duration),
    #[error("display tool exited with status {}: {}", .code.map_or("signal".to_string(), |c| c.to_string()), .stderr.trim())]
    Failed { code: Option<i32>, stderr: String },
}

pub trait DisplayTool {
    /// Raw `list` report
    fn list(&self) -> Result<String, ToolError>;

    /// Run one command string (`id:... res:... origin:(x,y) ...`)
    fn apply(&self, command: &str) -> Result<(), ToolError>;

    fn version(&self) -> Result<String, ToolError>;
}

/// displayplacer invoked directly as a child process (no shell)
#[derive(Debug, Clone)]
pub struct Displayplacer {
    path: PathBuf,
    timeout: Duration,
}

impl Displayplacer {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// Run the tool with `args`, returning stdout on exit status 0
    fn run(&self, args: &[&str]) -> Result<String, ToolError> {
        debug!(tool = %self.path.display(), ?args, "Running display tool");

        let mut child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ToolError::NotFound(self.path.clone()),
                _ => ToolError::Io(e),
            })?;

        // Pipes are drained on their own threads so a large report can't
        // fill the pipe buffer and stall the child before it exits.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            Err(ToolError::Failed {
                code: status.code(),
                stderr,
            })
        }
    }
}

impl DisplayTool for Displayplacer {
    fn list(&self) -> Result<String, ToolError> {
        self.run(&[tool::LIST_ARG])
    }

    fn apply(&self, command: &str) -> Result<(), ToolError> {
        self.run(&[command]).map(|_| ())
    }

    fn version(&self) -> Result<String, ToolError> {
        self.run(&[tool::VERSION_ARG]).map(|out| out.trim().to_string())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, ToolError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(err) => {
                warn!(pid = child.id(), error = %err, "Lost track of display tool, killing it");
                reap(child);
                return Err(err.into());
            }
        }
        if started.elapsed() >= timeout {
            warn!(pid = child.id(), timeout_ms = timeout.as_millis() as u64, "Display tool timed out, killing it");
            reap(child);
            return Err(ToolError::TimedOut(timeout));
        }
        thread::sleep(Duration::from_millis(tool::POLL_INTERVAL_MS));
    }
}

/// Kill the child if still running and wait for it so no zombie is left
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;

    /// In-memory tool: serves a fixed report and records every applied command
    #[derive(Debug, Default)]
    pub struct ScriptedTool {
        /// `None` behaves like a missing executable
        pub report: Option<String>,
        /// Zero-based index of the apply call that exits non-zero
        pub fail_on: Option<usize>,
        pub applied: RefCell<Vec<String>>,
    }

    impl ScriptedTool {
        pub fn with_report(report: &str) -> Self {
            Self {
                report: Some(report.to_string()),
                ..Default::default()
            }
        }

        pub fn applied(&self) -> Vec<String> {
            self.applied.borrow().clone()
        }
    }

    impl DisplayTool for ScriptedTool {
        fn list(&self) -> Result<String, ToolError> {
            self.report
                .clone()
                .ok_or_else(|| ToolError::NotFound(PathBuf::from("/nonexistent/displayplacer")))
        }

        fn apply(&self, command: &str) -> Result<(), ToolError> {
            let mut applied = self.applied.borrow_mut();
            applied.push(command.to_string());
            if self.fail_on == Some(applied.len() - 1) {
                return Err(ToolError::Failed {
                    code: Some(1),
                    stderr: "Error: mode not supported".to_string(),
                });
            }
            Ok(())
        }

        fn version(&self) -> Result<String, ToolError> {
            Ok("displayplacer v1.4.0".to_string())
        }
    }
}
