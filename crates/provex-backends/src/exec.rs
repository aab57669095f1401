//! Child-process plumbing shared by all adapters

use crate::BackendError;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Captured output of one tool invocation
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ToolOutput {
    /// Stdout and stderr combined for marker matching
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Spawn a tool bounded by `deadline`. The child is killed when the deadline
/// expires; its partial output is discarded.
pub(crate) async fn run_tool(
    mut cmd: Command,
    deadline: Option<Duration>,
) -> Result<ToolOutput, BackendError> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    debug!("spawning {:?}", cmd);

    let start = Instant::now();
    let output = match deadline {
        Some(limit) => match timeout(limit, cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("child exceeded deadline of {:?}, terminating", limit);
                return Err(BackendError::Timeout(limit));
            }
        },
        None => cmd.output().await,
    };
    let output = output.map_err(|e| BackendError::ExecutionFailed(e.to_string()))?;

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
        duration: start.elapsed(),
    })
}
