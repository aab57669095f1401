//! SeaHorn adapter
//!
//! CHC-based verifier. `unsat` means the error location is unreachable, so
//! the matching is whole-line: `unsat` must never classify through its `sat`
//! suffix.

use crate::exec::run_tool;
use crate::markers::{classify, MarkerRule, Outcome};
use crate::{BackendError, BackendRun, HealthStatus, VerificationBackend};
use async_trait::async_trait;
use provex_core::{PipelineArtifact, RunConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const SEAHORN_MARKERS: [MarkerRule; 3] = [
    MarkerRule::line("unsat", Outcome::True),
    MarkerRule::line("sat", Outcome::False(None)),
    MarkerRule::contains("Error: ", Outcome::Error),
];

/// SeaHorn CHC back end
pub struct SeahornBackend {
    binary: PathBuf,
}

impl SeahornBackend {
    /// Create the adapter, optionally with an explicit binary path
    pub fn new(binary: Option<PathBuf>) -> Self {
        SeahornBackend {
            binary: binary.unwrap_or_else(|| PathBuf::from("sea")),
        }
    }
}

#[async_trait]
impl VerificationBackend for SeahornBackend {
    fn name(&self) -> &str {
        "seahorn"
    }

    fn required_tool_version(&self) -> &str {
        "14.0"
    }

    async fn run(
        &self,
        bitcode: &PipelineArtifact,
        config: &RunConfig,
        deadline: Option<Duration>,
    ) -> Result<BackendRun, BackendError> {
        if !bitcode.path().exists() {
            return Err(BackendError::InvalidInput(format!(
                "input not found: {}",
                bitcode.path().display()
            )));
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("pf");
        for arg in &config.backend_args {
            cmd.arg(arg);
        }
        cmd.arg(bitcode.path());

        let output = run_tool(cmd, deadline).await?;
        let raw = output.combined();
        let verdict = classify(&SEAHORN_MARKERS, &raw);
        debug!(verdict = %verdict, "seahorn classified");

        Ok(BackendRun {
            verdict,
            raw_output: raw,
            trace: None,
            duration: output.duration,
        })
    }

    async fn health_check(&self) -> HealthStatus {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) if output.status.success() => HealthStatus::Healthy,
            Ok(_) => HealthStatus::Degraded {
                reason: "sea returned a non-zero exit code".to_string(),
            },
            Err(e) => HealthStatus::Unavailable {
                reason: format!("sea not found: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provex_core::Verdict;

    #[test]
    fn unsat_is_true_sat_is_false() {
        assert_eq!(classify(&SEAHORN_MARKERS, "unsat\n"), Verdict::True);
        assert_eq!(classify(&SEAHORN_MARKERS, "sat\n"), Verdict::False(None));
    }

    #[test]
    fn unsat_never_matches_through_sat() {
        // a single "unsat" line must not trip the "sat" rule
        let verdict = classify(&SEAHORN_MARKERS, "seahorn log\nunsat\n");
        assert_eq!(verdict, Verdict::True);
    }
}
