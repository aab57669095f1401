//! CBMC adapter
//!
//! Bounded model checker for C. Verdict-only integration.

use crate::exec::run_tool;
use crate::markers::{classify, MarkerRule, Outcome};
use crate::{BackendError, BackendRun, HealthStatus, VerificationBackend};
use async_trait::async_trait;
use provex_core::{PipelineArtifact, RunConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const CBMC_MARKERS: [MarkerRule; 3] = [
    MarkerRule::contains("VERIFICATION FAILED", Outcome::False(None)),
    MarkerRule::contains("VERIFICATION SUCCESSFUL", Outcome::True),
    MarkerRule::contains("PARSING ERROR", Outcome::Error),
];

/// CBMC bounded model checker back end
pub struct CbmcBackend {
    binary: PathBuf,
}

impl CbmcBackend {
    /// Create the adapter, optionally with an explicit binary path
    pub fn new(binary: Option<PathBuf>) -> Self {
        CbmcBackend {
            binary: binary.unwrap_or_else(|| PathBuf::from("cbmc")),
        }
    }
}

#[async_trait]
impl VerificationBackend for CbmcBackend {
    fn name(&self) -> &str {
        "cbmc"
    }

    fn required_tool_version(&self) -> &str {
        "5.95.1"
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
        cmd.arg("--stop-on-fail");
        for arg in &config.backend_args {
            cmd.arg(arg);
        }
        cmd.arg(bitcode.path());

        let output = run_tool(cmd, deadline).await?;
        let raw = output.combined();
        let verdict = classify(&CBMC_MARKERS, &raw);
        debug!(verdict = %verdict, "cbmc classified");

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
                reason: "cbmc returned a non-zero exit code".to_string(),
            },
            Err(e) => HealthStatus::Unavailable {
                reason: format!("cbmc not found: {e}"),
            },
        }
    }
}
