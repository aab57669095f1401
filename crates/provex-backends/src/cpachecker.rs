//! CPAchecker adapter
//!
//! Configurable software model checker. Verdict-only integration: the
//! counterexample path stays with CPAchecker, Provex classifies the result.
//!
//! See: <https://cpachecker.sosy-lab.org/>

use crate::exec::run_tool;
use crate::markers::{classify, MarkerRule, Outcome};
use crate::{BackendError, BackendRun, EnvSpec, HealthStatus, VerificationBackend};
use async_trait::async_trait;
use provex_core::{PipelineArtifact, RunConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const CPACHECKER_MARKERS: [MarkerRule; 4] = [
    MarkerRule::contains("Verification result: FALSE", Outcome::False(None)),
    MarkerRule::contains("Verification result: TRUE", Outcome::True),
    MarkerRule::contains("Exception in thread", Outcome::Error),
    MarkerRule::contains("Invalid configuration", Outcome::Error),
];

/// CPAchecker model-checker back end
pub struct CpacheckerBackend {
    binary: PathBuf,
}

impl CpacheckerBackend {
    /// Create the adapter, optionally with an explicit binary path
    pub fn new(binary: Option<PathBuf>) -> Self {
        CpacheckerBackend {
            binary: binary.unwrap_or_else(|| PathBuf::from("cpachecker")),
        }
    }

    /// Write the property file CPAchecker expects next to the input
    fn write_property_file(
        &self,
        dir: &Path,
        config: &RunConfig,
    ) -> Result<PathBuf, BackendError> {
        let path = dir.join("property.prp");
        let content = config
            .properties
            .iter()
            .map(|p| p.source.clone())
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, content)
            .map_err(|e| BackendError::ExecutionFailed(format!("property file: {e}")))?;
        Ok(path)
    }
}

#[async_trait]
impl VerificationBackend for CpacheckerBackend {
    fn name(&self) -> &str {
        "cpachecker"
    }

    fn required_tool_version(&self) -> &str {
        "2.3.1"
    }

    fn prepare_environment(&self, base_dir: &Path, _config: &RunConfig) -> EnvSpec {
        let output = base_dir.join("cpa-output");
        EnvSpec {
            vars: Vec::new(),
            dirs: vec![output],
        }
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

        let base_dir = bitcode.path().parent().unwrap_or_else(|| Path::new("."));
        let property_file = self.write_property_file(base_dir, config)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--spec").arg(&property_file);
        cmd.arg("--output-path").arg(base_dir.join("cpa-output"));
        for arg in &config.backend_args {
            cmd.arg(arg);
        }
        cmd.arg(bitcode.path());

        let output = run_tool(cmd, deadline).await?;
        let raw = output.combined();
        let verdict = classify(&CPACHECKER_MARKERS, &raw);
        debug!(verdict = %verdict, "cpachecker classified");

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
                reason: "cpachecker returned a non-zero exit code".to_string(),
            },
            Err(e) => HealthStatus::Unavailable {
                reason: format!("cpachecker not found: {e}"),
            },
        }
    }
}
