//! Ultimate Automizer adapter
//!
//! Automata-based software verifier. Verdict-only integration.

use crate::exec::run_tool;
use crate::markers::{classify, MarkerRule, Outcome};
use crate::{BackendError, BackendRun, EnvSpec, HealthStatus, VerificationBackend};
use async_trait::async_trait;
use provex_core::{PipelineArtifact, RunConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const ULTIMATE_MARKERS: [MarkerRule; 3] = [
    MarkerRule::contains(
        "Ultimate proved your program to be incorrect",
        Outcome::False(None),
    ),
    MarkerRule::contains(
        "Ultimate proved your program to be correct",
        Outcome::True,
    ),
    MarkerRule::contains("UnsupportedSyntaxResult", Outcome::Error),
];

/// Ultimate Automizer back end
pub struct UltimateBackend {
    binary: PathBuf,
}

impl UltimateBackend {
    /// Create the adapter, optionally with an explicit binary path
    pub fn new(binary: Option<PathBuf>) -> Self {
        UltimateBackend {
            binary: binary.unwrap_or_else(|| PathBuf::from("Ultimate")),
        }
    }
}

#[async_trait]
impl VerificationBackend for UltimateBackend {
    fn name(&self) -> &str {
        "ultimate"
    }

    fn required_tool_version(&self) -> &str {
        "0.2.4"
    }

    fn prepare_environment(&self, base_dir: &Path, _config: &RunConfig) -> EnvSpec {
        EnvSpec {
            vars: vec![(
                "ULTIMATE_DATA_DIR".to_string(),
                base_dir.join("ultimate-data").display().to_string(),
            )],
            dirs: vec![base_dir.join("ultimate-data")],
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
        let env = self.prepare_environment(base_dir, config);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--architecture").arg("64bit");
        for arg in &config.backend_args {
            cmd.arg(arg);
        }
        cmd.arg("--input").arg(bitcode.path());
        for (key, value) in &env.vars {
            cmd.env(key, value);
        }

        let output = run_tool(cmd, deadline).await?;
        let raw = output.combined();
        let verdict = classify(&ULTIMATE_MARKERS, &raw);
        debug!(verdict = %verdict, "ultimate classified");

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
                reason: "Ultimate returned a non-zero exit code".to_string(),
            },
            Err(e) => HealthStatus::Unavailable {
                reason: format!("Ultimate not found: {e}"),
            },
        }
    }
}
