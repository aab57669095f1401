//! Link stage
//!
//! Builds the final bitcode the back end runs on: uninitialized-memory
//! symbolization (uninitialized variables become nondeterministic values, so
//! the back end explores every initial content), an optional optimization
//! pass, then linking the instrumented artifact with the monitor runtime.
//! Every failure here means the pipeline produced ill-formed bitcode, which
//! is always a bug, so it aborts the run.

use crate::error::PipelineError;
use provex_core::{ArtifactRole, PipelineArtifact, RunConfig};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// The bitcode build/link stage
pub struct LinkStage<'a> {
    config: &'a RunConfig,
}

impl<'a> LinkStage<'a> {
    /// Stage over a run's configuration
    pub fn new(config: &'a RunConfig) -> Self {
        LinkStage { config }
    }

    fn linker(&self) -> PathBuf {
        self.config
            .tools
            .linker
            .clone()
            .unwrap_or_else(|| PathBuf::from("llvm-link"))
    }

    fn optimizer(&self) -> PathBuf {
        self.config
            .tools
            .optimizer
            .clone()
            .unwrap_or_else(|| PathBuf::from("opt"))
    }

    fn symbolizer(&self) -> PathBuf {
        self.config
            .tools
            .symbolizer
            .clone()
            .unwrap_or_else(|| PathBuf::from("opt"))
    }

    /// Make every possibly-uninitialized variable symbolic
    async fn symbolize(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        let mut cmd = Command::new(self.symbolizer());
        for arg in &self.config.symbolizer_args {
            cmd.arg(arg);
        }
        cmd.arg("-initialize-uninitialized");
        cmd.arg(input);
        cmd.arg("-o").arg(output);
        debug!("running symbolizer: {:?}", cmd);

        let result = cmd
            .output()
            .await
            .map_err(|e| PipelineError::Symbolize(e.to_string()))?;
        if !result.status.success() {
            return Err(PipelineError::Symbolize(format!(
                "pass driver exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.exists() {
            return Err(PipelineError::Symbolize(
                "pass driver produced no output".to_string(),
            ));
        }
        Ok(())
    }

    /// Symbolize and optimize (each when enabled), then link `input` into
    /// the final artifact
    pub async fn run(
        &self,
        input: &PipelineArtifact,
        workdir: &Path,
    ) -> Result<PipelineArtifact, PipelineError> {
        let staged = if self.config.symbolize_enabled {
            let symbolized = workdir.join("symbolized.bc");
            self.symbolize(input.path(), &symbolized).await?;
            symbolized
        } else {
            input.path().to_path_buf()
        };

        let link_input = if self.config.optimization_enabled {
            let optimized = workdir.join("optimized.bc");
            let mut cmd = Command::new(self.optimizer());
            cmd.arg("-O2").arg(&staged).arg("-o").arg(&optimized);
            debug!("running optimizer: {:?}", cmd);
            let result = cmd
                .output()
                .await
                .map_err(|e| PipelineError::Link(format!("optimizer: {e}")))?;
            if !result.status.success() {
                return Err(PipelineError::Link(format!(
                    "optimizer exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                )));
            }
            optimized
        } else {
            staged
        };

        let output = workdir.join("linked.bc");
        let mut cmd = Command::new(self.linker());
        cmd.arg(&link_input);
        cmd.arg("-o").arg(&output);

        debug!("running linker: {:?}", cmd);
        let result = cmd
            .output()
            .await
            .map_err(|e| PipelineError::Link(e.to_string()))?;
        if !result.status.success() {
            return Err(PipelineError::Link(format!(
                "linker exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.exists() {
            return Err(PipelineError::Link("linker produced no output".to_string()));
        }

        Ok(PipelineArtifact::new(output, ArtifactRole::LinkedBitcode))
    }
}
