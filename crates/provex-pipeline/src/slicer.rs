//! Slicer stage
//!
//! Invokes the external program slicer against the slicing criterion.
//! Slicing is an optimization, never a soundness requirement: on failure the
//! stage forwards the pre-slicing artifact unchanged unless `require-slicer`
//! is set. Slicing can shrink further once earlier cuts remove now-dead
//! code, so the stage re-runs up to `repeat-slicing` times on its own
//! output, stopping early at a byte-identical fixed point.

use crate::error::PipelineError;
use provex_core::{ArtifactRole, PipelineArtifact, RunConfig};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// The external-slicer stage
pub struct SlicerStage<'a> {
    config: &'a RunConfig,
}

impl<'a> SlicerStage<'a> {
    /// Stage over a run's configuration
    pub fn new(config: &'a RunConfig) -> Self {
        SlicerStage { config }
    }

    fn binary(&self) -> PathBuf {
        self.config
            .tools
            .slicer
            .clone()
            .unwrap_or_else(|| PathBuf::from("llvm-slicer"))
    }

    /// Slice `input`, writing iteration outputs under `workdir`.
    ///
    /// Returns the sliced artifact, or the input itself on the non-fatal
    /// fallback path.
    pub async fn run(
        &self,
        input: &PipelineArtifact,
        workdir: &Path,
    ) -> Result<PipelineArtifact, PipelineError> {
        let mut current = input.clone();
        let mut previous = current.read_bytes()?;

        for iteration in 0..self.config.repeat_slicing.max(1) {
            let output = workdir.join(format!("sliced.{iteration}.bc"));
            if let Err(reason) = self.invoke(current.path(), &output).await {
                if self.config.require_slicer {
                    return Err(PipelineError::SlicerRequired(reason));
                }
                warn!(%reason, "slicer failed, forwarding unsliced artifact");
                return Ok(input.clone());
            }

            let sliced = PipelineArtifact::new(&output, ArtifactRole::SlicedBitcode);
            let bytes = sliced.read_bytes()?;
            if bytes == previous {
                debug!(iteration, "slicing reached a fixed point");
                return Ok(sliced);
            }
            previous = bytes;
            current = sliced;
        }

        Ok(current)
    }

    async fn invoke(&self, input: &Path, output: &Path) -> Result<(), String> {
        let mut cmd = Command::new(self.binary());
        cmd.arg("-c").arg(&self.config.slicing_criterion);
        cmd.arg("-pta").arg(self.config.pta.as_flag());
        for arg in &self.config.slicer_args {
            cmd.arg(arg);
        }
        cmd.arg(input);
        cmd.arg("-o").arg(output);

        debug!("running slicer: {:?}", cmd);
        let result = cmd.output().await.map_err(|e| e.to_string())?;
        if !result.status.success() {
            return Err(format!(
                "slicer exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            ));
        }
        if !output.exists() {
            return Err("slicer produced no output file".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Shell that strips slicer flags and copies input to output
    const ARG_PARSER: &str = r#"
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -c|-pta) shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) in="$1"; shift ;;
  esac
done
"#;

    fn config(dir: &Path, script: PathBuf, repeat: u32) -> RunConfig {
        let _ = dir;
        RunConfig {
            repeat_slicing: repeat,
            tools: provex_core::ToolPaths {
                slicer: Some(script),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn seed_input(dir: &Path) -> PipelineArtifact {
        let path = dir.join("input.bc");
        std::fs::write(&path, "line one\nline two\nline three\n").unwrap();
        PipelineArtifact::new(path, ArtifactRole::NormalizedSource)
    }

    #[tokio::test]
    async fn identity_slicer_stops_after_one_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "slicer.sh",
            &format!("{ARG_PARSER}\ncp \"$in\" \"$out\"\n"),
        );
        let config = config(dir.path(), script, 5);
        let input = seed_input(dir.path());

        let out = SlicerStage::new(&config).run(&input, dir.path()).await.unwrap();
        assert_eq!(out.role(), ArtifactRole::SlicedBitcode);
        // fixed point after the first iteration: no second output file
        assert!(dir.path().join("sliced.0.bc").exists());
        assert!(!dir.path().join("sliced.1.bc").exists());
    }

    #[tokio::test]
    async fn shrinking_slicer_reaches_fixed_point_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        // drops the last line each run until nothing is left
        let script = write_script(
            dir.path(),
            "slicer.sh",
            &format!("{ARG_PARSER}\nsed '$d' \"$in\" > \"$out\"\n"),
        );
        let config = config(dir.path(), script, 10);
        let input = seed_input(dir.path());

        let out = SlicerStage::new(&config).run(&input, dir.path()).await.unwrap();
        assert_eq!(std::fs::read(out.path()).unwrap(), b"");
        // 3 shrinking iterations plus the fixed-point check, well under 10
        assert!(dir.path().join("sliced.3.bc").exists());
        assert!(!dir.path().join("sliced.5.bc").exists());
    }

    #[tokio::test]
    async fn failure_falls_back_to_unsliced_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slicer.sh", "exit 1\n");
        let config = config(dir.path(), script, 3);
        let input = seed_input(dir.path());

        let out = SlicerStage::new(&config).run(&input, dir.path()).await.unwrap();
        assert_eq!(out, input, "fallback forwards the pre-slicing artifact");
    }

    #[tokio::test]
    async fn failure_is_fatal_under_require_slicer() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slicer.sh", "exit 1\n");
        let mut config = config(dir.path(), script, 3);
        config.require_slicer = true;
        let input = seed_input(dir.path());

        let err = SlicerStage::new(&config).run(&input, dir.path()).await.unwrap_err();
        assert!(matches!(err, PipelineError::SlicerRequired(_)));
    }
}
