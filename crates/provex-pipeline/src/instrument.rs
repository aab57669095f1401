//! Instrumenter stage
//!
//! Weaves property-monitor code into the artifact by invoking the external
//! instrumenter once per canonical property, each with its own
//! monitor-definition file. Sub-monitors keep independent state, so a
//! MEMSAFETY run chains three independent weavings. Instrumentation errors
//! are always fatal; an unknown property cannot reach this stage because
//! configuration validation runs first.

use crate::error::PipelineError;
use provex_core::{ArtifactRole, PipelineArtifact, PropertyKind, RunConfig};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Monitor-definition file for a property, relative to the monitor directory
pub fn monitor_definition(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::ValidDeref => "valid-deref.json",
        PropertyKind::ValidFree => "valid-free.json",
        PropertyKind::MemTrack => "valid-memtrack.json",
        PropertyKind::NullDeref => "null-deref.json",
        PropertyKind::UndefinedBehavior => "def-behavior.json",
        PropertyKind::SignedOverflow => "no-overflow.json",
        PropertyKind::ReachCall => "unreach-call.json",
    }
}

/// The property-instrumentation stage
pub struct InstrumenterStage<'a> {
    config: &'a RunConfig,
}

impl<'a> InstrumenterStage<'a> {
    /// Stage over a run's configuration
    pub fn new(config: &'a RunConfig) -> Self {
        InstrumenterStage { config }
    }

    fn binary(&self) -> PathBuf {
        self.config
            .tools
            .instrumenter
            .clone()
            .unwrap_or_else(|| PathBuf::from("llvm-instr"))
    }

    /// Canonical properties of the run, deduplicated in first-seen order
    fn monitored_kinds(&self) -> Vec<PropertyKind> {
        let mut kinds = Vec::new();
        for property in &self.config.properties {
            for kind in &property.kinds {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        }
        kinds
    }

    /// Weave monitors for every configured property into `input`
    pub async fn run(
        &self,
        input: &PipelineArtifact,
        workdir: &Path,
    ) -> Result<PipelineArtifact, PipelineError> {
        let mut current = input.clone();
        for (index, kind) in self.monitored_kinds().into_iter().enumerate() {
            let monitor = self.config.monitor_dir.join(monitor_definition(kind));
            let output = workdir.join(format!("instrumented.{index}.bc"));

            let mut cmd = Command::new(self.binary());
            cmd.arg("--config").arg(&monitor);
            for arg in &self.config.instrumenter_args {
                cmd.arg(arg);
            }
            cmd.arg(current.path());
            cmd.arg("-o").arg(&output);

            debug!(property = %kind, "running instrumenter: {:?}", cmd);
            let result = cmd
                .output()
                .await
                .map_err(|e| PipelineError::Instrument(e.to_string()))?;
            if !result.status.success() {
                return Err(PipelineError::Instrument(format!(
                    "monitor {kind} failed with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                )));
            }
            if !output.exists() {
                return Err(PipelineError::Instrument(format!(
                    "monitor {kind} produced no output"
                )));
            }
            current = PipelineArtifact::new(&output, ArtifactRole::InstrumentedBitcode);
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provex_core::Property;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("instr.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    // args: --config file [extra] input -o output; appends the config name
    const WEAVER: &str = r#"
cfg=""
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --config) cfg="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) in="$1"; shift ;;
  esac
done
cp "$in" "$out"
basename "$cfg" >> "$out"
"#;

    #[test]
    fn every_property_has_a_monitor_definition() {
        for kind in [
            PropertyKind::ValidDeref,
            PropertyKind::ValidFree,
            PropertyKind::MemTrack,
            PropertyKind::NullDeref,
            PropertyKind::UndefinedBehavior,
            PropertyKind::SignedOverflow,
            PropertyKind::ReachCall,
        ] {
            assert!(monitor_definition(kind).ends_with(".json"));
        }
    }

    #[tokio::test]
    async fn memsafety_weaves_three_independent_monitors() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), WEAVER);
        let config = RunConfig {
            properties: vec![Property::parse("MEMSAFETY").unwrap()],
            tools: provex_core::ToolPaths {
                instrumenter: Some(script),
                ..Default::default()
            },
            ..Default::default()
        };

        let input_path = dir.path().join("input.bc");
        std::fs::write(&input_path, "bitcode\n").unwrap();
        let input = PipelineArtifact::new(input_path, ArtifactRole::SlicedBitcode);

        let out = InstrumenterStage::new(&config)
            .run(&input, dir.path())
            .await
            .unwrap();
        assert_eq!(out.role(), ArtifactRole::InstrumentedBitcode);

        let woven = std::fs::read_to_string(out.path()).unwrap();
        assert!(woven.contains("valid-deref.json"));
        assert!(woven.contains("valid-free.json"));
        assert!(woven.contains("valid-memtrack.json"));
    }

    #[tokio::test]
    async fn instrumenter_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 3\n");
        let config = RunConfig {
            properties: vec![Property::parse("REACHCALL").unwrap()],
            tools: provex_core::ToolPaths {
                instrumenter: Some(script),
                ..Default::default()
            },
            ..Default::default()
        };

        let input_path = dir.path().join("input.bc");
        std::fs::write(&input_path, "bitcode\n").unwrap();
        let input = PipelineArtifact::new(input_path, ArtifactRole::SlicedBitcode);

        let err = InstrumenterStage::new(&config)
            .run(&input, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Instrument(_)));
    }
}
