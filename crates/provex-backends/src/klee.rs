//! KLEE adapter
//!
//! KLEE is the primary symbolic-execution back end. Unlike the model-checker
//! adapters it also mines an execution trace out of the error report, which
//! later becomes the violation witness path.

use crate::exec::run_tool;
use crate::markers::{classify, MarkerRule, Outcome};
use crate::{BackendError, BackendRun, EnvSpec, HealthStatus, VerificationBackend};
use async_trait::async_trait;
use lazy_static::lazy_static;
use provex_core::{PipelineArtifact, PropertyKind, RunConfig};
use provex_witness::{ExecutionTrace, TraceStep};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const KLEE_MARKERS: [MarkerRule; 8] = [
    MarkerRule::contains("ASSERTION FAIL", Outcome::AssertionFailed),
    MarkerRule::contains(
        "memory error: out of bound pointer",
        Outcome::False(Some(PropertyKind::ValidDeref)),
    ),
    MarkerRule::contains(
        "memory error: invalid pointer: free",
        Outcome::False(Some(PropertyKind::ValidFree)),
    ),
    MarkerRule::contains(
        "memory leak detected",
        Outcome::False(Some(PropertyKind::MemTrack)),
    ),
    MarkerRule::contains(
        "overflow on signed",
        Outcome::False(Some(PropertyKind::SignedOverflow)),
    ),
    MarkerRule::contains("__VERIFIER_error", Outcome::False(Some(PropertyKind::ReachCall))),
    MarkerRule::contains("KLEE: ERROR:", Outcome::False(None)),
    MarkerRule::contains("KLEE: done:", Outcome::True),
];

lazy_static! {
    // "KLEE: ERROR: /work/unit.c:12: ASSERTION FAIL: p != 0"
    static ref ERROR_LINE: Regex =
        Regex::new(r"KLEE: ERROR: [^:\s]*:(\d+):").expect("ERROR_LINE regex is valid");
    // stack frame: "#000000042 in main () at /work/unit.c:10"
    static ref STACK_FRAME: Regex =
        Regex::new(r"#\d+\s+in\s+\S+\s*\([^)]*\)\s+at\s+[^:\s]*:(\d+)")
            .expect("STACK_FRAME regex is valid");
    // "KLEE: NOTE: assuming x == 3"
    static ref ASSUMING: Regex =
        Regex::new(r"KLEE: NOTE: assuming (.+)").expect("ASSUMING regex is valid");
}

/// KLEE symbolic-execution back end
pub struct KleeBackend {
    binary: PathBuf,
}

impl KleeBackend {
    /// Create the adapter, optionally with an explicit binary path
    pub fn new(binary: Option<PathBuf>) -> Self {
        KleeBackend {
            binary: binary.unwrap_or_else(|| PathBuf::from("klee")),
        }
    }

    /// Mine the error report for an execution trace.
    ///
    /// Stack frames appear innermost-first, so they are reversed into
    /// execution order; the ERROR line itself becomes the final, violating
    /// step. An output with no recognizable locations yields an empty trace.
    fn parse_trace(&self, output: &str) -> ExecutionTrace {
        let mut frames: Vec<TraceStep> = STACK_FRAME
            .captures_iter(output)
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .map(TraceStep::at_line)
            .collect();
        frames.reverse();

        if let Some(assumption) = ASSUMING
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
        {
            if let Some(first) = frames.first_mut() {
                first.assumption = Some(assumption);
            }
        }

        if let Some(line) = ERROR_LINE
            .captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            // the error site may repeat the innermost frame
            if frames.last().map(|s| s.line) != Some(line) {
                frames.push(TraceStep::at_line(line));
            }
        }

        ExecutionTrace::from_steps(frames)
    }
}

#[async_trait]
impl VerificationBackend for KleeBackend {
    fn name(&self) -> &str {
        "klee"
    }

    fn required_tool_version(&self) -> &str {
        "3.1"
    }

    fn prepare_environment(&self, base_dir: &Path, _config: &RunConfig) -> EnvSpec {
        let out_dir = base_dir.join("klee-out");
        EnvSpec {
            vars: vec![(
                "KLEE_OUTPUT_DIR".to_string(),
                out_dir.display().to_string(),
            )],
            dirs: vec![out_dir],
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
                "bitcode not found: {}",
                bitcode.path().display()
            )));
        }

        let base_dir = bitcode.path().parent().unwrap_or_else(|| Path::new("."));
        let env = self.prepare_environment(base_dir, config);

        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("--output-dir={}", base_dir.join("klee-out").display()));
        cmd.arg("--exit-on-error");
        cmd.arg("--write-paths");
        for arg in &config.backend_args {
            cmd.arg(arg);
        }
        cmd.arg(bitcode.path());
        for (key, value) in &env.vars {
            cmd.env(key, value);
        }

        let output = run_tool(cmd, deadline).await?;
        let raw = output.combined();
        let verdict = classify(&KLEE_MARKERS, &raw);
        debug!(verdict = %verdict, "klee classified");

        let trace = if verdict.is_violation() {
            let trace = self.parse_trace(&raw);
            if trace.is_empty() {
                None
            } else {
                Some(trace)
            }
        } else {
            None
        };

        Ok(BackendRun {
            verdict,
            raw_output: raw,
            trace,
            duration: output.duration,
        })
    }

    async fn health_check(&self) -> HealthStatus {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) if output.status.success() => HealthStatus::Healthy,
            Ok(_) => HealthStatus::Degraded {
                reason: "klee returned a non-zero exit code".to_string(),
            },
            Err(e) => HealthStatus::Unavailable {
                reason: format!("klee not found: {e}"),
            },
        }
    }
}
