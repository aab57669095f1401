//! Verification back-end adapters
//!
//! One uniform capability interface over heterogeneous verification engines:
//! - `VerificationBackend`: the adapter contract (name, environment, run)
//! - `create_backend`: factory selecting an adapter by configured name
//! - Marker grammars: per-adapter ordered rules classifying tool output
//!
//! Adapters spawn their engine as a child process bounded by the run's
//! deadline and classify its textual output into a `Verdict`. Unrecognized
//! output classifies as UNKNOWN, never as TRUE or FALSE.

mod cbmc;
mod cpachecker;
mod exec;
mod klee;
mod markers;
mod seahorn;
mod ultimate;

pub use cbmc::CbmcBackend;
pub use cpachecker::CpacheckerBackend;
pub use klee::KleeBackend;
pub use markers::{classify, MarkerRule, MatchKind, Outcome};
pub use seahorn::SeahornBackend;
pub use ultimate::UltimateBackend;

use async_trait::async_trait;
use provex_core::{PipelineArtifact, RunConfig, Verdict};
use provex_witness::ExecutionTrace;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from back-end adapters
#[derive(Error, Debug)]
pub enum BackendError {
    /// The requested back end is not among the known set
    #[error("unknown verification back end: {0}")]
    UnknownBackend(String),

    /// The engine binary could not be found
    #[error("back-end binary not found: {0}")]
    NotFound(String),

    /// The engine could not be spawned or exited abnormally
    #[error("back-end execution failed: {0}")]
    ExecutionFailed(String),

    /// The input artifact is unusable
    #[error("invalid back-end input: {0}")]
    InvalidInput(String),

    /// The deadline expired; the child process was terminated
    #[error("back end timed out after {0:?}")]
    Timeout(Duration),
}

/// Health of an external engine, checked without running a verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Binary present and answering
    Healthy,
    /// Binary present but misbehaving
    Degraded { reason: String },
    /// Binary missing
    Unavailable { reason: String },
}

/// Environment an adapter needs visible to its child process.
///
/// Returned as a description only; the caller creates the directories and
/// the adapter passes the variables to its own child. Process-wide state is
/// never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSpec {
    /// Variables set for the child process
    pub vars: Vec<(String, String)>,
    /// Directories that must exist under the working directory
    pub dirs: Vec<PathBuf>,
}

/// Outcome of one back-end invocation
#[derive(Debug, Clone)]
pub struct BackendRun {
    /// Classified verdict, produced exactly once
    pub verdict: Verdict,
    /// Captured stdout and stderr, size-unbounded
    pub raw_output: String,
    /// Counterexample trace, present only for violation verdicts
    pub trace: Option<ExecutionTrace>,
    /// Wall-clock time of the invocation
    pub duration: Duration,
}

/// Uniform contract over verification back ends
#[async_trait]
pub trait VerificationBackend: Send + Sync {
    /// Stable identifier used in logs and for dialect selection
    fn name(&self) -> &str;

    /// External toolchain version this adapter was validated against.
    /// Consumed by the external integrity check, not by the pipeline itself.
    fn required_tool_version(&self) -> &str;

    /// Declare directories and variables the engine needs. Side-effect free.
    fn prepare_environment(&self, base_dir: &Path, config: &RunConfig) -> EnvSpec {
        let _ = (base_dir, config);
        EnvSpec::default()
    }

    /// Run the engine on the linked bitcode, bounded by `deadline`
    /// (`None` = unbounded). Must terminate the child on expiry.
    async fn run(
        &self,
        bitcode: &PipelineArtifact,
        config: &RunConfig,
        deadline: Option<Duration>,
    ) -> Result<BackendRun, BackendError>;

    /// Ask the external binary for its version
    async fn health_check(&self) -> HealthStatus;
}

/// Names accepted by `create_backend`
pub const KNOWN_BACKENDS: [&str; 5] = ["klee", "cpachecker", "cbmc", "seahorn", "ultimate"];

/// Select and construct the configured back end.
///
/// Fails on an unknown name before any pipeline stage executes.
pub fn create_backend(config: &RunConfig) -> Result<Box<dyn VerificationBackend>, BackendError> {
    let binary = config.tools.backend.clone();
    match config.backend.as_str() {
        "klee" => Ok(Box::new(KleeBackend::new(binary))),
        "cpachecker" => Ok(Box::new(CpacheckerBackend::new(binary))),
        "cbmc" => Ok(Box::new(CbmcBackend::new(binary))),
        "seahorn" => Ok(Box::new(SeahornBackend::new(binary))),
        "ultimate" => Ok(Box::new(UltimateBackend::new(binary))),
        other => Err(BackendError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_backend_constructs() {
        for name in KNOWN_BACKENDS {
            let config = RunConfig {
                backend: name.to_string(),
                ..Default::default()
            };
            let backend = create_backend(&config).unwrap();
            assert_eq!(backend.name(), name);
            assert!(!backend.required_tool_version().is_empty());
        }
    }

    #[test]
    fn unknown_backend_is_fatal() {
        let config = RunConfig {
            backend: "oracle".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_backend(&config),
            Err(BackendError::UnknownBackend(_))
        ));
    }
}
