//! Pipeline controller
//!
//! Drives one verification run through the stage sequence
//! `Init → Transform → Slice → Instrument → Link → Execute → Classify →
//! Witness → Done`, with `Aborted` reachable from every state. A controller
//! instance is single-use; concurrent runs use independent instances and
//! independent working directories.

use crate::error::PipelineError;
use crate::instrument::InstrumenterStage;
use crate::link::LinkStage;
use crate::slicer::SlicerStage;
use crate::transform::{apply_all, default_transforms};
use provex_backends::{create_backend, BackendError, VerificationBackend};
use provex_core::{ArtifactRole, LineMap, PipelineArtifact, RunConfig, Verdict};
use provex_witness::{write_graphml_file, ExecutionTrace, Witness, WitnessError};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Grace period granted to a back end past the global deadline before the
/// controller reaps it itself
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

/// States of the pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Init,
    Transform,
    Slice,
    Instrument,
    Link,
    Execute,
    Classify,
    Witness,
    Done,
    Aborted,
}

/// Final result of a completed run
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    /// The classified verdict
    pub verdict: Verdict,
    /// Terminal state, `Done` or `Aborted`
    pub state: PipelineState,
    /// Wall-clock time of the whole run
    pub elapsed: Duration,
    /// Where the witness was written, when one was
    pub witness_path: Option<PathBuf>,
    /// Working directory, retained only under the save-files policy
    pub working_dir: Option<PathBuf>,
}

/// Single-use driver for one verification run
pub struct Controller {
    config: RunConfig,
    backend: Box<dyn VerificationBackend>,
    state: PipelineState,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .finish()
    }
}

impl Controller {
    /// Validate the configuration and construct the configured back end.
    ///
    /// An unknown property, conflicting flags, a missing source or an
    /// unknown back-end name all fail here, before any stage executes.
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let backend = create_backend(&config)?;
        Ok(Controller {
            config,
            backend,
            state: PipelineState::Init,
        })
    }

    /// Construct with an explicit back end, for embedders and tests
    pub fn with_backend(
        config: RunConfig,
        backend: Box<dyn VerificationBackend>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Controller {
            config,
            backend,
            state: PipelineState::Init,
        })
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(from = ?self.state, to = ?state, "pipeline transition");
        self.state = state;
    }

    /// Run the pipeline to completion. Consumes the controller: a second run
    /// needs a fresh instance and a fresh working directory.
    pub async fn run(mut self) -> Result<RunOutcome, PipelineError> {
        let start = Instant::now();

        // an explicit working directory is never cleaned up
        if let Some(dir) = self.config.work_dir.clone() {
            std::fs::create_dir_all(&dir)?;
            info!(backend = self.backend.name(), dir = %dir.display(), "run started");
            let outcome = self.drive(start, &dir).await;
            return outcome.map(|mut o| {
                o.working_dir = Some(dir);
                o
            });
        }

        let workdir = tempfile::Builder::new().prefix("provex-").tempdir()?;
        info!(backend = self.backend.name(), dir = %workdir.path().display(), "run started");

        let outcome = self.drive(start, workdir.path()).await;

        // the working directory outlives the run only under save-files
        let retained = if self.config.save_files {
            let path = workdir.keep();
            info!(dir = %path.display(), "working directory retained");
            Some(path)
        } else {
            drop(workdir);
            None
        };

        outcome.map(|mut o| {
            o.working_dir = retained;
            o
        })
    }

    async fn drive(
        &mut self,
        start: Instant,
        workdir: &std::path::Path,
    ) -> Result<RunOutcome, PipelineError> {
        // Init: merge the source set into the unit the pipeline works on.
        // Line re-mapping is only meaningful for a single-file unit.
        let mut merged = String::new();
        for source in &self.config.sources {
            merged.push_str(&std::fs::read_to_string(source)?);
        }
        let unit = workdir.join("unit.c");
        std::fs::write(&unit, &merged)?;
        let source_artifact = PipelineArtifact::new(&unit, ArtifactRole::Source);
        let mappable = self.config.sources.len() == 1;

        // Transform
        self.enter(PipelineState::Transform);
        let transforms = default_transforms();
        let (normalized, line_map) = match apply_all(&transforms, &merged) {
            Ok(result) => result,
            Err(e) => {
                self.enter(PipelineState::Aborted);
                return Err(e.into());
            }
        };
        let normalized_path = workdir.join("normalized.c");
        std::fs::write(&normalized_path, &normalized)?;
        let mut artifact = PipelineArtifact::new(&normalized_path, ArtifactRole::NormalizedSource);
        debug!(role = %source_artifact.role(), "source registered");

        // Slice (optional)
        if self.config.slicing_enabled {
            self.enter(PipelineState::Slice);
            artifact = match SlicerStage::new(&self.config).run(&artifact, workdir).await {
                Ok(sliced) => sliced,
                Err(e) => {
                    self.enter(PipelineState::Aborted);
                    return Err(e);
                }
            };
        }

        // Instrument
        self.enter(PipelineState::Instrument);
        artifact = match InstrumenterStage::new(&self.config).run(&artifact, workdir).await {
            Ok(instrumented) => instrumented,
            Err(e) => {
                self.enter(PipelineState::Aborted);
                return Err(e);
            }
        };

        // Link
        self.enter(PipelineState::Link);
        artifact = match LinkStage::new(&self.config).run(&artifact, workdir).await {
            Ok(linked) => linked,
            Err(e) => {
                self.enter(PipelineState::Aborted);
                return Err(e);
            }
        };

        if !self.config.verification_enabled {
            self.enter(PipelineState::Done);
            info!("verification disabled, stopping after link");
            return Ok(self.outcome(Verdict::unknown("verification disabled"), start, None));
        }

        // Execute
        self.enter(PipelineState::Execute);
        let remaining = self
            .config
            .deadline()
            .map(|d| d.saturating_sub(start.elapsed()));
        if remaining == Some(Duration::ZERO) {
            self.enter(PipelineState::Aborted);
            return Ok(self.outcome(Verdict::Timeout, start, None));
        }

        let env = self.backend.prepare_environment(workdir, &self.config);
        for dir in &env.dirs {
            std::fs::create_dir_all(dir)?;
        }

        let execution = self.execute(&artifact, remaining).await;
        let (verdict, trace) = match execution {
            Ok((verdict, trace)) => (verdict, trace),
            Err(BackendError::Timeout(limit)) => {
                warn!(?limit, "deadline expired, back end terminated");
                self.enter(PipelineState::Aborted);
                return Ok(self.outcome(Verdict::Timeout, start, None));
            }
            Err(e) => (Verdict::error(e.to_string()), None),
        };

        // Classify
        self.enter(PipelineState::Classify);
        let verdict = self.attribute_property(verdict);
        info!(verdict = %verdict, "verdict classified");

        // Witness (optional)
        let witness_path = if verdict.supports_witness() && self.config.witness_enabled {
            self.enter(PipelineState::Witness);
            let map = if mappable { Some(&line_map) } else { None };
            self.emit_witness(&verdict, trace.as_ref(), map)
        } else {
            None
        };

        self.enter(PipelineState::Done);
        Ok(self.outcome(verdict, start, witness_path))
    }

    /// When a back end reports a violation without naming the property,
    /// attribute it to the configured one if there is exactly one candidate
    fn attribute_property(&self, verdict: Verdict) -> Verdict {
        if !matches!(verdict, Verdict::False(None)) {
            return verdict;
        }
        let mut kinds = self
            .config
            .properties
            .iter()
            .flat_map(|p| p.kinds.iter().copied());
        match kinds.next() {
            Some(kind) if kinds.all(|k| k == kind) => Verdict::False(Some(kind)),
            _ => verdict,
        }
    }

    /// Run the back end, bounded by the remaining deadline plus a grace
    /// period in case the adapter fails to reap its own child
    async fn execute(
        &self,
        artifact: &PipelineArtifact,
        remaining: Option<Duration>,
    ) -> Result<(Verdict, Option<ExecutionTrace>), BackendError> {
        let run = self.backend.run(artifact, &self.config, remaining);
        let result = match remaining {
            Some(limit) => match tokio::time::timeout(limit + DEADLINE_GRACE, run).await {
                Ok(result) => result,
                Err(_) => return Err(BackendError::Timeout(limit)),
            },
            None => run.await,
        };
        result.map(|r| {
            debug!(bytes = r.raw_output.len(), "back-end output captured");
            (r.verdict, r.trace)
        })
    }

    /// Build and write the witness. Failures are logged, never escalated:
    /// the verdict is the primary result.
    fn emit_witness(
        &self,
        verdict: &Verdict,
        trace: Option<&ExecutionTrace>,
        line_map: Option<&LineMap>,
    ) -> Option<PathBuf> {
        let specification: Vec<String> = self
            .config
            .properties
            .iter()
            .map(|p| p.source.clone())
            .collect();
        let producer = format!("provex {}", env!("CARGO_PKG_VERSION"));

        let witness = if verdict.is_violation() {
            match trace {
                Some(trace) if !trace.is_empty() => {
                    Witness::violation(verdict, trace, line_map, specification, producer)
                }
                _ => {
                    warn!(error = %WitnessError::MissingTrace, "skipping witness");
                    return None;
                }
            }
        } else {
            Witness::correctness(verdict, specification, producer)
        };

        let path = self.config.witness_path.clone();
        match write_graphml_file(&witness, &path) {
            Ok(()) => {
                info!(path = %path.display(), kind = witness.kind.as_str(), "witness written");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "witness write failed");
                None
            }
        }
    }

    fn outcome(
        &self,
        verdict: Verdict,
        start: Instant,
        witness_path: Option<PathBuf>,
    ) -> RunOutcome {
        RunOutcome {
            verdict,
            state: self.state,
            elapsed: start.elapsed(),
            witness_path,
            working_dir: None,
        }
    }
}
