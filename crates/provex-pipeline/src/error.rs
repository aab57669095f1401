//! Pipeline error taxonomy
//!
//! Stage errors are fatal and abort the run before a verdict exists. Slicer
//! failures are recoverable unless `require-slicer` is set. Back-end and
//! witness failures are not represented here: they become verdicts or are
//! merely logged.

use provex_backends::BackendError;
use provex_core::ConfigError;
use thiserror::Error;

/// A source transform failed on malformed input
#[derive(Error, Debug)]
#[error("{transform}: parse error: {message}")]
pub struct StageError {
    /// Name of the failing transform
    pub transform: &'static str,
    /// What could not be parsed
    pub message: String,
}

/// Fatal errors that abort a run before a verdict is produced
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid configuration, detected before the state machine starts
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Back-end construction failed (unknown name)
    #[error("back-end error: {0}")]
    Backend(#[from] BackendError),

    /// A source transform rejected its input
    #[error("stage error: {0}")]
    Stage(#[from] StageError),

    /// The slicer failed and `require-slicer` is set
    #[error("slicer failed: {0}")]
    SlicerRequired(String),

    /// The instrumenter failed; instrumentation errors are always fatal
    #[error("instrumenter failed: {0}")]
    Instrument(String),

    /// The uninitialized-memory symbolization pass failed; without it a back
    /// end would under-approximate the program's behaviors
    #[error("uninitialized-memory symbolization failed: {0}")]
    Symbolize(String),

    /// Linking produced no usable bitcode; always a pipeline bug
    #[error("link failed: {0}")]
    Link(String),

    /// Working-directory or artifact bookkeeping failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
