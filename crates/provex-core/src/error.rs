//! Configuration error taxonomy
//!
//! Configuration errors are fatal before the pipeline state machine starts;
//! they are the only errors that map to a non-zero process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Errors detected while building or validating a `RunConfig`
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Property token or formula outside the fixed mapping table
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    /// Property spec contained no tokens
    #[error("empty property specification")]
    EmptyPropertySpec,

    /// No source files were given
    #[error("no source files given")]
    NoSources,

    /// A listed source file does not exist
    #[error("source file not found: {0}")]
    MissingSource(PathBuf),

    /// Mutually exclusive flags were both set
    #[error("conflicting flags: {0}")]
    ConflictingFlags(String),

    /// A numeric flag could not be parsed
    #[error("malformed value for {flag}: {value}")]
    MalformedFlag { flag: String, value: String },
}
