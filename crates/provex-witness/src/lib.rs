//! Witness encoding for Provex
//!
//! Translates an internal execution trace or a bare verdict into the graph
//! witness artifact consumed by external auditors:
//! - `ExecutionTrace` / `TraceStep`: program-point records from the back end
//! - `Witness`: the directed witness graph, violation or correctness kind
//! - GraphML serialization with a lossless round-trip parser

mod graph;
mod graphml;
mod trace;

pub use graph::*;
pub use graphml::*;
pub use trace::*;

use thiserror::Error;

/// Errors from witness construction and (de)serialization.
///
/// Witness errors never change an already-decided verdict; callers log them
/// and carry on.
#[derive(Error, Debug)]
pub enum WitnessError {
    /// A violation witness needs a trace but none was produced
    #[error("no execution trace available for a violation witness")]
    MissingTrace,

    /// Witness file could not be written
    #[error("failed to write witness: {0}")]
    Write(#[from] std::io::Error),

    /// Re-parsing a witness document failed
    #[error("malformed witness document: {0}")]
    Parse(String),
}
