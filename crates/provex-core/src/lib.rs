//! Core types for the Provex verification pipeline
//!
//! This crate provides the data model shared by every pipeline stage:
//! - `RunConfig`: Immutable, validated configuration for one verification run
//! - `Property`: Canonical safety properties parsed from user-facing specs
//! - `Verdict`: The terminal classification of a verification run
//! - `PipelineArtifact`: Named intermediate files flowing between stages
//! - `LineMap`: Line-number remapping carried through source transforms

mod artifact;
mod config;
mod error;
mod linemap;
mod property;
mod verdict;

pub use artifact::*;
pub use config::*;
pub use error::*;
pub use linemap::*;
pub use property::*;
pub use verdict::*;
