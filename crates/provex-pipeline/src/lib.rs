//! The Provex verification pipeline
//!
//! Sequences the stages of one verification run:
//! transforms → slicing (optional) → instrumentation → link → back end →
//! verdict classification → witness emission. The controller owns the
//! working directory, the global deadline and the fallback policy; stages
//! hand immutable artifacts forward and never mutate each other's input.

mod controller;
mod error;
mod instrument;
mod link;
mod slicer;
mod transform;

pub use controller::*;
pub use error::*;
pub use instrument::*;
pub use link::*;
pub use slicer::*;
pub use transform::*;
