//! Execution traces
//!
//! A trace is the ordered sequence of program-point records a back end
//! reports for a violated property. It exists only for FALSE and
//! ASSERTION-FAILED verdicts.

use serde::{Deserialize, Serialize};

/// Which side of a conditional the execution took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Branch {
    /// The true branch
    Then,
    /// The false branch
    Else,
}

impl Branch {
    /// GraphML attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Then => "condition-true",
            Branch::Else => "condition-false",
        }
    }
}

/// One program-point record of an execution trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Source line in the file the back end ran on
    pub line: u32,
    /// Value assignment observed at this point, e.g. `x == 3`
    pub assumption: Option<String>,
    /// Branch taken, when the point is a conditional
    pub branch: Option<Branch>,
}

impl TraceStep {
    /// Step at a source line with no further annotations
    pub fn at_line(line: u32) -> Self {
        TraceStep {
            line,
            assumption: None,
            branch: None,
        }
    }

    /// Attach a value assumption
    pub fn with_assumption(mut self, assumption: impl Into<String>) -> Self {
        self.assumption = Some(assumption.into());
        self
    }

    /// Attach the branch taken
    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }
}

/// Ordered sequence of trace steps ending at the violation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    steps: Vec<TraceStep>,
}

impl ExecutionTrace {
    /// Empty trace
    pub fn new() -> Self {
        ExecutionTrace::default()
    }

    /// Build from a step sequence
    pub fn from_steps(steps: Vec<TraceStep>) -> Self {
        ExecutionTrace { steps }
    }

    /// Append a step
    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no step was recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The recorded steps in execution order
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }
}
