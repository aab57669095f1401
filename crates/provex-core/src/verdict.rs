//! Verdict classification
//!
//! A `Verdict` is the terminal outcome of one verification run, produced
//! exactly once by the back-end adapter's output classification.

use crate::property::PropertyKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified outcome of a verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The property set was proven to hold
    True,
    /// A property violation was found; carries the violated property when the
    /// back end reported one
    False(Option<PropertyKind>),
    /// The back end found a crash or failed assertion
    AssertionFailed,
    /// The back end gave up or its output was not classifiable
    Unknown { reason: String },
    /// The back end failed outright (crash, unparseable exit)
    Error { message: String },
    /// The global deadline expired while the back end was running
    Timeout,
}

impl Verdict {
    /// Whether this verdict describes a property violation
    pub fn is_violation(&self) -> bool {
        matches!(self, Verdict::False(_) | Verdict::AssertionFailed)
    }

    /// Whether a witness may be emitted for this verdict.
    /// UNKNOWN, ERROR and TIMEOUT never produce witnesses.
    pub fn supports_witness(&self) -> bool {
        matches!(
            self,
            Verdict::True | Verdict::False(_) | Verdict::AssertionFailed
        )
    }

    /// Unknown verdict with a reason
    pub fn unknown(reason: impl Into<String>) -> Verdict {
        Verdict::Unknown {
            reason: reason.into(),
        }
    }

    /// Error verdict with a message
    pub fn error(message: impl Into<String>) -> Verdict {
        Verdict::Error {
            message: message.into(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::True => write!(f, "true"),
            Verdict::False(Some(kind)) => write!(f, "false({kind})"),
            Verdict::False(None) => write!(f, "false(unknown)"),
            Verdict::AssertionFailed => write!(f, "false(assert)"),
            Verdict::Unknown { .. } => write!(f, "unknown"),
            Verdict::Error { message } => write!(f, "error ({message})"),
            Verdict::Timeout => write!(f, "timeout"),
        }
    }
}
