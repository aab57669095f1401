//! Safety property vocabulary
//!
//! Properties arrive either as shortcut keys (`MEMSAFETY`, `REACHCALL`, ...)
//! or as SV-COMP style `CHECK( init(main()), LTL(...) )` formulas. Both forms
//! map into a fixed canonical vocabulary; anything outside the table is a
//! configuration error, never a silently dropped property.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identifier for a checked safety property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Every pointer dereference is valid
    ValidDeref,
    /// Every `free` releases an allocated, not-yet-freed pointer
    ValidFree,
    /// All allocated memory is tracked and released
    MemTrack,
    /// No null-pointer dereference
    NullDeref,
    /// No undefined behavior
    UndefinedBehavior,
    /// No signed integer overflow
    SignedOverflow,
    /// The designated error call is unreachable
    ReachCall,
}

impl PropertyKind {
    /// Canonical lowercase name, used in verdicts and witness specifications
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::ValidDeref => "valid-deref",
            PropertyKind::ValidFree => "valid-free",
            PropertyKind::MemTrack => "valid-memtrack",
            PropertyKind::NullDeref => "null-deref",
            PropertyKind::UndefinedBehavior => "def-behavior",
            PropertyKind::SignedOverflow => "no-overflow",
            PropertyKind::ReachCall => "unreach-call",
        }
    }

    /// The MEMSAFETY expansion set
    pub fn memsafety() -> [PropertyKind; 3] {
        [
            PropertyKind::ValidDeref,
            PropertyKind::ValidFree,
            PropertyKind::MemTrack,
        ]
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed property: the canonical kinds plus the original user-facing text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Canonical kinds this spec expands to (MEMSAFETY expands to three)
    pub kinds: Vec<PropertyKind>,
    /// The string the property was parsed from, kept for witness output
    pub source: String,
}

impl Property {
    /// Parse one property token or LTL formula.
    ///
    /// The mapping is total over a fixed table; unknown keys fail loudly.
    pub fn parse(input: &str) -> Result<Property, ConfigError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyPropertySpec);
        }

        let kinds = if let Some(formula) = ltl_body(trimmed) {
            lookup_ltl(formula)
                .ok_or_else(|| ConfigError::UnknownProperty(trimmed.to_string()))?
        } else {
            lookup_shortcut(trimmed)
                .ok_or_else(|| ConfigError::UnknownProperty(trimmed.to_string()))?
        };

        Ok(Property {
            kinds,
            source: trimmed.to_string(),
        })
    }

    /// Parse a whole property spec: inline specs are whitespace-tokenized,
    /// file contents are newline-separated. LTL formulas contain spaces, so a
    /// spec holding `CHECK(` formulas is split on newlines only.
    pub fn parse_spec(spec: &str) -> Result<Vec<Property>, ConfigError> {
        let tokens: Vec<&str> = if spec.contains("CHECK(") {
            spec.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
        } else {
            spec.split_whitespace().collect()
        };
        if tokens.is_empty() {
            return Err(ConfigError::EmptyPropertySpec);
        }
        tokens.iter().map(|t| Property::parse(t)).collect()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Extract the LTL body of a `CHECK( init(main()), LTL(...) )` formula
fn ltl_body(input: &str) -> Option<&str> {
    // strip exactly one closer each for CHECK( and LTL(; the body itself may
    // end in parentheses, as in `call(__VERIFIER_error())`
    let rest = input.strip_prefix("CHECK(")?.trim_end().strip_suffix(')')?;
    let ltl_start = rest.find("LTL(")?;
    let body = rest[ltl_start + 4..].trim().strip_suffix(')')?;
    Some(body.trim())
}

fn lookup_ltl(body: &str) -> Option<Vec<PropertyKind>> {
    let compact: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match compact.as_str() {
        "G valid-deref" => Some(vec![PropertyKind::ValidDeref]),
        "G valid-free" => Some(vec![PropertyKind::ValidFree]),
        "G valid-memtrack" => Some(vec![PropertyKind::MemTrack]),
        "G valid-memsafety" => Some(PropertyKind::memsafety().to_vec()),
        "G ! overflow" => Some(vec![PropertyKind::SignedOverflow]),
        "G def-behavior" => Some(vec![PropertyKind::UndefinedBehavior]),
        "G ! call(__VERIFIER_error())" | "G ! call(reach_error())" => {
            Some(vec![PropertyKind::ReachCall])
        }
        _ => None,
    }
}

fn lookup_shortcut(token: &str) -> Option<Vec<PropertyKind>> {
    match token {
        "MEMSAFETY" => Some(PropertyKind::memsafety().to_vec()),
        "VALID-DEREF" => Some(vec![PropertyKind::ValidDeref]),
        "VALID-FREE" => Some(vec![PropertyKind::ValidFree]),
        "MEM-TRACK" => Some(vec![PropertyKind::MemTrack]),
        "NULL-DEREF" => Some(vec![PropertyKind::NullDeref]),
        "UNDEF-BEHAVIOR" => Some(vec![PropertyKind::UndefinedBehavior]),
        "SIGNED-OVERFLOW" => Some(vec![PropertyKind::SignedOverflow]),
        "REACHCALL" => Some(vec![PropertyKind::ReachCall]),
        _ => None,
    }
}
