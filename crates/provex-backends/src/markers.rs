//! Marker grammars
//!
//! Each adapter classifies its engine's free-text output through an ordered
//! list of marker rules instead of ad-hoc string matching, so classification
//! is auditable and testable without spawning a process. Rules are consulted
//! top-down; the first match decides the verdict. Output matching no rule is
//! UNKNOWN: an optimistic or pessimistic default here would be a soundness
//! bug.

use lazy_static::lazy_static;
use provex_core::{PropertyKind, Verdict};
use regex::Regex;

lazy_static! {
    // `false(<label>)` marker carrying a violated-property label
    static ref FALSE_LABEL: Regex =
        Regex::new(r"false\(([A-Za-z-]+)\)").expect("FALSE_LABEL regex is valid");
}

/// How a marker is matched against the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The marker occurs anywhere in a line
    Contains,
    /// The marker is a whole trimmed line
    WholeLine,
}

/// Verdict template a rule produces on match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Property proven
    True,
    /// Property violated; `None` means the label is extracted from the
    /// matched line when present
    False(Option<PropertyKind>),
    /// Crash or failed assertion
    AssertionFailed,
    /// Engine failure
    Error,
}

/// One marker → verdict rule
#[derive(Debug, Clone, Copy)]
pub struct MarkerRule {
    /// Text looked for in the output
    pub marker: &'static str,
    /// Matching mode
    pub kind: MatchKind,
    /// Verdict on match
    pub outcome: Outcome,
}

impl MarkerRule {
    /// Rule matching the marker anywhere in a line
    pub const fn contains(marker: &'static str, outcome: Outcome) -> Self {
        MarkerRule {
            marker,
            kind: MatchKind::Contains,
            outcome,
        }
    }

    /// Rule matching the marker as a whole trimmed line
    pub const fn line(marker: &'static str, outcome: Outcome) -> Self {
        MarkerRule {
            marker,
            kind: MatchKind::WholeLine,
            outcome,
        }
    }

    fn matches(&self, line: &str) -> bool {
        match self.kind {
            MatchKind::Contains => line.contains(self.marker),
            MatchKind::WholeLine => line.trim() == self.marker,
        }
    }
}

/// Classify engine output against an ordered rule list
pub fn classify(rules: &[MarkerRule], output: &str) -> Verdict {
    for rule in rules {
        for line in output.lines() {
            if !rule.matches(line) {
                continue;
            }
            return match rule.outcome {
                Outcome::True => Verdict::True,
                Outcome::False(kind) => {
                    Verdict::False(kind.or_else(|| extract_property_label(line)))
                }
                Outcome::AssertionFailed => Verdict::AssertionFailed,
                Outcome::Error => Verdict::error(line.trim().to_string()),
            };
        }
    }

    let reason = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("empty output")
        .to_string();
    Verdict::unknown(format!("no recognizable verdict marker: {reason}"))
}

/// Pull a property label out of a `false(<label>)` marker line
fn extract_property_label(line: &str) -> Option<PropertyKind> {
    let label = FALSE_LABEL.captures(line)?.get(1)?.as_str();
    match label {
        "valid-deref" | "VALID-DEREF" => Some(PropertyKind::ValidDeref),
        "valid-free" | "VALID-FREE" => Some(PropertyKind::ValidFree),
        "valid-memtrack" | "MEM-TRACK" => Some(PropertyKind::MemTrack),
        "null-deref" | "NULL-DEREF" => Some(PropertyKind::NullDeref),
        "def-behavior" | "UNDEF-BEHAVIOR" => Some(PropertyKind::UndefinedBehavior),
        "no-overflow" | "SIGNED-OVERFLOW" => Some(PropertyKind::SignedOverflow),
        "unreach-call" | "REACHCALL" => Some(PropertyKind::ReachCall),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: [MarkerRule; 3] = [
        MarkerRule::contains("VERIFICATION FAILED", Outcome::False(None)),
        MarkerRule::contains("VERIFICATION SUCCESSFUL", Outcome::True),
        MarkerRule::contains("PARSE ERROR", Outcome::Error),
    ];

    #[test]
    fn first_matching_rule_wins() {
        let output = "some preamble\nVERIFICATION FAILED\nVERIFICATION SUCCESSFUL";
        assert_eq!(classify(&RULES, output), Verdict::False(None));
    }

    #[test]
    fn rule_order_beats_line_order() {
        // the success line comes first in the output, but the failure rule
        // has priority
        let output = "VERIFICATION SUCCESSFUL\nVERIFICATION FAILED";
        assert_eq!(classify(&RULES, output), Verdict::False(None));
    }

    #[test]
    fn unmatched_output_is_unknown_not_true() {
        let verdict = classify(&RULES, "something inconclusive happened");
        assert!(matches!(verdict, Verdict::Unknown { .. }));
    }

    #[test]
    fn false_marker_carries_property_label() {
        let rules = [MarkerRule::contains("false(", Outcome::False(None))];
        assert_eq!(
            classify(&rules, "RESULT: false(valid-deref)"),
            Verdict::False(Some(PropertyKind::ValidDeref))
        );
        assert_eq!(
            classify(&rules, "RESULT: false(REACHCALL)"),
            Verdict::False(Some(PropertyKind::ReachCall))
        );
    }

    #[test]
    fn whole_line_rules_do_not_match_substrings() {
        let rules = [
            MarkerRule::line("unsat", Outcome::True),
            MarkerRule::line("sat", Outcome::False(None)),
        ];
        assert_eq!(classify(&rules, "unsat"), Verdict::True);
        assert_eq!(classify(&rules, "sat"), Verdict::False(None));
    }

    #[test]
    fn error_rule_keeps_the_line_as_message() {
        let verdict = classify(&RULES, "PARSE ERROR near line 3");
        assert_eq!(verdict, Verdict::error("PARSE ERROR near line 3"));
    }
}
