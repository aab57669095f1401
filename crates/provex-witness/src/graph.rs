//! Witness graphs
//!
//! A witness is a directed graph with exactly one entry node. A violation
//! witness follows an execution trace to a designated sink node; a
//! correctness witness is the minimal graph marking the property set proven.
//! Witnesses are built once and never mutated afterwards.

use crate::trace::{Branch, ExecutionTrace};
use provex_core::{LineMap, Verdict};
use serde::{Deserialize, Serialize};

/// Kind of witness, recorded as a graph-level attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessKind {
    /// Counterexample path for a violated property
    Violation,
    /// Proof marker for a proven property set
    Correctness,
}

impl WitnessKind {
    /// GraphML attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            WitnessKind::Violation => "violation_witness",
            WitnessKind::Correctness => "correctness_witness",
        }
    }
}

/// Node of a witness graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessNode {
    /// Stable node id (`N0`, `N1`, ...)
    pub id: String,
    /// The unique entry node of the graph
    pub entry: bool,
    /// The node where the property violation occurs
    pub violation: bool,
    /// Terminal node of the counterexample path
    pub sink: bool,
}

impl WitnessNode {
    fn plain(id: String) -> Self {
        WitnessNode {
            id,
            entry: false,
            violation: false,
            sink: false,
        }
    }
}

/// Edge of a witness graph, annotated with the originating source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessEdge {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Source line in the original file
    pub line: Option<u32>,
    /// Value assumption holding along this edge
    pub assumption: Option<String>,
    /// Branch taken, for conditional edges
    pub control: Option<Branch>,
}

/// An immutable witness graph plus its graph-level attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    /// Violation or correctness
    pub kind: WitnessKind,
    /// The property strings the run checked
    pub specification: Vec<String>,
    /// Tool identity that produced the witness
    pub producer: String,
    /// Graph nodes, entry node first
    pub nodes: Vec<WitnessNode>,
    /// Graph edges in path order
    pub edges: Vec<WitnessEdge>,
}

impl Witness {
    /// Build a violation witness from a counterexample trace.
    ///
    /// One node per trace record; the first node is the entry, the last is
    /// flagged violation and sink. Edge annotations come from the record they
    /// lead into, with lines re-mapped to the original file through
    /// `line_map` when one is supplied.
    ///
    /// # Panics
    ///
    /// Panics when `verdict` is not FALSE/ASSERTION-FAILED or the trace is
    /// empty. That combination is a programming error in the controller, not
    /// a runtime condition to recover from.
    pub fn violation(
        verdict: &Verdict,
        trace: &ExecutionTrace,
        line_map: Option<&LineMap>,
        specification: Vec<String>,
        producer: impl Into<String>,
    ) -> Witness {
        assert!(
            verdict.is_violation(),
            "violation witness requires a FALSE or ASSERTION-FAILED verdict, got {verdict}"
        );
        assert!(
            !trace.is_empty(),
            "violation witness requires a non-empty execution trace"
        );

        let remap = |line: u32| line_map.map_or(line, |m| m.input_line(line));

        let steps = trace.steps();
        let mut nodes: Vec<WitnessNode> = (0..steps.len())
            .map(|i| WitnessNode::plain(format!("N{i}")))
            .collect();
        nodes[0].entry = true;
        let last = nodes.len() - 1;
        nodes[last].violation = true;
        nodes[last].sink = true;

        let edges = steps
            .windows(2)
            .enumerate()
            .map(|(i, pair)| WitnessEdge {
                source: format!("N{i}"),
                target: format!("N{}", i + 1),
                line: Some(remap(pair[1].line)),
                assumption: pair[1].assumption.clone(),
                control: pair[1].branch,
            })
            .collect();

        Witness {
            kind: WitnessKind::Violation,
            specification,
            producer: producer.into(),
            nodes,
            edges,
        }
    }

    /// Build a correctness witness: one entry node, no edges, annotated as a
    /// full proof of the given property set.
    ///
    /// # Panics
    ///
    /// Panics when `verdict` is not TRUE.
    pub fn correctness(
        verdict: &Verdict,
        specification: Vec<String>,
        producer: impl Into<String>,
    ) -> Witness {
        assert!(
            matches!(verdict, Verdict::True),
            "correctness witness requires a TRUE verdict, got {verdict}"
        );

        let mut entry = WitnessNode::plain("N0".to_string());
        entry.entry = true;

        Witness {
            kind: WitnessKind::Correctness,
            specification,
            producer: producer.into(),
            nodes: vec![entry],
            edges: Vec::new(),
        }
    }

    /// The unique entry node
    pub fn entry_node(&self) -> &WitnessNode {
        self.nodes
            .iter()
            .find(|n| n.entry)
            .expect("witness graphs always carry an entry node")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceStep;
    use provex_core::PropertyKind;

    fn two_step_trace() -> ExecutionTrace {
        ExecutionTrace::from_steps(vec![TraceStep::at_line(10), TraceStep::at_line(12)])
    }

    #[test]
    fn violation_witness_shape() {
        let verdict = Verdict::False(Some(PropertyKind::ReachCall));
        let witness = Witness::violation(
            &verdict,
            &two_step_trace(),
            None,
            vec!["REACHCALL".to_string()],
            "provex",
        );
        assert_eq!(witness.nodes.len(), 2);
        assert_eq!(witness.edges.len(), 1);
        assert_eq!(witness.edges[0].line, Some(12));
        assert!(witness.nodes[0].entry);
        assert!(!witness.nodes[0].violation, "entry and violation must not collide");
        assert!(witness.nodes[1].violation && witness.nodes[1].sink);
    }

    #[test]
    fn violation_witness_remaps_lines() {
        // two lines were inserted above the original content
        let map = LineMap::from_table(vec![0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let verdict = Verdict::AssertionFailed;
        let witness = Witness::violation(
            &verdict,
            &two_step_trace(),
            Some(&map),
            vec!["REACHCALL".to_string()],
            "provex",
        );
        assert_eq!(witness.edges[0].line, Some(10));
    }

    #[test]
    fn correctness_witness_is_minimal() {
        let witness = Witness::correctness(
            &Verdict::True,
            vec!["MEMSAFETY".to_string()],
            "provex",
        );
        assert_eq!(witness.nodes.len(), 1);
        assert!(witness.edges.is_empty());
        assert!(witness.entry_node().entry);
        assert_eq!(witness.kind, WitnessKind::Correctness);
    }

    #[test]
    #[should_panic(expected = "requires a FALSE")]
    fn violation_witness_rejects_true_verdict() {
        let _ = Witness::violation(
            &Verdict::True,
            &two_step_trace(),
            None,
            vec![],
            "provex",
        );
    }

    #[test]
    #[should_panic(expected = "non-empty execution trace")]
    fn violation_witness_rejects_empty_trace() {
        let _ = Witness::violation(
            &Verdict::False(None),
            &ExecutionTrace::new(),
            None,
            vec![],
            "provex",
        );
    }

    #[test]
    #[should_panic(expected = "requires a TRUE")]
    fn correctness_witness_rejects_violation_verdict() {
        let _ = Witness::correctness(&Verdict::False(None), vec![], "provex");
    }
}
