//! GraphML witness codec
//!
//! Writes a witness graph as a GraphML document and parses one back. The
//! format must round-trip: re-parsing a written witness reproduces the same
//! node/edge set and attributes. No XML library is involved; the documents
//! the codec accepts are the line-per-element ones it emits.

use crate::graph::{Witness, WitnessEdge, WitnessKind, WitnessNode};
use crate::trace::Branch;
use crate::WitnessError;
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

const XMLNS: &str = "http://graphml.graphdrawing.org/xmlns";

/// Serialize a witness to a GraphML document
pub fn to_graphml(witness: &Witness) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<graphml xmlns=\"{XMLNS}\">");

    for (id, target, ty) in [
        ("witness-type", "graph", "string"),
        ("producer", "graph", "string"),
        ("specification", "graph", "string"),
        ("entry", "node", "boolean"),
        ("violation", "node", "boolean"),
        ("sink", "node", "boolean"),
        ("sourceline", "edge", "int"),
        ("assumption", "edge", "string"),
        ("control", "edge", "string"),
    ] {
        let _ = writeln!(
            out,
            "  <key id=\"{id}\" for=\"{target}\" attr.name=\"{id}\" attr.type=\"{ty}\"/>"
        );
    }

    out.push_str("  <graph edgedefault=\"directed\">\n");
    let _ = writeln!(
        out,
        "    <data key=\"witness-type\">{}</data>",
        witness.kind.as_str()
    );
    let _ = writeln!(
        out,
        "    <data key=\"producer\">{}</data>",
        escape(&witness.producer)
    );
    for spec in &witness.specification {
        let _ = writeln!(out, "    <data key=\"specification\">{}</data>", escape(spec));
    }

    for node in &witness.nodes {
        write_node(&mut out, node);
    }
    for edge in &witness.edges {
        write_edge(&mut out, edge);
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

/// Write a witness file; the parent directory must exist
pub fn write_graphml_file(witness: &Witness, path: &Path) -> Result<(), WitnessError> {
    let document = to_graphml(witness);
    std::fs::write(path, document)?;
    debug!(path = %path.display(), "witness written");
    Ok(())
}

fn write_node(out: &mut String, node: &WitnessNode) {
    let flags: Vec<&str> = [
        ("entry", node.entry),
        ("violation", node.violation),
        ("sink", node.sink),
    ]
    .iter()
    .filter(|(_, set)| *set)
    .map(|(key, _)| *key)
    .collect();

    if flags.is_empty() {
        let _ = writeln!(out, "    <node id=\"{}\"/>", escape(&node.id));
        return;
    }
    let _ = writeln!(out, "    <node id=\"{}\">", escape(&node.id));
    for key in flags {
        let _ = writeln!(out, "      <data key=\"{key}\">true</data>");
    }
    out.push_str("    </node>\n");
}

fn write_edge(out: &mut String, edge: &WitnessEdge) {
    let _ = writeln!(
        out,
        "    <edge source=\"{}\" target=\"{}\">",
        escape(&edge.source),
        escape(&edge.target)
    );
    if let Some(line) = edge.line {
        let _ = writeln!(out, "      <data key=\"sourceline\">{line}</data>");
    }
    if let Some(assumption) = &edge.assumption {
        let _ = writeln!(
            out,
            "      <data key=\"assumption\">{}</data>",
            escape(assumption)
        );
    }
    if let Some(control) = edge.control {
        let _ = writeln!(out, "      <data key=\"control\">{}</data>", control.as_str());
    }
    out.push_str("    </edge>\n");
}

/// Parse a GraphML witness document written by `to_graphml`
pub fn parse_graphml(document: &str) -> Result<Witness, WitnessError> {
    let mut kind: Option<WitnessKind> = None;
    let mut producer = String::new();
    let mut specification = Vec::new();
    let mut nodes: IndexMap<String, WitnessNode> = IndexMap::new();
    let mut edges: Vec<WitnessEdge> = Vec::new();

    // the element whose <data> entries we are currently collecting
    enum Scope {
        Graph,
        Node(String),
        Edge(usize),
    }
    let mut scope = Scope::Graph;

    for raw in document.lines() {
        let line = raw.trim();
        if let Some(rest) = line.strip_prefix("<node ") {
            let id = attr(rest, "id")
                .ok_or_else(|| WitnessError::Parse("node without id".to_string()))?;
            let node = WitnessNode {
                id: id.clone(),
                entry: false,
                violation: false,
                sink: false,
            };
            nodes.insert(id.clone(), node);
            if !line.ends_with("/>") {
                scope = Scope::Node(id);
            }
        } else if let Some(rest) = line.strip_prefix("<edge ") {
            let source = attr(rest, "source")
                .ok_or_else(|| WitnessError::Parse("edge without source".to_string()))?;
            let target = attr(rest, "target")
                .ok_or_else(|| WitnessError::Parse("edge without target".to_string()))?;
            edges.push(WitnessEdge {
                source,
                target,
                line: None,
                assumption: None,
                control: None,
            });
            if !line.ends_with("/>") {
                scope = Scope::Edge(edges.len() - 1);
            }
        } else if line == "</node>" || line == "</edge>" {
            scope = Scope::Graph;
        } else if let Some((key, value)) = data_entry(line)? {
            match &scope {
                Scope::Graph => match key.as_str() {
                    "witness-type" => {
                        kind = Some(match value.as_str() {
                            "violation_witness" => WitnessKind::Violation,
                            "correctness_witness" => WitnessKind::Correctness,
                            other => {
                                return Err(WitnessError::Parse(format!(
                                    "unknown witness type: {other}"
                                )))
                            }
                        });
                    }
                    "producer" => producer = value,
                    "specification" => specification.push(value),
                    _ => {}
                },
                Scope::Node(id) => {
                    let node = nodes
                        .get_mut(id)
                        .ok_or_else(|| WitnessError::Parse("data outside node".to_string()))?;
                    let set = value == "true";
                    match key.as_str() {
                        "entry" => node.entry = set,
                        "violation" => node.violation = set,
                        "sink" => node.sink = set,
                        _ => {}
                    }
                }
                Scope::Edge(index) => {
                    let edge = &mut edges[*index];
                    match key.as_str() {
                        "sourceline" => {
                            let parsed = value.parse().map_err(|_| {
                                WitnessError::Parse(format!("bad sourceline: {value}"))
                            })?;
                            edge.line = Some(parsed);
                        }
                        "assumption" => edge.assumption = Some(value),
                        "control" => {
                            edge.control = Some(match value.as_str() {
                                "condition-true" => Branch::Then,
                                "condition-false" => Branch::Else,
                                other => {
                                    return Err(WitnessError::Parse(format!(
                                        "unknown control value: {other}"
                                    )))
                                }
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    let kind = kind.ok_or_else(|| WitnessError::Parse("missing witness-type".to_string()))?;
    let nodes: Vec<WitnessNode> = nodes.into_values().collect();
    if !nodes.iter().any(|n| n.entry) {
        return Err(WitnessError::Parse("witness has no entry node".to_string()));
    }

    Ok(Witness {
        kind,
        specification,
        producer,
        nodes,
        edges,
    })
}

/// `<data key="k">value</data>` on one line, or `None` for other elements
fn data_entry(line: &str) -> Result<Option<(String, String)>, WitnessError> {
    let Some(rest) = line.strip_prefix("<data ") else {
        return Ok(None);
    };
    let key = attr(rest, "key")
        .ok_or_else(|| WitnessError::Parse("data element without key".to_string()))?;
    let open_end = rest
        .find('>')
        .ok_or_else(|| WitnessError::Parse("unterminated data element".to_string()))?;
    let body = &rest[open_end + 1..];
    let value = body
        .strip_suffix("</data>")
        .ok_or_else(|| WitnessError::Parse("unterminated data element".to_string()))?;
    Ok(Some((key, unescape(value))))
}

/// Extract `name="value"` from an element's attribute list
fn attr(element: &str, name: &str) -> Option<String> {
    let pattern = format!("{name}=\"");
    let start = element.find(&pattern)? + pattern.len();
    let end = element[start..].find('"')? + start;
    Some(unescape(&element[start..end]))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{ExecutionTrace, TraceStep};
    use provex_core::{PropertyKind, Verdict};

    #[test]
    fn violation_witness_round_trips() {
        let trace = ExecutionTrace::from_steps(vec![
            TraceStep::at_line(10).with_assumption("x == 3"),
            TraceStep::at_line(12)
                .with_assumption("p == 0")
                .with_branch(Branch::Then),
        ]);
        let verdict = Verdict::False(Some(PropertyKind::ReachCall));
        let witness = Witness::violation(
            &verdict,
            &trace,
            None,
            vec!["CHECK( init(main()), LTL(G ! call(__VERIFIER_error())) )".to_string()],
            "provex 0.4.2",
        );

        let document = to_graphml(&witness);
        let parsed = parse_graphml(&document).unwrap();

        assert_eq!(parsed, witness);
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.edges.len(), 1);
        assert_eq!(parsed.edges[0].line, Some(12));
        assert!(parsed.nodes[1].sink);
        assert!(
            !(parsed.nodes[0].entry && parsed.nodes[0].violation),
            "entry node must not carry the violation flag"
        );
    }

    #[test]
    fn correctness_witness_round_trips() {
        let witness = Witness::correctness(
            &Verdict::True,
            vec!["MEMSAFETY".to_string()],
            "provex 0.4.2",
        );
        let parsed = parse_graphml(&to_graphml(&witness)).unwrap();
        assert_eq!(parsed, witness);
        assert_eq!(parsed.specification, vec!["MEMSAFETY".to_string()]);
    }

    #[test]
    fn assumptions_survive_escaping() {
        let trace = ExecutionTrace::from_steps(vec![
            TraceStep::at_line(1),
            TraceStep::at_line(2).with_assumption("a < b && c > \"d\""),
        ]);
        let witness = Witness::violation(
            &Verdict::AssertionFailed,
            &trace,
            None,
            vec!["REACHCALL".to_string()],
            "provex",
        );
        let parsed = parse_graphml(&to_graphml(&witness)).unwrap();
        assert_eq!(
            parsed.edges[0].assumption.as_deref(),
            Some("a < b && c > \"d\"")
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_graphml("<graphml></graphml>").is_err());
        assert!(parse_graphml("not xml at all").is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("witness.graphml");
        let witness =
            Witness::correctness(&Verdict::True, vec!["REACHCALL".to_string()], "provex");
        write_graphml_file(&witness, &path).unwrap();
        let parsed = parse_graphml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, witness);
    }
}
