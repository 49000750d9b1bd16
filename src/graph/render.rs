//! Export formats consumed by the front-end renderers.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Write;

use super::ConceptGraph;

/// Mermaid `flowchart LR` source. Node ids are positional (`n0`, `n1`, ...)
/// because concept ids may contain characters Mermaid rejects.
pub fn to_mermaid(graph: &ConceptGraph) -> String {
    let mut out = String::from("flowchart LR\n");
    let mut ids: HashMap<&str, String> = HashMap::new();

    for (i, node) in graph.nodes.iter().enumerate() {
        let id = format!("n{i}");
        let _ = writeln!(out, "    {id}[\"{}\"]", escape_mermaid(&node.label));
        ids.insert(node.id.as_str(), id);
    }

    for edge in &graph.edges {
        let (Some(source), Some(target)) =
            (ids.get(edge.source.as_str()), ids.get(edge.target.as_str()))
        else {
            continue;
        };
        if edge.relationship.is_empty() {
            let _ = writeln!(out, "    {source} --> {target}");
        } else {
            let _ = writeln!(
                out,
                "    {source} -->|\"{}\"| {target}",
                escape_mermaid(&edge.relationship)
            );
        }
    }

    out
}

fn escape_mermaid(text: &str) -> String {
    text.replace('"', "#quot;")
        .replace('|', "#124;")
        .replace('\n', " ")
}

/// Cytoscape.js `elements` JSON.
pub fn to_cytoscape(graph: &ConceptGraph) -> Value {
    let nodes: Vec<Value> = graph
        .nodes
        .iter()
        .map(|n| {
            json!({
                "data": {
                    "id": n.id,
                    "label": n.label,
                    "kind": n.kind,
                    "description": n.description,
                }
            })
        })
        .collect();

    let edges: Vec<Value> = graph
        .edges
        .iter()
        .enumerate()
        .map(|(i, e)| {
            json!({
                "data": {
                    "id": format!("e{i}"),
                    "source": e.source,
                    "target": e.target,
                    "label": e.relationship,
                }
            })
        })
        .collect();

    json!({ "elements": { "nodes": nodes, "edges": edges } })
}
