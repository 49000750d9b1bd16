//! Concept graph extraction from document text.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::config::LlmConfig;
use crate::graph::{normalize_graph, ConceptEdge, ConceptGraph, ConceptNode};
use crate::llm::client::complete_prompt;
use crate::llm::{extract_json_object, sanitize_for_prompt, truncate_to_char_boundary};

const MAX_CONCEPT_INPUT: usize = 10_000;

const CONCEPTS_SYSTEM: &str = "You extract concept maps from documents. Reply with ONLY a JSON \
object {\"nodes\": [{\"id\": string, \"label\": string, \"type\": string, \"description\": string}], \
\"edges\": [{\"source\": node id, \"target\": node id, \"relationship\": short verb phrase}]}. \
Use 5 to 25 nodes naming the document's key concepts, people, organizations and ideas, and \
connect them with the relationships the document states.";

pub async fn extract_concept_graph(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<ConceptGraph> {
    let excerpt = sanitize_for_prompt(truncate_to_char_boundary(text, MAX_CONCEPT_INPUT));
    let reply = complete_prompt(
        client,
        config,
        CONCEPTS_SYSTEM,
        &format!("Document:\n\"\"\"\n{excerpt}\n\"\"\""),
        0.2,
    )
    .await?;
    Ok(parse_concept_graph(&reply))
}

/// Parse a model reply into a normalized graph. Anything unreadable yields
/// an empty graph.
pub fn parse_concept_graph(reply: &str) -> ConceptGraph {
    let Some(Value::Object(root)) =
        extract_json_object(reply).and_then(|s| serde_json::from_str::<Value>(s).ok())
    else {
        tracing::warn!("Concept reply was not a JSON object, using an empty graph");
        return ConceptGraph::default();
    };

    let nodes = array(&root, &["nodes", "concepts"])
        .iter()
        .filter_map(parse_node)
        .collect();
    let edges = array(&root, &["edges", "relationships", "links"])
        .iter()
        .filter_map(parse_edge)
        .collect();

    normalize_graph(ConceptGraph { nodes, edges })
}

fn array<'a>(root: &'a Map<String, Value>, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|k| root.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Ids may come back as numbers.
fn endpoint(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_node(v: &Value) -> Option<ConceptNode> {
    let obj = match v {
        Value::String(label) => return Some(ConceptNode::new("", label.as_str())),
        Value::Object(obj) => obj,
        _ => return None,
    };
    let id = endpoint(obj, &["id"]).unwrap_or_default();
    let label = text(obj, &["label", "name", "title"])
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    if label.is_empty() {
        return None;
    }
    let mut node = ConceptNode::new(id, label);
    if let Some(kind) = text(obj, &["kind", "type", "category"]) {
        node.kind = kind.to_string();
    }
    if let Some(description) = text(obj, &["description", "summary"]) {
        node.description = description.to_string();
    }
    Some(node)
}

fn parse_edge(v: &Value) -> Option<ConceptEdge> {
    let obj = v.as_object()?;
    let source = endpoint(obj, &["source", "from"])?;
    let target = endpoint(obj, &["target", "to"])?;
    let relationship = text(obj, &["relationship", "label", "type", "relation"]).unwrap_or("");
    Some(ConceptEdge::new(source, target, relationship))
}
