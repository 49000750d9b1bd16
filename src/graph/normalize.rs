//! Cleanup of LLM-produced graphs and merging of per-document graphs.

use std::collections::{HashMap, HashSet};

use super::{ConceptEdge, ConceptGraph, ConceptNode};

const DEFAULT_RELATIONSHIP: &str = "related to";

/// Trimmed, lowercased, inner whitespace collapsed to single spaces.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase ASCII-alphanumeric slug joined by `-`.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_dash = false;
    for c in label.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "concept".to_string()
    } else {
        slug
    }
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn absorb(into: &mut ConceptNode, other: &ConceptNode) {
    for doc in &other.documents {
        if !into.documents.contains(doc) {
            into.documents.push(*doc);
        }
    }
    if into.description.trim().is_empty() && !other.description.trim().is_empty() {
        into.description = other.description.clone();
    }
    if (into.kind.is_empty() || into.kind == "concept") && !other.kind.is_empty() {
        into.kind = other.kind.clone();
    }
}

/// Deduplicate nodes by normalized label, give every node a unique id,
/// remap edges onto surviving ids and drop dangling, self-loop and
/// duplicate edges.
///
/// Edge endpoints may refer to a node either by id or by label.
pub fn normalize_graph(graph: ConceptGraph) -> ConceptGraph {
    let mut nodes: Vec<ConceptNode> = Vec::with_capacity(graph.nodes.len());
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut id_map: HashMap<String, String> = HashMap::new();
    let mut used_ids: HashSet<String> = HashSet::new();

    for mut node in graph.nodes {
        node.id = node.id.trim().to_string();
        node.label = node.label.split_whitespace().collect::<Vec<_>>().join(" ");
        if node.label.is_empty() {
            if node.id.is_empty() {
                continue;
            }
            node.label = node.id.clone();
        }
        node.kind = node.kind.trim().to_lowercase();

        let key = normalize_label(&node.label);
        if let Some(&idx) = by_key.get(&key) {
            absorb(&mut nodes[idx], &node);
            if !node.id.is_empty() {
                id_map.entry(node.id).or_insert_with(|| nodes[idx].id.clone());
            }
            continue;
        }

        let original_id = node.id.clone();
        let base = if original_id.is_empty() {
            slugify(&node.label)
        } else {
            original_id.clone()
        };
        node.id = unique_id(base, &mut used_ids);
        if !original_id.is_empty() {
            id_map.entry(original_id).or_insert_with(|| node.id.clone());
        }
        by_key.insert(key, nodes.len());
        nodes.push(node);
    }

    let resolve = |endpoint: &str| -> Option<String> {
        let endpoint = endpoint.trim();
        if let Some(id) = id_map.get(endpoint) {
            return Some(id.clone());
        }
        if used_ids.contains(endpoint) {
            return Some(endpoint.to_string());
        }
        by_key
            .get(&normalize_label(endpoint))
            .map(|&idx| nodes[idx].id.clone())
    };

    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut edges = Vec::with_capacity(graph.edges.len());
    for edge in graph.edges {
        let (Some(source), Some(target)) = (resolve(&edge.source), resolve(&edge.target)) else {
            continue;
        };
        if source == target {
            continue;
        }
        let relationship = match edge.relationship.trim() {
            "" => DEFAULT_RELATIONSHIP.to_string(),
            r => r.to_string(),
        };
        if !seen.insert((source.clone(), target.clone(), normalize_label(&relationship))) {
            continue;
        }
        edges.push(ConceptEdge {
            source,
            target,
            relationship,
        });
    }

    ConceptGraph { nodes, edges }
}

/// Union of several graphs keyed by normalized label.
///
/// Node ids are re-derived from labels so that ids that merely coincide
/// across graphs (`"n1"` in two documents) do not collide.
pub fn merge_graphs(graphs: &[ConceptGraph]) -> ConceptGraph {
    let mut merged = ConceptGraph::default();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut used_ids: HashSet<String> = HashSet::new();

    for graph in graphs {
        let graph = normalize_graph(graph.clone());
        let mut local: HashMap<String, String> = HashMap::new();

        for node in graph.nodes {
            let key = normalize_label(&node.label);
            match by_key.get(&key) {
                Some(&idx) => {
                    absorb(&mut merged.nodes[idx], &node);
                    local.insert(node.id, merged.nodes[idx].id.clone());
                }
                None => {
                    let id = unique_id(slugify(&node.label), &mut used_ids);
                    local.insert(node.id.clone(), id.clone());
                    by_key.insert(key, merged.nodes.len());
                    merged.nodes.push(ConceptNode { id, ..node });
                }
            }
        }

        for edge in graph.edges {
            if let (Some(source), Some(target)) =
                (local.get(&edge.source), local.get(&edge.target))
            {
                merged
                    .edges
                    .push(ConceptEdge::new(source.clone(), target.clone(), edge.relationship));
            }
        }
    }

    normalize_graph(merged)
}
