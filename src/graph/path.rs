//! Reasoning chains: shortest path between two concepts.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

use super::ConceptGraph;

/// One hop of a reasoning chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStep {
    pub from: String,
    pub to: String,
    pub relationship: String,
    /// The stored edge points `to -> from`
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningChain {
    pub found: bool,
    /// Node ids from source to target; empty when no path exists
    pub path: Vec<String>,
    pub steps: Vec<ChainStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReasoningChain {
    fn not_found(message: String) -> Self {
        Self {
            found: false,
            path: Vec::new(),
            steps: Vec::new(),
            message: Some(message),
        }
    }
}

/// Breadth-first search treating every edge as undirected.
///
/// Returns the first shortest path discovered (neighbors are visited in
/// edge order), `[source]` when `source == target`, or `None` when either
/// node is missing or the two are not connected.
pub fn find_path(graph: &ConceptGraph, source: &str, target: &str) -> Option<Vec<String>> {
    if !graph.contains_node(source) || !graph.contains_node(target) {
        return None;
    }
    if source == target {
        return Some(vec![source.to_string()]);
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        adjacency
            .entry(edge.target.as_str())
            .or_default()
            .push(edge.source.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::from([source]);
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::from([source]);

    while let Some(current) = queue.pop_front() {
        let Some(neighbors) = adjacency.get(current) else {
            continue;
        };
        for &next in neighbors {
            if !visited.insert(next) {
                continue;
            }
            parent.insert(next, current);
            if next == target {
                let mut path = vec![target.to_string()];
                let mut cursor = target;
                while let Some(&prev) = parent.get(cursor) {
                    path.push(prev.to_string());
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }

    None
}

/// [`find_path`] plus the relationship used for each hop and a plain
/// message when nothing connects the two concepts.
pub fn find_reasoning_chain(graph: &ConceptGraph, source: &str, target: &str) -> ReasoningChain {
    for id in [source, target] {
        if !graph.contains_node(id) {
            return ReasoningChain::not_found(format!(
                "No path found: concept '{id}' is not in the graph"
            ));
        }
    }

    let Some(path) = find_path(graph, source, target) else {
        return ReasoningChain::not_found(format!(
            "No path found between '{}' and '{}'",
            label_of(graph, source),
            label_of(graph, target)
        ));
    };

    let steps = path
        .windows(2)
        .map(|pair| {
            let (from, to) = (&pair[0], &pair[1]);
            let forward = graph
                .edges
                .iter()
                .find(|e| &e.source == from && &e.target == to);
            let (edge, reversed) = match forward {
                Some(e) => (Some(e), false),
                None => (
                    graph
                        .edges
                        .iter()
                        .find(|e| &e.source == to && &e.target == from),
                    true,
                ),
            };
            ChainStep {
                from: from.clone(),
                to: to.clone(),
                relationship: edge.map(|e| e.relationship.clone()).unwrap_or_default(),
                reversed,
            }
        })
        .collect();

    ReasoningChain {
        found: true,
        path,
        steps,
        message: None,
    }
}

fn label_of<'a>(graph: &'a ConceptGraph, id: &'a str) -> &'a str {
    graph.node(id).map(|n| n.label.as_str()).unwrap_or(id)
}
