//! Concept graphs: LLM-extracted concepts and the relationships between them.
//!
//! Edges are stored directed (as the model emitted them) and rendered that
//! way, but [`path::find_reasoning_chain`] traverses them as undirected.

pub mod normalize;
pub mod path;
pub mod render;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use normalize::{merge_graphs, normalize_graph, normalize_label};
pub use path::{find_path, find_reasoning_chain, ReasoningChain};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptGraph {
    #[serde(default)]
    pub nodes: Vec<ConceptNode>,
    #[serde(default)]
    pub edges: Vec<ConceptEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    /// Documents this concept was extracted from
    #[serde(default)]
    pub documents: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub relationship: String,
}

fn default_kind() -> String {
    "concept".to_string()
}

impl ConceptNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: default_kind(),
            description: String::new(),
            documents: Vec::new(),
        }
    }
}

impl ConceptEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
        }
    }
}

impl ConceptGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&ConceptNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Record `document_id` as the provenance of every node.
    pub fn tag_document(&mut self, document_id: Uuid) {
        for node in &mut self.nodes {
            if !node.documents.contains(&document_id) {
                node.documents.push(document_id);
            }
        }
    }
}
