use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Labels every node carries; they say nothing about the entity type.
pub const GENERIC_LABELS: &[&str] = &["Entity", "Node"];

/// Which part of the graph a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    Edges,
    Nodes,
    Both,
}

impl SearchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchScope::Edges => "edges",
            SearchScope::Nodes => "nodes",
            SearchScope::Both => "both",
        }
    }

    pub fn includes_edges(&self) -> bool {
        matches!(self, SearchScope::Edges | SearchScope::Both)
    }

    pub fn includes_nodes(&self) -> bool {
        matches!(self, SearchScope::Nodes | SearchScope::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl NodeInfo {
    /// First label that is not a generic marker label.
    pub fn entity_type(&self) -> Option<&str> {
        self.labels
            .iter()
            .map(String::as_str)
            .find(|l| !GENERIC_LABELS.contains(l))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub fact: String,
    pub source_node_uuid: String,
    pub target_node_uuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub facts: Vec<String>,
    pub edges: Vec<EdgeInfo>,
    pub nodes: Vec<NodeInfo>,
    pub query: String,
}

impl SearchResult {
    pub fn total_count(&self) -> usize {
        self.facts.len()
    }

    /// Render for a model observation.
    pub fn to_text(&self) -> String {
        let mut parts = vec![
            format!("Search query: {}", self.query),
            format!("Found {} relevant items", self.total_count()),
        ];
        if !self.facts.is_empty() {
            parts.push("\n### Related facts:".to_string());
            for (i, fact) in self.facts.iter().enumerate() {
                parts.push(format!("{}. {fact}", i + 1));
            }
        }
        parts.join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub graph_id: String,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
}

impl GraphStatistics {
    pub fn from_parts(graph_id: &str, nodes: &[NodeInfo], edges: &[EdgeInfo]) -> Self {
        let mut entity_types = BTreeMap::new();
        for node in nodes {
            for label in node.labels.iter().filter(|l| !GENERIC_LABELS.contains(&l.as_str())) {
                *entity_types.entry(label.clone()).or_insert(0) += 1;
            }
        }
        let mut relation_types = BTreeMap::new();
        for edge in edges {
            *relation_types.entry(edge.name.clone()).or_insert(0) += 1;
        }
        Self {
            graph_id: graph_id.to_string(),
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            entity_types,
            relation_types,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_name: String,
    pub entity_info: Option<NodeInfo>,
    pub related_facts: Vec<String>,
    pub related_edges: Vec<EdgeInfo>,
    pub total_relations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBrief {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub summary: String,
}

/// Everything the planner and the context tool need about a requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub requirement: String,
    pub related_facts: Vec<String>,
    pub graph_statistics: GraphStatistics,
    pub entities: Vec<EntityBrief>,
    pub total_entities: usize,
}
