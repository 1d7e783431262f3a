use serde::Serialize;
use tracing::{error, info};

use super::{ToolCall, ToolResult};
use crate::graph::{GraphBackend, GraphRetriever, RetrievalError, SearchScope};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const CONTEXT_LIMIT: usize = 30;

/// Descriptive registry entry; parameter types are not enforced.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [(&'static str, &'static str)],
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "search_graph",
        description: "Search the knowledge graph. Returns facts and relationships related to the query.",
        parameters: &[
            ("query", "search query string"),
            ("limit", "number of results (optional, default 10)"),
        ],
    },
    ToolSpec {
        name: "get_graph_statistics",
        description: "Graph statistics: node and edge counts, entity and relation type distribution.",
        parameters: &[],
    },
    ToolSpec {
        name: "get_entity_summary",
        description: "Details and relationship summary for one named entity.",
        parameters: &[("entity_name", "entity name")],
    },
    ToolSpec {
        name: "get_simulation_context",
        description: "Facts, statistics and entities relevant to the simulation requirement.",
        parameters: &[("query", "extra query (optional, defaults to the requirement)")],
    },
    ToolSpec {
        name: "get_entities_by_type",
        description: "List entities of one type, e.g. Student or PublicFigure.",
        parameters: &[("entity_type", "entity type name")],
    },
];

/// The registered tools, matched by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SearchGraph,
    GraphStatistics,
    EntitySummary,
    SimulationContext,
    EntitiesByType,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "search_graph" => Some(Self::SearchGraph),
            "get_graph_statistics" => Some(Self::GraphStatistics),
            "get_entity_summary" => Some(Self::EntitySummary),
            "get_simulation_context" => Some(Self::SimulationContext),
            "get_entities_by_type" => Some(Self::EntitiesByType),
            _ => None,
        }
    }
}

/// Tool list block embedded in prompts.
pub fn tools_description() -> String {
    let mut parts = vec!["Available tools:".to_string()];
    for tool in TOOLS {
        parts.push(format!("- {}: {}", tool.name, tool.description));
        if !tool.parameters.is_empty() {
            let params: Vec<String> = tool
                .parameters
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect();
            parts.push(format!("  parameters: {}", params.join(", ")));
        }
    }
    parts.join("\n")
}

fn to_pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Executes tool calls for one graph and requirement. Never fails outward.
pub struct ToolDispatcher<'a, B> {
    retriever: &'a GraphRetriever<B>,
    graph_id: &'a str,
    requirement: &'a str,
}

impl<'a, B: GraphBackend> ToolDispatcher<'a, B> {
    pub fn new(retriever: &'a GraphRetriever<B>, graph_id: &'a str, requirement: &'a str) -> Self {
        Self {
            retriever,
            graph_id,
            requirement,
        }
    }

    pub fn graph_id(&self) -> &str {
        self.graph_id
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        info!(tool = %call.name, parameters = ?call.parameters, "executing tool");
        let Some(kind) = ToolKind::from_name(&call.name) else {
            return ToolResult::error(format!("unknown tool: {}", call.name));
        };
        match self.run(kind, call).await {
            Ok(text) => ToolResult::Text(text),
            Err(e) => {
                error!(tool = %call.name, "tool execution failed: {e}");
                ToolResult::error(format!("tool {} failed: {e}", call.name))
            }
        }
    }

    async fn run(&self, kind: ToolKind, call: &ToolCall) -> Result<String, RetrievalError> {
        let graph_id = self.graph_id;
        match kind {
            ToolKind::SearchGraph => {
                let query = call.param_str("query").unwrap_or_default();
                let limit = call
                    .param_usize("limit")
                    .unwrap_or(DEFAULT_SEARCH_LIMIT)
                    .max(1);
                let result = self
                    .retriever
                    .search(graph_id, query, limit, SearchScope::Edges)
                    .await?;
                Ok(result.to_text())
            }
            ToolKind::GraphStatistics => Ok(to_pretty(&self.retriever.statistics(graph_id).await?)),
            ToolKind::EntitySummary => {
                let name = call.param_str("entity_name").unwrap_or_default();
                Ok(to_pretty(&self.retriever.entity_summary(graph_id, name).await?))
            }
            ToolKind::SimulationContext => {
                let query = call
                    .param_str("query")
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or(self.requirement);
                Ok(to_pretty(
                    &self
                        .retriever
                        .context_bundle(graph_id, query, CONTEXT_LIMIT)
                        .await?,
                ))
            }
            ToolKind::EntitiesByType => {
                let entity_type = call.param_str("entity_type").unwrap_or_default();
                Ok(to_pretty(
                    &self.retriever.entities_by_type(graph_id, entity_type).await?,
                ))
            }
        }
    }
}
