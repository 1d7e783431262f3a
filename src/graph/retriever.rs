use tracing::{info, warn};

use super::local;
use super::types::{
    ContextBundle, EdgeInfo, EntityBrief, EntitySummary, GraphStatistics, NodeInfo, SearchResult,
    SearchScope,
};
use super::{GraphBackend, RetrievalError};
use crate::retry::RetryPolicy;

/// How many facts an entity summary searches for.
const ENTITY_SEARCH_LIMIT: usize = 20;

/// Retrying retrieval service with a local search fallback and derived queries.
pub struct GraphRetriever<B> {
    backend: B,
    retry: RetryPolicy,
}

impl<B: GraphBackend> GraphRetriever<B> {
    pub fn new(backend: B, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Native search with retry; on failure, keyword-score every edge/node locally.
    pub async fn search(
        &self,
        graph_id: &str,
        query: &str,
        limit: usize,
        scope: SearchScope,
    ) -> Result<SearchResult, RetrievalError> {
        info!(graph_id, query, limit, scope = scope.as_str(), "graph search");
        let native = self
            .retry
            .run("graph_search", move || {
                self.backend.search(graph_id, query, limit, scope)
            })
            .await;

        match native {
            Ok(result) => {
                info!(facts = result.total_count(), "search completed");
                Ok(result)
            }
            Err(e) => {
                warn!("native search failed, using local search: {e}");
                self.local_search(graph_id, query, limit, scope).await
            }
        }
    }

    async fn local_search(
        &self,
        graph_id: &str,
        query: &str,
        limit: usize,
        scope: SearchScope,
    ) -> Result<SearchResult, RetrievalError> {
        let edges = if scope.includes_edges() {
            Some(self.list_edges(graph_id).await?)
        } else {
            None
        };
        let nodes = if scope.includes_nodes() {
            Some(self.list_nodes(graph_id).await?)
        } else {
            None
        };
        let result = local::local_search(edges, nodes, query, limit);
        info!(facts = result.total_count(), "local search completed");
        Ok(result)
    }

    pub async fn list_nodes(&self, graph_id: &str) -> Result<Vec<NodeInfo>, RetrievalError> {
        self.retry
            .run("list_nodes", move || self.backend.list_nodes(graph_id))
            .await
    }

    pub async fn list_edges(&self, graph_id: &str) -> Result<Vec<EdgeInfo>, RetrievalError> {
        self.retry
            .run("list_edges", move || self.backend.list_edges(graph_id))
            .await
    }

    pub async fn node_detail(&self, uuid: &str) -> Result<Option<NodeInfo>, RetrievalError> {
        self.retry
            .run("node_detail", move || self.backend.node_detail(uuid))
            .await
    }

    /// Edges where the node is either endpoint.
    pub async fn node_edges(
        &self,
        graph_id: &str,
        node_uuid: &str,
    ) -> Result<Vec<EdgeInfo>, RetrievalError> {
        Ok(self
            .list_edges(graph_id)
            .await?
            .into_iter()
            .filter(|e| e.source_node_uuid == node_uuid || e.target_node_uuid == node_uuid)
            .collect())
    }

    pub async fn entities_by_type(
        &self,
        graph_id: &str,
        entity_type: &str,
    ) -> Result<Vec<NodeInfo>, RetrievalError> {
        let nodes: Vec<NodeInfo> = self
            .list_nodes(graph_id)
            .await?
            .into_iter()
            .filter(|n| n.labels.iter().any(|l| l == entity_type))
            .collect();
        info!(entity_type, count = nodes.len(), "entities by type");
        Ok(nodes)
    }

    pub async fn entity_summary(
        &self,
        graph_id: &str,
        entity_name: &str,
    ) -> Result<EntitySummary, RetrievalError> {
        let search = self
            .search(graph_id, entity_name, ENTITY_SEARCH_LIMIT, SearchScope::Edges)
            .await?;
        let entity = self
            .list_nodes(graph_id)
            .await?
            .into_iter()
            .find(|n| n.name.to_lowercase() == entity_name.to_lowercase());

        let related_edges = match &entity {
            Some(node) => self.node_edges(graph_id, &node.uuid).await?,
            None => Vec::new(),
        };

        Ok(EntitySummary {
            entity_name: entity_name.to_string(),
            entity_info: entity,
            related_facts: search.facts,
            total_relations: related_edges.len(),
            related_edges,
        })
    }

    pub async fn statistics(&self, graph_id: &str) -> Result<GraphStatistics, RetrievalError> {
        let nodes = self.list_nodes(graph_id).await?;
        let edges = self.list_edges(graph_id).await?;
        Ok(GraphStatistics::from_parts(graph_id, &nodes, &edges))
    }

    /// Facts, statistics and typed entities relevant to a requirement.
    pub async fn context_bundle(
        &self,
        graph_id: &str,
        requirement: &str,
        limit: usize,
    ) -> Result<ContextBundle, RetrievalError> {
        info!(graph_id, "fetching context bundle");
        let search = self
            .search(graph_id, requirement, limit, SearchScope::Edges)
            .await?;
        let nodes = self.list_nodes(graph_id).await?;
        let edges = self.list_edges(graph_id).await?;
        let graph_statistics = GraphStatistics::from_parts(graph_id, &nodes, &edges);

        let entities: Vec<EntityBrief> = nodes
            .iter()
            .filter_map(|n| {
                n.entity_type().map(|t| EntityBrief {
                    name: n.name.clone(),
                    entity_type: t.to_string(),
                    summary: n.summary.clone(),
                })
            })
            .collect();
        let total_entities = entities.len();

        Ok(ContextBundle {
            requirement: requirement.to_string(),
            related_facts: search.facts,
            graph_statistics,
            entities: entities.into_iter().take(limit).collect(),
            total_entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGraph, edge, node};

    fn retriever(graph: FakeGraph) -> GraphRetriever<FakeGraph> {
        GraphRetriever::new(graph, RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn falls_back_to_local_search() {
        let graph = FakeGraph::without_search()
            .with_edges(vec![
                edge("e1", "OPPOSES", "students oppose the tuition hike", "n1", "n2"),
                edge("e2", "MENTIONS", "weather is nice", "n1", "n2"),
            ]);
        let r = retriever(graph);
        let result = r
            .search("g", "tuition hike", 10, SearchScope::Edges)
            .await
            .unwrap();
        assert_eq!(result.facts, vec!["students oppose the tuition hike"]);
        // native search retried up to the attempt budget before falling back
        assert_eq!(r.backend().search_calls(), 3);
    }

    #[tokio::test]
    async fn native_search_used_when_available() {
        let graph = FakeGraph::default().with_search_facts(vec!["native fact".into()]);
        let r = retriever(graph);
        let result = r.search("g", "q", 5, SearchScope::Edges).await.unwrap();
        assert_eq!(result.facts, vec!["native fact"]);
        assert_eq!(r.backend().search_calls(), 1);
    }

    #[tokio::test]
    async fn list_failures_propagate_after_retries() {
        let r = retriever(FakeGraph::failing());
        let err = r.statistics("g").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Unavailable(_)));
        assert_eq!(r.backend().list_calls(), 3);
    }

    #[tokio::test]
    async fn entity_summary_collects_relations() {
        let graph = FakeGraph::without_search()
            .with_nodes(vec![
                node("n1", "Alice", &["Entity", "Student"], "protest leader"),
                node("n2", "Campus", &["Entity", "Place"], ""),
            ])
            .with_edges(vec![
                edge("e1", "LEADS", "alice leads the march", "n1", "n2"),
                edge("e2", "NEAR", "campus is near the river", "n2", "n3"),
            ]);
        let summary = retriever(graph).entity_summary("g", "alice").await.unwrap();
        assert_eq!(summary.entity_info.unwrap().uuid, "n1");
        assert_eq!(summary.total_relations, 1);
        assert_eq!(summary.related_facts, vec!["alice leads the march"]);
    }

    #[tokio::test]
    async fn context_bundle_filters_typed_entities() {
        let graph = FakeGraph::without_search()
            .with_nodes(vec![
                node("n1", "Alice", &["Entity", "Student"], "s"),
                node("n2", "Thing", &["Entity"], ""),
                node("n3", "Bob", &["Entity", "PublicFigure"], "p"),
            ])
            .with_edges(vec![edge("e1", "KNOWS", "alice knows bob", "n1", "n3")]);
        let bundle = retriever(graph)
            .context_bundle("g", "alice", 1)
            .await
            .unwrap();
        assert_eq!(bundle.total_entities, 2);
        assert_eq!(bundle.entities.len(), 1);
        assert_eq!(bundle.entities[0].entity_type, "Student");
        assert_eq!(bundle.graph_statistics.total_nodes, 3);
        assert_eq!(bundle.related_facts, vec!["alice knows bob"]);
    }

    #[tokio::test]
    async fn node_detail_finds_by_uuid() {
        let r = retriever(FakeGraph::without_search().with_nodes(vec![node(
            "n1",
            "Alice",
            &["Entity", "Student"],
            "protest leader",
        )]));
        assert_eq!(r.node_detail("n1").await.unwrap().unwrap().name, "Alice");
        assert!(r.node_detail("n9").await.unwrap().is_none());

        let offline = retriever(FakeGraph::failing());
        assert!(offline.node_detail("n1").await.is_err());
        assert_eq!(offline.backend().list_calls(), 3);
    }

    #[tokio::test]
    async fn entities_by_type_matches_label() {
        let graph = FakeGraph::without_search().with_nodes(vec![
            node("n1", "Alice", &["Entity", "Student"], ""),
            node("n2", "Bob", &["Entity", "PublicFigure"], ""),
        ]);
        let students = retriever(graph)
            .entities_by_type("g", "Student")
            .await
            .unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].name, "Alice");
    }
}
