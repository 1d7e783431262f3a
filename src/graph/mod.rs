//! Knowledge-graph collaborators: the raw backend interface, the retrying
//! retriever layered on top of it, and the Zep HTTP implementation.

pub mod error;
pub mod local;
pub mod retriever;
pub mod types;
pub mod zep;

pub use error::RetrievalError;
pub use retriever::GraphRetriever;
pub use types::{
    ContextBundle, EdgeInfo, EntityBrief, EntitySummary, GraphStatistics, NodeInfo, SearchResult,
    SearchScope,
};
pub use zep::ZepClient;

use std::future::Future;

/// Read-only access to a knowledge graph.
#[allow(async_fn_in_trait)]
pub trait GraphBackend {
    /// Native semantic search. Backends without one return [`RetrievalError::Unavailable`].
    async fn search(
        &self,
        graph_id: &str,
        query: &str,
        limit: usize,
        scope: SearchScope,
    ) -> Result<SearchResult, RetrievalError>;

    async fn list_nodes(&self, graph_id: &str) -> Result<Vec<NodeInfo>, RetrievalError>;

    async fn list_edges(&self, graph_id: &str) -> Result<Vec<EdgeInfo>, RetrievalError>;

    async fn node_detail(&self, uuid: &str) -> Result<Option<NodeInfo>, RetrievalError>;
}

/// Write access used by activity ingestion. Futures are `Send` so workers can be spawned.
pub trait GraphWriter: Send + Sync {
    fn add_episode(
        &self,
        graph_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), RetrievalError>> + Send;
}
