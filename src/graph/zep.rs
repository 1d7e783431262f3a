//! HTTP client for a Zep-style graph API.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::types::{EdgeInfo, NodeInfo, SearchResult, SearchScope};
use super::{GraphBackend, GraphWriter, RetrievalError};

pub const DEFAULT_BASE_URL: &str = "https://api.getzep.com/api/v2";

pub struct ZepClient {
    api_key: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    graph_id: &'a str,
    query: &'a str,
    limit: usize,
    scope: &'a str,
    reranker: &'a str,
}

#[derive(Debug, Serialize)]
struct EpisodeRequest<'a> {
    graph_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    edges: Option<Vec<ZepEdge>>,
    #[serde(default)]
    nodes: Option<Vec<ZepNode>>,
}

#[derive(Debug, Deserialize)]
struct ZepNode {
    #[serde(alias = "uuid_")]
    uuid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
}

impl From<ZepNode> for NodeInfo {
    fn from(n: ZepNode) -> Self {
        NodeInfo {
            uuid: n.uuid,
            name: n.name.unwrap_or_default(),
            labels: n.labels.unwrap_or_default(),
            summary: n.summary.unwrap_or_default(),
            attributes: n.attributes.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZepEdge {
    #[serde(alias = "uuid_")]
    uuid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fact: Option<String>,
    #[serde(default)]
    source_node_uuid: Option<String>,
    #[serde(default)]
    target_node_uuid: Option<String>,
}

impl From<ZepEdge> for EdgeInfo {
    fn from(e: ZepEdge) -> Self {
        EdgeInfo {
            uuid: e.uuid,
            name: e.name.unwrap_or_default(),
            fact: e.fact.unwrap_or_default(),
            source_node_uuid: e.source_node_uuid.unwrap_or_default(),
            target_node_uuid: e.target_node_uuid.unwrap_or_default(),
        }
    }
}

impl ZepClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Api-Key {}", self.api_key)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, RetrievalError> {
        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", self.auth())
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, RetrievalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(RetrievalError::Api {
        status: status.as_u16(),
        message,
    })
}

impl GraphBackend for ZepClient {
    async fn search(
        &self,
        graph_id: &str,
        query: &str,
        limit: usize,
        scope: SearchScope,
    ) -> Result<SearchResult, RetrievalError> {
        let body = SearchRequest {
            graph_id,
            query,
            limit,
            scope: scope.as_str(),
            reranker: "cross_encoder",
        };
        let response = self
            .client
            .post(self.url("graph/search"))
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await?;
        let raw: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;

        let mut result = SearchResult {
            query: query.to_string(),
            ..Default::default()
        };
        for edge in raw.edges.unwrap_or_default().into_iter().map(EdgeInfo::from) {
            if !edge.fact.is_empty() {
                result.facts.push(edge.fact.clone());
            }
            result.edges.push(edge);
        }
        for node in raw.nodes.unwrap_or_default().into_iter().map(NodeInfo::from) {
            if !node.summary.is_empty() {
                result.facts.push(format!("[{}]: {}", node.name, node.summary));
            }
            result.nodes.push(node);
        }
        debug!(graph_id, facts = result.total_count(), "native search");
        Ok(result)
    }

    async fn list_nodes(&self, graph_id: &str) -> Result<Vec<NodeInfo>, RetrievalError> {
        let nodes: Vec<ZepNode> = self.get_json(&format!("graph/node/graph/{graph_id}")).await?;
        Ok(nodes.into_iter().map(NodeInfo::from).collect())
    }

    async fn list_edges(&self, graph_id: &str) -> Result<Vec<EdgeInfo>, RetrievalError> {
        let edges: Vec<ZepEdge> = self.get_json(&format!("graph/edge/graph/{graph_id}")).await?;
        Ok(edges.into_iter().map(EdgeInfo::from).collect())
    }

    async fn node_detail(&self, uuid: &str) -> Result<Option<NodeInfo>, RetrievalError> {
        match self.get_json::<ZepNode>(&format!("graph/node/{uuid}")).await {
            Ok(node) => Ok(Some(node.into())),
            Err(RetrievalError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl GraphWriter for ZepClient {
    async fn add_episode(&self, graph_id: &str, text: &str) -> Result<(), RetrievalError> {
        let body = EpisodeRequest {
            graph_id,
            kind: "text",
            data: text,
        };
        let response = self
            .client
            .post(self.url("graph"))
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
