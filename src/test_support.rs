//! In-crate test doubles for the graph, model and writer collaborators.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Map;

use crate::graph::{
    EdgeInfo, GraphBackend, GraphWriter, NodeInfo, RetrievalError, SearchResult, SearchScope,
};
use crate::llm::{ChatModel, LlmError, Message};

pub fn node(uuid: &str, name: &str, labels: &[&str], summary: &str) -> NodeInfo {
    NodeInfo {
        uuid: uuid.into(),
        name: name.into(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        summary: summary.into(),
        attributes: Map::new(),
    }
}

pub fn edge(uuid: &str, name: &str, fact: &str, source: &str, target: &str) -> EdgeInfo {
    EdgeInfo {
        uuid: uuid.into(),
        name: name.into(),
        fact: fact.into(),
        source_node_uuid: source.into(),
        target_node_uuid: target.into(),
    }
}

/// In-memory graph. Native search returns the scripted facts unless disabled.
#[derive(Default)]
pub struct FakeGraph {
    nodes: Vec<NodeInfo>,
    edges: Vec<EdgeInfo>,
    search_facts: Vec<String>,
    search_unavailable: bool,
    lists_fail: bool,
    search_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeGraph {
    pub fn without_search() -> Self {
        Self {
            search_unavailable: true,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            search_unavailable: true,
            lists_fail: true,
            ..Default::default()
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeInfo>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_edges(mut self, edges: Vec<EdgeInfo>) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_search_facts(mut self, facts: Vec<String>) -> Self {
        self.search_facts = facts;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_lists(&self) -> Result<(), RetrievalError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.lists_fail {
            Err(RetrievalError::Unavailable("graph offline".into()))
        } else {
            Ok(())
        }
    }
}

impl GraphBackend for FakeGraph {
    async fn search(
        &self,
        _graph_id: &str,
        query: &str,
        _limit: usize,
        _scope: SearchScope,
    ) -> Result<SearchResult, RetrievalError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.search_unavailable {
            return Err(RetrievalError::Unavailable("search".into()));
        }
        Ok(SearchResult {
            facts: self.search_facts.clone(),
            query: query.to_string(),
            ..Default::default()
        })
    }

    async fn list_nodes(&self, _graph_id: &str) -> Result<Vec<NodeInfo>, RetrievalError> {
        self.check_lists()?;
        Ok(self.nodes.clone())
    }

    async fn list_edges(&self, _graph_id: &str) -> Result<Vec<EdgeInfo>, RetrievalError> {
        self.check_lists()?;
        Ok(self.edges.clone())
    }

    async fn node_detail(&self, uuid: &str) -> Result<Option<NodeInfo>, RetrievalError> {
        self.check_lists()?;
        Ok(self.nodes.iter().find(|n| n.uuid == uuid).cloned())
    }
}

/// Chat model that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            ..Default::default()
        }
    }

    /// Reply used once the queue is empty.
    pub fn with_fallback(mut self, reply: &str) -> Self {
        self.fallback = Some(reply.to_string());
        self
    }

    pub fn push_error(&self, err: LlmError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        messages: &[Message],
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => self.fallback.clone().ok_or_else(|| LlmError::ApiError {
                status: 500,
                message: "script exhausted".into(),
            }),
        }
    }
}

/// Writer that records episodes and fails the first `fail_first` calls.
#[derive(Default)]
pub struct RecordingWriter {
    episodes: Mutex<Vec<(String, String)>>,
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

impl RecordingWriter {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: AtomicUsize::new(n),
            ..Default::default()
        }
    }

    pub fn episodes(&self) -> Vec<(String, String)> {
        self.episodes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GraphWriter for RecordingWriter {
    async fn add_episode(&self, graph_id: &str, text: &str) -> Result<(), RetrievalError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first.load(Ordering::SeqCst) {
            return Err(RetrievalError::Unavailable("writer".into()));
        }
        self.episodes
            .lock()
            .unwrap()
            .push((graph_id.to_string(), text.to_string()));
        Ok(())
    }
}
