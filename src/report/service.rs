use tracing::info;

use super::ProgressCallback;
use super::agent::ReportAgent;
use super::chat::{ChatAgent, ChatReply, DEFAULT_CHAT_ROUNDS};
use super::model::{ProgressSnapshot, Report, SectionRecord};
use super::section::DEFAULT_MAX_TOOL_CALLS;
use crate::error::{ReportError, Result};
use crate::graph::{GraphBackend, GraphRetriever};
use crate::llm::{ChatModel, Message};
use crate::store::ReportStore;
use crate::tools::ToolDispatcher;

/// Caller-facing operations over one model, one graph backend and one store.
pub struct ReportService<M, B> {
    model: M,
    retriever: GraphRetriever<B>,
    store: ReportStore,
    max_tool_calls: usize,
    chat_rounds: usize,
}

impl<M: ChatModel, B: GraphBackend> ReportService<M, B> {
    pub fn new(model: M, retriever: GraphRetriever<B>, store: ReportStore) -> Self {
        Self {
            model,
            retriever,
            store,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            chat_rounds: DEFAULT_CHAT_ROUNDS,
        }
    }

    pub fn with_limits(mut self, max_tool_calls: usize, chat_rounds: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self.chat_rounds = chat_rounds;
        self
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Run a full job. The returned report carries a definitive status.
    pub async fn run_job(
        &self,
        simulation_id: &str,
        graph_id: &str,
        requirement: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Report {
        ReportAgent::new(&self.model, &self.retriever, &self.store)
            .with_max_tool_calls(self.max_tool_calls)
            .run(simulation_id, graph_id, requirement, progress)
            .await
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Report>> {
        self.store.get(id)
    }

    /// Like [`get_job`](Self::get_job), but a missing job is an error.
    pub fn require_job(&self, id: &str) -> Result<Report> {
        self.store
            .get(id)?
            .ok_or_else(|| ReportError::ReportNotFound(id.to_string()))
    }

    pub fn get_job_by_simulation(&self, simulation_id: &str) -> Result<Option<Report>> {
        self.store.get_by_simulation(simulation_id)
    }

    pub fn list_jobs(&self, simulation_id: Option<&str>, limit: usize) -> Result<Vec<Report>> {
        self.store.list(simulation_id, limit)
    }

    pub fn delete_job(&self, id: &str) -> Result<bool> {
        self.store.delete(id)
    }

    pub fn get_progress(&self, id: &str) -> Result<Option<ProgressSnapshot>> {
        self.store.get_progress(id)
    }

    pub fn get_sections(&self, id: &str) -> Result<Vec<SectionRecord>> {
        self.store.sections(id)
    }

    pub async fn converse(
        &self,
        graph_id: &str,
        requirement: &str,
        message: &str,
        history: &[Message],
    ) -> Result<ChatReply> {
        info!(graph_id, "conversation turn");
        let dispatcher = ToolDispatcher::new(&self.retriever, graph_id, requirement);
        let reply = ChatAgent::new(&self.model, &dispatcher)
            .with_max_rounds(self.chat_rounds)
            .converse(requirement, message, history)
            .await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportStatus;
    use crate::retry::RetryPolicy;
    use crate::test_support::{FakeGraph, ScriptedModel};
    use tempfile::TempDir;

    fn service(model: ScriptedModel, dir: &TempDir) -> ReportService<ScriptedModel, FakeGraph> {
        ReportService::new(
            model,
            GraphRetriever::new(FakeGraph::without_search(), RetryPolicy::immediate(1)),
            ReportStore::new(dir.path()),
        )
    }

    #[tokio::test]
    async fn job_lifecycle_through_service() {
        let dir = TempDir::new().unwrap();
        let model = ScriptedModel::new(vec![r#"{"title": "T", "summary": "S", "sections": [{"title": "Only"}]}"#])
            .with_fallback("Final Answer: content");
        let svc = service(model, &dir);

        let report = svc.run_job("sim_9", "g", "req", None).await;
        assert_eq!(report.status, ReportStatus::Completed);

        assert_eq!(svc.get_job(&report.id).unwrap().unwrap().id, report.id);
        assert_eq!(svc.get_job_by_simulation("sim_9").unwrap().unwrap().id, report.id);
        assert_eq!(svc.list_jobs(Some("sim_9"), 10).unwrap().len(), 1);
        assert_eq!(svc.get_sections(&report.id).unwrap().len(), 1);
        assert_eq!(svc.get_progress(&report.id).unwrap().unwrap().progress, 100);

        assert_eq!(svc.require_job(&report.id).unwrap().status, ReportStatus::Completed);
        assert!(svc.delete_job(&report.id).unwrap());
        assert!(svc.get_job(&report.id).unwrap().is_none());
        assert!(matches!(
            svc.require_job(&report.id),
            Err(ReportError::ReportNotFound(id)) if id == report.id
        ));
        assert!(!svc.delete_job(&report.id).unwrap());
        assert!(!svc.delete_job("report_nonexistent").unwrap());
    }

    #[tokio::test]
    async fn converse_returns_response_and_calls() {
        let dir = TempDir::new().unwrap();
        let model = ScriptedModel::new(vec![
            "[TOOL_CALL] get_graph_statistics()",
            "The graph is empty.",
        ]);
        let svc = service(model, &dir);
        let reply = svc
            .converse("g", "req", "How big is the graph?", &[])
            .await
            .unwrap();
        assert_eq!(reply.response, "The graph is empty.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert!(svc.list_jobs(None, 10).unwrap().is_empty());
    }
}
