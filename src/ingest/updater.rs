use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::activity::AgentActivity;
use crate::graph::GraphWriter;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    /// Minimum spacing between two sends.
    pub send_interval: Duration,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdaterStats {
    pub graph_id: String,
    pub total_activities: u64,
    pub total_sent: u64,
    pub failed_count: u64,
    pub queue_size: u64,
    pub running: bool,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

/// Streams agent activities into one graph from a background task.
pub struct ActivityUpdater {
    graph_id: String,
    sender: Mutex<Option<mpsc::Sender<AgentActivity>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl ActivityUpdater {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start<W: GraphWriter + 'static>(
        graph_id: impl Into<String>,
        writer: Arc<W>,
        settings: UpdaterSettings,
    ) -> Self {
        let graph_id = graph_id.into();
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let handle = tokio::spawn(run_worker(
            graph_id.clone(),
            writer,
            rx,
            settings,
            Arc::clone(&counters),
        ));
        info!(graph_id = %graph_id, "activity updater started");
        Self {
            graph_id,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            counters,
        }
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    fn sender(&self) -> Option<mpsc::Sender<AgentActivity>> {
        self.sender.lock().ok().and_then(|s| s.clone())
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Queue an activity, waiting while the queue is full.
    /// Returns false for no-op activities or a stopped updater.
    pub async fn add_activity(&self, activity: AgentActivity) -> bool {
        if activity.action.is_noop() {
            return false;
        }
        let Some(tx) = self.sender() else {
            warn!(graph_id = %self.graph_id, "updater stopped, dropping activity");
            return false;
        };
        if tx.send(activity).await.is_err() {
            return false;
        }
        self.counters.total.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Parse and queue one line of an actions log.
    pub async fn add_line(&self, line: &str, platform: &str) -> Result<bool, serde_json::Error> {
        match AgentActivity::from_json_line(line, platform)? {
            Some(activity) => Ok(self.add_activity(activity).await),
            None => Ok(false),
        }
    }

    pub fn stats(&self) -> UpdaterStats {
        let total = self.counters.total.load(Ordering::SeqCst);
        let sent = self.counters.sent.load(Ordering::SeqCst);
        let failed = self.counters.failed.load(Ordering::SeqCst);
        UpdaterStats {
            graph_id: self.graph_id.clone(),
            total_activities: total,
            total_sent: sent,
            failed_count: failed,
            queue_size: total.saturating_sub(sent + failed),
            running: self.is_running(),
        }
    }

    /// Close the queue, let the worker send everything still queued, then join it.
    pub async fn stop(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        drop(sender);
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(graph_id = %self.graph_id, "updater worker panicked: {e}");
            }
            let stats = self.stats();
            info!(
                graph_id = %self.graph_id,
                total = stats.total_activities,
                sent = stats.total_sent,
                failed = stats.failed_count,
                "activity updater stopped"
            );
        }
    }
}

async fn run_worker<W: GraphWriter>(
    graph_id: String,
    writer: Arc<W>,
    mut rx: mpsc::Receiver<AgentActivity>,
    settings: UpdaterSettings,
    counters: Arc<Counters>,
) {
    let writer = &*writer;
    while let Some(activity) = rx.recv().await {
        let text = activity.to_episode_text();
        let (graph, episode) = (graph_id.as_str(), text.as_str());
        let result = settings
            .retry
            .run("add_episode", move || writer.add_episode(graph, episode))
            .await;
        match result {
            Ok(()) => {
                counters.sent.fetch_add(1, Ordering::SeqCst);
                debug!(graph_id = %graph_id, episode = %text, "activity sent");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(graph_id = %graph_id, "dropping activity after retries: {e}");
            }
        }
        if !settings.send_interval.is_zero() {
            sleep(settings.send_interval).await;
        }
    }
    debug!(graph_id = %graph_id, "activity queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::AgentAction;
    use crate::test_support::RecordingWriter;

    fn settings(attempts: u32) -> UpdaterSettings {
        UpdaterSettings {
            send_interval: Duration::ZERO,
            retry: RetryPolicy::immediate(attempts),
            queue_capacity: 2,
        }
    }

    fn post(name: &str, content: &str) -> AgentActivity {
        AgentActivity {
            platform: "twitter".into(),
            agent_id: 1,
            agent_name: name.into(),
            action: AgentAction::CreatePost {
                content: Some(content.into()),
            },
            round: 1,
            timestamp: "2024-05-01T10:00:00".into(),
        }
    }

    #[tokio::test]
    async fn stop_drains_every_queued_activity() {
        let writer = Arc::new(RecordingWriter::default());
        let updater = ActivityUpdater::start("g1", Arc::clone(&writer), settings(1));
        for i in 0..10 {
            assert!(updater.add_activity(post("Alice", &format!("post {i}"))).await);
        }
        updater.stop().await;

        let episodes = writer.episodes();
        assert_eq!(episodes.len(), 10);
        assert_eq!(episodes[0], ("g1".to_string(), "Alice: published a post: \"post 0\"".to_string()));
        assert_eq!(episodes[9].1, "Alice: published a post: \"post 9\"");

        let stats = updater.stats();
        assert_eq!(stats.total_activities, 10);
        assert_eq!(stats.total_sent, 10);
        assert_eq!(stats.queue_size, 0);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn do_nothing_is_skipped() {
        let writer = Arc::new(RecordingWriter::default());
        let updater = ActivityUpdater::start("g1", Arc::clone(&writer), settings(1));
        let mut idle = post("Bob", "x");
        idle.action = AgentAction::DoNothing;
        assert!(!updater.add_activity(idle).await);
        assert!(
            !updater
                .add_line(r#"{"event_type": "simulation_end"}"#, "twitter")
                .await
                .unwrap()
        );
        updater.stop().await;
        assert_eq!(updater.stats().total_activities, 0);
        assert_eq!(writer.calls(), 0);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let writer = Arc::new(RecordingWriter::failing_first(2));
        let updater = ActivityUpdater::start("g1", Arc::clone(&writer), settings(3));
        updater.add_activity(post("Alice", "hello")).await;
        updater.stop().await;
        assert_eq!(writer.calls(), 3);
        assert_eq!(updater.stats().total_sent, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_count_as_failed() {
        let writer = Arc::new(RecordingWriter::failing_first(5));
        let updater = ActivityUpdater::start("g1", Arc::clone(&writer), settings(2));
        updater.add_activity(post("Alice", "a")).await;
        updater.add_activity(post("Alice", "b")).await;
        updater.stop().await;
        let stats = updater.stats();
        assert_eq!(stats.failed_count, 2);
        assert_eq!(stats.total_sent, 0);
        assert_eq!(writer.calls(), 4);
    }

    #[tokio::test]
    async fn stopped_updater_rejects_activities() {
        let writer = Arc::new(RecordingWriter::default());
        let updater = ActivityUpdater::start("g1", writer, settings(1));
        updater.stop().await;
        assert!(!updater.add_activity(post("Alice", "late")).await);
        // second stop is a no-op
        updater.stop().await;
    }
}
