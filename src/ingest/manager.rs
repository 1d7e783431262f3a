use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::updater::{ActivityUpdater, UpdaterSettings, UpdaterStats};
use crate::graph::GraphWriter;

/// Owns at most one running updater per simulation.
pub struct GraphMemoryManager<W> {
    writer: Arc<W>,
    settings: UpdaterSettings,
    updaters: Mutex<HashMap<String, Arc<ActivityUpdater>>>,
}

impl<W: GraphWriter + 'static> GraphMemoryManager<W> {
    pub fn new(writer: Arc<W>, settings: UpdaterSettings) -> Self {
        Self {
            writer,
            settings,
            updaters: Mutex::new(HashMap::new()),
        }
    }

    /// Start an updater for `simulation_id`, stopping any previous one.
    pub async fn create_updater(&self, simulation_id: &str, graph_id: &str) -> Arc<ActivityUpdater> {
        let updater = Arc::new(ActivityUpdater::start(
            graph_id,
            Arc::clone(&self.writer),
            self.settings.clone(),
        ));
        let previous = self
            .updaters
            .lock()
            .await
            .insert(simulation_id.to_string(), Arc::clone(&updater));
        if let Some(old) = previous {
            info!(simulation_id, "replacing existing activity updater");
            old.stop().await;
        }
        updater
    }

    pub async fn get_updater(&self, simulation_id: &str) -> Option<Arc<ActivityUpdater>> {
        self.updaters.lock().await.get(simulation_id).cloned()
    }

    /// Stop and forget the updater. Returns false when none was registered.
    pub async fn stop_updater(&self, simulation_id: &str) -> bool {
        let removed = self.updaters.lock().await.remove(simulation_id);
        match removed {
            Some(updater) => {
                updater.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<_> = self.updaters.lock().await.drain().collect();
        for (simulation_id, updater) in drained {
            info!(simulation_id, "stopping activity updater");
            updater.stop().await;
        }
    }

    pub async fn all_stats(&self) -> BTreeMap<String, UpdaterStats> {
        self.updaters
            .lock()
            .await
            .iter()
            .map(|(id, updater)| (id.clone(), updater.stats()))
            .collect()
    }
}
