//! Streams simulated agent activity into the knowledge graph as text episodes.

mod activity;
mod manager;
mod updater;

pub use activity::{AgentAction, AgentActivity};
pub use manager::GraphMemoryManager;
pub use updater::{ActivityUpdater, UpdaterSettings, UpdaterStats};
