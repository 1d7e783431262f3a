//! GraphScribe: analytical reports over a simulation's knowledge graph,
//! written section by section by a tool-using language model.

pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod report;
pub mod retry;
pub mod store;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use config::GraphScribeConfig;
pub use error::{ReportError, Result};
