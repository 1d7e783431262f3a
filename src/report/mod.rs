//! Report generation pipeline: planning, the per-section tool loop,
//! orchestration of a whole job, and conversational queries.

pub mod agent;
pub mod chat;
pub mod model;
pub mod planner;
pub mod section;
pub mod service;
pub mod status;

pub use agent::ReportAgent;
pub use chat::{ChatAgent, ChatReply};
pub use model::{
    Outline, ProgressSnapshot, Report, ReportMeta, Section, SectionRecord, Subsection,
};
pub use planner::OutlinePlanner;
pub use section::{SectionDraft, SectionGenerator};
pub use service::ReportService;
pub use status::ReportStatus;

/// Progress sink: (stage, percent, message).
pub type ProgressCallback<'a> = &'a (dyn Fn(&str, i32, &str) + Send + Sync);
