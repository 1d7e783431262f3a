use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a report job.
///
/// Each job flows through: PENDING → PLANNING → GENERATING → COMPLETED,
/// and may drop to FAILED from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Planning,
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "pending"),
            ReportStatus::Planning => write!(f, "planning"),
            ReportStatus::Generating => write!(f, "generating"),
            ReportStatus::Completed => write!(f, "completed"),
            ReportStatus::Failed => write!(f, "failed"),
        }
    }
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }

    /// The single successor on the success path, if any.
    pub fn next(&self) -> Option<ReportStatus> {
        match self {
            ReportStatus::Pending => Some(ReportStatus::Planning),
            ReportStatus::Planning => Some(ReportStatus::Generating),
            ReportStatus::Generating => Some(ReportStatus::Completed),
            ReportStatus::Completed | ReportStatus::Failed => None,
        }
    }

    /// Forward moves only: the next state, or `Failed` from any non-terminal state.
    pub fn can_transition_to(&self, to: ReportStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == ReportStatus::Failed || self.next() == Some(to)
    }
}
