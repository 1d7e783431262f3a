use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::ReportStatus;
use crate::error::{ReportError, Result};

/// Hard bound on top-level sections in an outline.
pub const MAX_SECTIONS: usize = 5;
/// Hard bound on subsections under one section.
pub const MAX_SUBSECTIONS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    pub title: String,
    #[serde(default)]
    content: String,
}

impl Subsection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Write the generated content once. Returns false if already filled.
    pub fn fill(&mut self, content: impl Into<String>) -> bool {
        fill_once(&mut self.content, content.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_subsections(mut self, titles: &[&str]) -> Self {
        self.subsections = titles.iter().map(|t| Subsection::new(*t)).collect();
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Write the generated content once. Returns false if already filled.
    pub fn fill(&mut self, content: impl Into<String>) -> bool {
        fill_once(&mut self.content, content.into())
    }
}

fn fill_once(slot: &mut String, content: String) -> bool {
    if !slot.is_empty() {
        return false;
    }
    *slot = content;
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub summary: String,
    pub sections: Vec<Section>,
}

impl Outline {
    /// Deterministic outline used whenever planning cannot produce one.
    pub fn fallback() -> Self {
        Self {
            title: "Simulation Analysis Report".into(),
            summary: "Analysis report based on simulation results".into(),
            sections: [
                "Executive Summary",
                "Background & Setup",
                "Key Findings & Trends",
                "Sentiment Evolution",
                "Conclusions & Recommendations",
            ]
            .into_iter()
            .map(Section::new)
            .collect(),
        }
    }

    /// Sections plus subsections: the number of generator runs a job needs.
    pub fn unit_count(&self) -> usize {
        self.sections.iter().map(|s| 1 + s.subsections.len()).sum()
    }

    pub fn within_bounds(&self) -> bool {
        (1..=MAX_SECTIONS).contains(&self.sections.len())
            && self
                .sections
                .iter()
                .all(|s| s.subsections.len() <= MAX_SUBSECTIONS)
    }
}

/// One report generation job.
///
/// Field names follow the on-disk JSON so flat legacy files load directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "report_id")]
    pub id: String,
    pub simulation_id: String,
    pub graph_id: String,
    #[serde(rename = "simulation_requirement")]
    pub requirement: String,
    pub status: ReportStatus,
    #[serde(default)]
    pub status_history: Vec<ReportStatus>,
    #[serde(default)]
    pub outline: Option<Outline>,
    #[serde(default)]
    pub markdown_content: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Report {
    pub fn new(
        simulation_id: impl Into<String>,
        graph_id: impl Into<String>,
        requirement: impl Into<String>,
    ) -> Self {
        Self {
            id: new_report_id(),
            simulation_id: simulation_id.into(),
            graph_id: graph_id.into(),
            requirement: requirement.into(),
            status: ReportStatus::Pending,
            status_history: vec![ReportStatus::Pending],
            outline: None,
            markdown_content: String::new(),
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Move to `to`, rejecting backward or skipping moves.
    pub fn transition(&mut self, to: ReportStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(ReportError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.status_history.push(to);
        Ok(())
    }

    /// Record the error and move to `Failed` unless already terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = ReportStatus::Failed;
            self.status_history.push(ReportStatus::Failed);
        }
        self.error = Some(error.into());
    }

    pub fn complete(&mut self, markdown: String) -> Result<()> {
        self.transition(ReportStatus::Completed)?;
        self.markdown_content = markdown;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// `report_` followed by 12 hex characters.
pub fn new_report_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("report_{}", &hex[..12])
}

/// Borrowed view of a report without its outline and document, as kept in `meta.json`.
#[derive(Debug, Serialize)]
pub struct ReportMeta<'a> {
    pub report_id: &'a str,
    pub simulation_id: &'a str,
    pub graph_id: &'a str,
    pub simulation_requirement: &'a str,
    pub status: ReportStatus,
    pub status_history: &'a [ReportStatus],
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<&'a str>,
}

impl<'a> From<&'a Report> for ReportMeta<'a> {
    fn from(r: &'a Report) -> Self {
        Self {
            report_id: &r.id,
            simulation_id: &r.simulation_id,
            graph_id: &r.graph_id,
            simulation_requirement: &r.requirement,
            status: r.status,
            status_history: &r.status_history,
            created_at: r.created_at,
            completed_at: r.completed_at,
            error: r.error.as_deref(),
        }
    }
}

/// Readable progress of a running or finished job. `progress` is -1 after a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: ReportStatus,
    pub progress: i32,
    pub message: String,
    #[serde(default)]
    pub current_section: Option<String>,
    #[serde(default)]
    pub completed_sections: Vec<String>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    pub fn new(status: ReportStatus, progress: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            progress,
            message: message.into(),
            current_section: None,
            completed_sections: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// A persisted section or subsection file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub filename: String,
    /// 1-based index of the top-level section.
    pub section_index: usize,
    /// 1-based subsection index, absent for a top-level record.
    pub subsection_index: Option<usize>,
    pub content: String,
}

impl SectionRecord {
    pub fn is_subsection(&self) -> bool {
        self.subsection_index.is_some()
    }
}

/// Timestamps are written as RFC 3339. Naive ISO strings (assumed UTC) and,
/// for optional fields, empty strings are accepted on read.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|n| n.and_utc())
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod optional {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_str(&dt.to_rfc3339()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {raw}"))
                }),
            }
        }
    }
}
