//! Durable checkpoint storage for report jobs.
//!
//! Layout per job, under the store root:
//!
//! ```text
//! <id>/meta.json          job metadata (no outline, no document)
//! <id>/outline.json       planned outline
//! <id>/section_NN.md      top-level section record
//! <id>/section_NN_MM.md   subsection record
//! <id>/progress.json      latest progress snapshot
//! <id>/full_report.md     assembled document
//! ```
//!
//! Older jobs were written flat as `<id>.json` (whole job) plus `<id>.md`;
//! those are still readable, listable and deletable.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::report::{Outline, ProgressSnapshot, Report, ReportMeta, SectionRecord};

const META_FILE: &str = "meta.json";
const OUTLINE_FILE: &str = "outline.json";
const PROGRESS_FILE: &str = "progress.json";
const FULL_REPORT_FILE: &str = "full_report.md";

pub const DEFAULT_LIST_LIMIT: usize = 50;

pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn report_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn ensure_dir(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(ReportError::InvalidReportId(id.to_string()));
        }
        let dir = self.report_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn legacy_json(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn legacy_markdown(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.md"))
    }

    /// Temp file in the target directory, then rename over the target.
    fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        Self::write_atomic(path, json.as_bytes())
    }

    pub fn save_meta(&self, report: &Report) -> Result<()> {
        let dir = self.ensure_dir(&report.id)?;
        Self::write_json(&dir.join(META_FILE), &ReportMeta::from(report))?;
        debug!(report_id = %report.id, status = %report.status, "meta saved");
        Ok(())
    }

    pub fn save_outline(&self, id: &str, outline: &Outline) -> Result<()> {
        let dir = self.ensure_dir(id)?;
        Self::write_json(&dir.join(OUTLINE_FILE), outline)?;
        info!(report_id = id, sections = outline.sections.len(), "outline saved");
        Ok(())
    }

    /// Persist one section (`subsection_index` = None) or subsection record. Indexes are 1-based.
    pub fn save_section(
        &self,
        id: &str,
        section_index: usize,
        subsection_index: Option<usize>,
        title: &str,
        content: &str,
    ) -> Result<PathBuf> {
        let dir = self.ensure_dir(id)?;
        let (level, filename) = match subsection_index {
            Some(sub) => ("###", format!("section_{section_index:02}_{sub:02}.md")),
            None => ("##", format!("section_{section_index:02}.md")),
        };
        let mut record = format!("{level} {title}\n\n");
        if !content.is_empty() {
            record.push_str(content);
            record.push_str("\n\n");
        }
        let path = dir.join(&filename);
        Self::write_atomic(&path, record.as_bytes())?;
        info!(report_id = id, file = %filename, "section saved");
        Ok(path)
    }

    pub fn save_progress(&self, id: &str, progress: &ProgressSnapshot) -> Result<()> {
        let dir = self.ensure_dir(id)?;
        Self::write_json(&dir.join(PROGRESS_FILE), progress)
    }

    pub fn get_progress(&self, id: &str) -> Result<Option<ProgressSnapshot>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        match fs::read_to_string(self.report_dir(id).join(PROGRESS_FILE)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every persisted section record, a section before its subsections.
    pub fn sections(&self, id: &str) -> Result<Vec<SectionRecord>> {
        if !is_valid_id(id) {
            return Ok(Vec::new());
        }
        let entries = match fs::read_dir(self.report_dir(id)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            let Some((section_index, subsection_index)) = parse_section_filename(&filename) else {
                continue;
            };
            let content = fs::read_to_string(entry.path())?;
            records.push(SectionRecord {
                filename,
                section_index,
                subsection_index,
                content,
            });
        }
        records.sort_by_key(|r| (r.section_index, r.subsection_index.unwrap_or(0)));
        Ok(records)
    }

    /// Concatenate header and every persisted record into `full_report.md`.
    pub fn assemble(&self, id: &str, outline: &Outline) -> Result<String> {
        let mut doc = format!("# {}\n\n> {}\n\n---\n\n", outline.title, outline.summary);
        for record in self.sections(id)? {
            doc.push_str(&record.content);
        }
        let dir = self.ensure_dir(id)?;
        Self::write_atomic(&dir.join(FULL_REPORT_FILE), doc.as_bytes())?;
        info!(report_id = id, bytes = doc.len(), "report assembled");
        Ok(doc)
    }

    /// Meta, outline and (when present) the document.
    pub fn save_report(&self, report: &Report) -> Result<()> {
        self.save_meta(report)?;
        if let Some(outline) = &report.outline {
            self.save_outline(&report.id, outline)?;
        }
        if !report.markdown_content.is_empty() {
            let path = self.report_dir(&report.id).join(FULL_REPORT_FILE);
            Self::write_atomic(&path, report.markdown_content.as_bytes())?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Report>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let dir = self.report_dir(id);
        let meta_path = dir.join(META_FILE);
        if meta_path.is_file() {
            let mut report: Report = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
            if report.outline.is_none() {
                report.outline = read_optional(&dir.join(OUTLINE_FILE))?
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()?;
            }
            if report.markdown_content.is_empty() {
                report.markdown_content =
                    read_optional(&dir.join(FULL_REPORT_FILE))?.unwrap_or_default();
            }
            return Ok(Some(report));
        }

        let Some(raw) = read_optional(&self.legacy_json(id))? else {
            return Ok(None);
        };
        let mut report: Report = serde_json::from_str(&raw)?;
        if report.markdown_content.is_empty() {
            report.markdown_content = read_optional(&self.legacy_markdown(id))?.unwrap_or_default();
        }
        debug!(report_id = id, "loaded legacy report");
        Ok(Some(report))
    }

    /// Most recently created job for a simulation.
    pub fn get_by_simulation(&self, simulation_id: &str) -> Result<Option<Report>> {
        Ok(self.list(Some(simulation_id), 1)?.into_iter().next())
    }

    /// Jobs newest first, optionally for one simulation, capped at `limit`.
    pub fn list(&self, simulation_id: Option<&str>, limit: usize) -> Result<Vec<Report>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reports = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let id = if entry.path().is_dir() {
                name
            } else if let Some(stem) = name.strip_suffix(".json") {
                stem.to_string()
            } else {
                continue;
            };
            match self.get(&id) {
                Ok(Some(report)) => {
                    if simulation_id.is_none_or(|s| s == report.simulation_id) {
                        reports.push(report);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(entry = %id, "skipping unreadable report: {e}"),
            }
        }
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit);
        Ok(reports)
    }

    /// Remove every record for `id` in both layouts. True if anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        let mut deleted = false;
        let dir = self.report_dir(id);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
            deleted = true;
        }
        for path in [self.legacy_json(id), self.legacy_markdown(id)] {
            match fs::remove_file(&path) {
                Ok(()) => deleted = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if deleted {
            info!(report_id = id, "report deleted");
        }
        Ok(deleted)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Ids are single path components.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

/// `section_NN.md` → (NN, None); `section_NN_MM.md` → (NN, Some(MM)).
fn parse_section_filename(name: &str) -> Option<(usize, Option<usize>)> {
    let stem = name.strip_prefix("section_")?.strip_suffix(".md")?;
    let mut parts = stem.split('_');
    let section = parts.next()?.parse().ok()?;
    let sub = match parts.next() {
        Some(p) => Some(p.parse().ok()?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((section, sub))
}
