use std::sync::atomic::{AtomicI32, Ordering};

use tracing::{error, info, warn};

use super::ProgressCallback;
use super::model::{ProgressSnapshot, Report};
use super::planner::OutlinePlanner;
use super::section::{DEFAULT_MAX_TOOL_CALLS, SectionGenerator};
use super::status::ReportStatus;
use crate::error::Result;
use crate::graph::{GraphBackend, GraphRetriever};
use crate::llm::ChatModel;
use crate::store::ReportStore;
use crate::tools::ToolDispatcher;

const PLANNING_END: i32 = 20;
const GENERATION_SPAN: i32 = 75;
const ASSEMBLING: i32 = 95;
const COMPLETE: i32 = 100;
const FAILED: i32 = -1;

/// Percent range `[start, end]` owned by generation unit `k` of `total`.
pub fn unit_span(k: usize, total: usize) -> (i32, i32) {
    let total = total.max(1) as i32;
    let k = k as i32;
    (
        PLANNING_END + GENERATION_SPAN * k / total,
        PLANNING_END + GENERATION_SPAN * (k + 1) / total,
    )
}

/// Clamps emitted percentages so they never decrease.
struct ProgressTracker<'a> {
    last: AtomicI32,
    sink: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: Option<ProgressCallback<'a>>) -> Self {
        Self {
            last: AtomicI32::new(0),
            sink,
        }
    }

    fn emit(&self, stage: &str, percent: i32, message: &str) -> i32 {
        let clamped = self.last.fetch_max(percent, Ordering::SeqCst).max(percent);
        if let Some(cb) = self.sink {
            cb(stage, clamped, message);
        }
        clamped
    }

    fn fail(&self, message: &str) {
        if let Some(cb) = self.sink {
            cb("failed", FAILED, message);
        }
    }
}

/// Drives one job: plan, generate every section in order, assemble.
pub struct ReportAgent<'a, M, B> {
    model: &'a M,
    retriever: &'a GraphRetriever<B>,
    store: &'a ReportStore,
    max_tool_calls: usize,
}

impl<'a, M: ChatModel, B: GraphBackend> ReportAgent<'a, M, B> {
    pub fn new(model: &'a M, retriever: &'a GraphRetriever<B>, store: &'a ReportStore) -> Self {
        Self {
            model,
            retriever,
            store,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
        }
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    /// Always returns the job; failures are recorded on it rather than raised.
    pub async fn run(
        &self,
        simulation_id: &str,
        graph_id: &str,
        requirement: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Report {
        let mut report = Report::new(simulation_id, graph_id, requirement);
        let tracker = ProgressTracker::new(progress);
        let mut completed = Vec::new();
        info!(report_id = %report.id, simulation_id, graph_id, "report job started");

        match self.drive(&mut report, &tracker, &mut completed).await {
            Ok(()) => {
                info!(report_id = %report.id, "report job completed");
            }
            Err(e) => {
                error!(report_id = %report.id, status = %report.status, "report job failed: {e}");
                report.fail(e.to_string());
                self.persist_failure(&report, &completed);
                tracker.fail(&format!("Report generation failed: {e}"));
            }
        }
        report
    }

    fn persist_failure(&self, report: &Report, completed: &[String]) {
        if let Err(e) = self.store.save_report(report) {
            warn!(report_id = %report.id, "could not persist failed report: {e}");
        }
        let mut snapshot = ProgressSnapshot::new(
            ReportStatus::Failed,
            FAILED,
            format!("Report generation failed: {}", report.error.as_deref().unwrap_or_default()),
        );
        snapshot.completed_sections = completed.to_vec();
        if let Err(e) = self.store.save_progress(&report.id, &snapshot) {
            warn!(report_id = %report.id, "could not persist failure progress: {e}");
        }
    }

    fn checkpoint(
        &self,
        report: &Report,
        tracker: &ProgressTracker<'_>,
        percent: i32,
        message: &str,
        current: Option<&str>,
        completed: &[String],
    ) -> Result<()> {
        let percent = tracker.emit(&report.status.to_string(), percent, message);
        let mut snapshot = ProgressSnapshot::new(report.status, percent, message);
        snapshot.current_section = current.map(str::to_string);
        snapshot.completed_sections = completed.to_vec();
        self.store.save_progress(&report.id, &snapshot)
    }

    async fn drive(
        &self,
        report: &mut Report,
        tracker: &ProgressTracker<'_>,
        completed: &mut Vec<String>,
    ) -> Result<()> {
        let report_id = report.id.clone();
        let graph_id = report.graph_id.clone();
        let requirement = report.requirement.clone();

        self.store.save_meta(report)?;
        self.checkpoint(report, tracker, 0, "Initializing report", None, completed)?;

        report.transition(ReportStatus::Planning)?;
        self.store.save_meta(report)?;
        self.checkpoint(report, tracker, 0, "Planning report outline", None, completed)?;

        let planning = |stage: &str, percent: i32, message: &str| {
            tracker.emit(stage, percent / 5, message);
        };
        let outline = OutlinePlanner::new(self.model)
            .plan(self.retriever, &graph_id, &requirement, Some(&planning))
            .await?;
        self.store.save_outline(&report_id, &outline)?;
        let plan = outline.clone();
        report.outline = Some(outline);
        self.store.save_meta(report)?;
        self.checkpoint(
            report,
            tracker,
            PLANNING_END,
            &format!("Outline planned with {} sections", plan.sections.len()),
            None,
            completed,
        )?;

        report.transition(ReportStatus::Generating)?;
        self.store.save_meta(report)?;

        let dispatcher = ToolDispatcher::new(self.retriever, &graph_id, &requirement);
        let generator =
            SectionGenerator::new(self.model, &dispatcher).with_max_tool_calls(self.max_tool_calls);
        let total_units = plan.unit_count();
        let total_sections = plan.sections.len();
        let mut unit = 0;
        let mut previous = String::new();

        for (i, planned) in plan.sections.iter().enumerate() {
            let (start, end) = unit_span(unit, total_units);
            self.checkpoint(
                report,
                tracker,
                start,
                &format!(
                    "Generating section: {} ({}/{total_sections})",
                    planned.title,
                    i + 1
                ),
                Some(&planned.title),
                completed,
            )?;
            let on_round = |stage: &str, percent: i32, message: &str| {
                tracker.emit(stage, start + (end - start) * percent / 100, message);
            };
            let draft = generator
                .generate(&plan, &requirement, &planned.title, &previous, Some(&on_round))
                .await?;
            self.store
                .save_section(&report_id, i + 1, None, &planned.title, &draft.content)?;
            previous.push_str(&format!("## {}\n\n{}\n\n", planned.title, draft.content));
            if let Some(section) = report.outline.as_mut().and_then(|o| o.sections.get_mut(i)) {
                section.fill(draft.content);
            }
            completed.push(planned.title.clone());
            unit += 1;
            self.checkpoint(
                report,
                tracker,
                end,
                &format!("Section {} done", planned.title),
                None,
                completed,
            )?;

            for (j, planned_sub) in planned.subsections.iter().enumerate() {
                let (start, end) = unit_span(unit, total_units);
                self.checkpoint(
                    report,
                    tracker,
                    start,
                    &format!("Generating subsection: {}", planned_sub.title),
                    Some(&planned_sub.title),
                    completed,
                )?;
                let on_round = |stage: &str, percent: i32, message: &str| {
                    tracker.emit(stage, start + (end - start) * percent / 100, message);
                };
                let draft = generator
                    .generate(&plan, &requirement, &planned_sub.title, &previous, Some(&on_round))
                    .await?;
                self.store.save_section(
                    &report_id,
                    i + 1,
                    Some(j + 1),
                    &planned_sub.title,
                    &draft.content,
                )?;
                previous.push_str(&format!("### {}\n\n{}\n\n", planned_sub.title, draft.content));
                if let Some(sub) = report
                    .outline
                    .as_mut()
                    .and_then(|o| o.sections.get_mut(i))
                    .and_then(|s| s.subsections.get_mut(j))
                {
                    sub.fill(draft.content);
                }
                completed.push(format!("{} / {}", planned.title, planned_sub.title));
                unit += 1;
                self.checkpoint(
                    report,
                    tracker,
                    end,
                    &format!("Subsection {} done", planned_sub.title),
                    None,
                    completed,
                )?;
            }
        }

        self.checkpoint(report, tracker, ASSEMBLING, "Assembling full report", None, completed)?;
        let markdown = self.store.assemble(&report_id, &plan)?;
        report.complete(markdown)?;
        self.store.save_report(report)?;
        self.checkpoint(report, tracker, COMPLETE, "Report complete", None, completed)?;
        Ok(())
    }
}
