use serde_json::Value;
use tracing::{error, info, warn};

use super::ProgressCallback;
use super::model::{MAX_SECTIONS, MAX_SUBSECTIONS, Outline, Section, Subsection};
use crate::error::Result;
use crate::graph::{ContextBundle, GraphBackend, GraphRetriever};
use crate::llm::{ChatModel, Message};

const CONTEXT_LIMIT: usize = 30;
const PROMPT_FACTS: usize = 10;
const PLAN_TEMPERATURE: f32 = 0.3;

const PLAN_SYSTEM_PROMPT: &str = r#"You are an expert author of public-opinion simulation reports.
Plan a concise report outline from the simulation requirement and the knowledge-graph summary.

Limits:
- at most 5 top-level sections
- each section has 0 to 2 subsections

Focus on the 3-5 most relevant of: executive summary, simulation background,
key findings, sentiment analysis, recommendations.

Reply with JSON only:
{
  "title": "report title",
  "summary": "one-sentence summary",
  "sections": [
    {"title": "section title", "description": "what it covers",
     "subsections": [{"title": "subsection title", "description": "what it covers"}]}
  ]
}"#;

/// Turns a requirement and a graph summary into a bounded outline.
pub struct OutlinePlanner<'a, M> {
    model: &'a M,
}

impl<'a, M: ChatModel> OutlinePlanner<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Fetch context, then plan. Context failures propagate; model failures fall back.
    pub async fn plan<B: GraphBackend>(
        &self,
        retriever: &GraphRetriever<B>,
        graph_id: &str,
        requirement: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Outline> {
        info!(graph_id, "planning outline");
        emit(progress, 0, "Analyzing simulation requirement");

        let context = retriever
            .context_bundle(graph_id, requirement, CONTEXT_LIMIT)
            .await?;
        emit(progress, 30, "Generating report outline");

        let messages = [
            Message::system(PLAN_SYSTEM_PROMPT),
            Message::user(build_user_prompt(requirement, &context)),
        ];
        let outline = match self.model.chat_json(&messages, PLAN_TEMPERATURE).await {
            Ok(value) => {
                emit(progress, 80, "Parsing outline structure");
                outline_from_value(&value).unwrap_or_else(|| {
                    warn!("planner returned no usable sections, using default outline");
                    Outline::fallback()
                })
            }
            Err(e) => {
                error!("outline planning failed, using default outline: {e}");
                Outline::fallback()
            }
        };

        emit(progress, 100, "Outline planned");
        info!(sections = outline.sections.len(), "outline ready");
        Ok(outline)
    }
}

fn emit(progress: Option<ProgressCallback<'_>>, percent: i32, message: &str) {
    if let Some(cb) = progress {
        cb("planning", percent, message);
    }
}

fn build_user_prompt(requirement: &str, context: &ContextBundle) -> String {
    let stats = &context.graph_statistics;
    let entity_types: Vec<&str> = stats.entity_types.keys().map(String::as_str).collect();
    let facts: Vec<&String> = context.related_facts.iter().take(PROMPT_FACTS).collect();
    let facts_json = serde_json::to_string_pretty(&facts).unwrap_or_else(|_| "[]".into());
    format!(
        "Simulation requirement:\n{requirement}\n\n\
         Knowledge graph:\n\
         - total nodes: {}\n\
         - total edges: {}\n\
         - entity types: {}\n\
         - entities: {}\n\n\
         Related facts:\n{facts_json}\n\n\
         Plan the outline for this simulation. Remember: at most 5 sections.",
        stats.total_nodes,
        stats.total_edges,
        entity_types.join(", "),
        context.total_entities,
    )
}

fn text_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Title of a section entry given either as an object or a bare string.
fn entry_title(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()),
        _ => text_field(entry, "title"),
    }
}

/// Build a bounded outline. `None` if there are no sections at all.
pub fn outline_from_value(value: &Value) -> Option<Outline> {
    let raw_sections = value.get("sections")?.as_array()?;
    if raw_sections.is_empty() {
        return None;
    }
    let fallback = Outline::fallback();

    let sections = raw_sections
        .iter()
        .take(MAX_SECTIONS)
        .enumerate()
        .map(|(i, entry)| {
            let title = entry_title(entry)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Section {}", i + 1));
            let subsections = entry
                .get("subsections")
                .and_then(Value::as_array)
                .map(|subs| {
                    subs.iter()
                        .take(MAX_SUBSECTIONS)
                        .enumerate()
                        .map(|(j, sub)| {
                            Subsection::new(
                                entry_title(sub)
                                    .map(str::to_string)
                                    .unwrap_or_else(|| format!("Section {}.{}", i + 1, j + 1)),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            let mut section = Section::new(title);
            section.subsections = subsections;
            section
        })
        .collect();

    Some(Outline {
        title: text_field(value, "title")
            .map(str::to_string)
            .unwrap_or(fallback.title),
        summary: text_field(value, "summary")
            .map(str::to_string)
            .unwrap_or(fallback.summary),
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::llm::LlmError;
    use crate::retry::RetryPolicy;
    use crate::test_support::{FakeGraph, ScriptedModel, edge, node};
    use serde_json::json;
    use std::sync::Mutex;

    fn retriever(graph: FakeGraph) -> GraphRetriever<FakeGraph> {
        GraphRetriever::new(graph, RetryPolicy::immediate(1))
    }

    fn graph_with_facts(n: usize) -> FakeGraph {
        let edges = (0..n)
            .map(|i| edge(&format!("e{i}"), "SAYS", &format!("protest fact {i}"), "n1", "n2"))
            .collect();
        FakeGraph::without_search()
            .with_nodes(vec![node("n1", "Alice", &["Entity", "Student"], "")])
            .with_edges(edges)
    }

    #[test]
    fn oversized_outline_is_truncated_in_order() {
        let sections: Vec<Value> = (1..=8)
            .map(|i| {
                json!({
                    "title": format!("S{i}"),
                    "subsections": [{"title": "a"}, {"title": "b"}, {"title": "c"}, {"title": "d"}]
                })
            })
            .collect();
        let outline = outline_from_value(&json!({"title": "T", "summary": "S", "sections": sections}))
            .unwrap();
        assert!(outline.within_bounds());
        let titles: Vec<_> = outline.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["S1", "S2", "S3", "S4", "S5"]);
        let subs: Vec<_> = outline.sections[0]
            .subsections
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(subs, vec!["a", "b"]);
    }

    #[test]
    fn empty_or_missing_sections_yield_none() {
        assert!(outline_from_value(&json!({"title": "T", "sections": []})).is_none());
        assert!(outline_from_value(&json!({"title": "T"})).is_none());
        assert!(outline_from_value(&json!({"sections": "nope"})).is_none());
    }

    #[test]
    fn varied_candidates_stay_within_bounds() {
        let n_sections = |n: usize| -> Vec<Value> {
            (0..n).map(|i| json!({"title": format!("S{i}")})).collect()
        };
        let candidates = [
            (json!({"sections": n_sections(1)}), 1),
            (json!({"sections": n_sections(5)}), 5),
            (json!({"sections": n_sections(6)}), 5),
            (json!({"sections": [{"title": "A", "subsections": "not a list"}]}), 1),
            (json!({"sections": [{"title": "A", "subsections": {"title": "x"}}]}), 1),
            (json!({"sections": [{"title": "A", "subsections": ["x", "y", "z"]}]}), 1),
            (json!({"sections": ["one", "two", "three"]}), 3),
            (json!({"sections": ["a", {"subsections": ["b", "c", "d"]}, 7, null, {}, "f"]}), 5),
        ];
        for (candidate, expected) in candidates {
            let outline = outline_from_value(&candidate).unwrap();
            assert!(outline.within_bounds(), "{candidate}");
            assert_eq!(outline.sections.len(), expected, "{candidate}");
            assert!(outline.sections.iter().all(|s| !s.title.is_empty()), "{candidate}");
        }
    }

    #[test]
    fn blank_titles_get_positional_defaults() {
        let outline = outline_from_value(&json!({
            "title": "  ",
            "sections": [
                {"title": "", "subsections": [{"title": ""}, "Named"]},
                "Plain string section"
            ]
        }))
        .unwrap();
        assert_eq!(outline.title, "Simulation Analysis Report");
        assert_eq!(outline.summary, "Analysis report based on simulation results");
        assert_eq!(outline.sections[0].title, "Section 1");
        assert_eq!(outline.sections[0].subsections[0].title, "Section 1.1");
        assert_eq!(outline.sections[0].subsections[1].title, "Named");
        assert_eq!(outline.sections[1].title, "Plain string section");
        assert!(outline.sections[1].subsections.is_empty());
    }

    #[tokio::test]
    async fn model_failure_returns_default_outline() {
        let model = ScriptedModel::default();
        model.push_error(LlmError::ApiError {
            status: 500,
            message: "down".into(),
        });
        let outline = OutlinePlanner::new(&model)
            .plan(&retriever(graph_with_facts(2)), "g", "req", None)
            .await
            .unwrap();
        assert_eq!(outline, Outline::fallback());
    }

    #[tokio::test]
    async fn unparseable_reply_returns_default_outline() {
        let model = ScriptedModel::new(vec!["I cannot produce JSON today."]);
        let outline = OutlinePlanner::new(&model)
            .plan(&retriever(graph_with_facts(1)), "g", "req", None)
            .await
            .unwrap();
        assert_eq!(outline, Outline::fallback());
    }

    #[tokio::test]
    async fn planned_outline_is_parsed() {
        let model = ScriptedModel::new(vec![
            r#"```json
{"title": "Campus Report", "summary": "Students push back", "sections": [
  {"title": "Overview", "subsections": [{"title": "Timeline"}]},
  {"title": "Outlook"}
]}
```"#,
        ]);
        let outline = OutlinePlanner::new(&model)
            .plan(&retriever(graph_with_facts(1)), "g", "req", None)
            .await
            .unwrap();
        assert_eq!(outline.title, "Campus Report");
        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[0].subsections[0].title, "Timeline");
        assert_eq!(outline.unit_count(), 3);
    }

    #[tokio::test]
    async fn prompt_carries_at_most_ten_facts() {
        let model = ScriptedModel::new(vec![r#"{"sections": [{"title": "Only"}]}"#]);
        OutlinePlanner::new(&model)
            .plan(&retriever(graph_with_facts(15)), "g", "protest fact", None)
            .await
            .unwrap();
        let requests = model.requests();
        let user = &requests[0][1].content;
        assert!(user.contains("protest fact 9"));
        assert!(!user.contains("protest fact 10"));
        assert!(user.contains("entity types: Student"));
    }

    #[tokio::test]
    async fn context_failure_propagates() {
        let model = ScriptedModel::new(vec![]);
        let err = OutlinePlanner::new(&model)
            .plan(&retriever(FakeGraph::failing()), "g", "req", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Retrieval(_)));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn planning_progress_steps() {
        let model = ScriptedModel::new(vec![r#"{"sections": [{"title": "Only"}]}"#]);
        let seen = Mutex::new(Vec::new());
        let cb = |stage: &str, percent: i32, _msg: &str| {
            seen.lock().unwrap().push((stage.to_string(), percent));
        };
        OutlinePlanner::new(&model)
            .plan(&retriever(graph_with_facts(1)), "g", "req", Some(&cb))
            .await
            .unwrap();
        let percents: Vec<i32> = seen.into_inner().unwrap().into_iter().map(|(_, p)| p).collect();
        assert_eq!(percents, vec![0, 30, 80, 100]);
    }
}
