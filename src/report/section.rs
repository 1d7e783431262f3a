//! Per-section think/act/observe loop.
//!
//! Each round the model either finishes with `Final Answer:`, asks for tools,
//! or does neither. Tool executions are capped per section; the round count is
//! capped at the tool budget plus two, after which one last round forbids tools.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::ProgressCallback;
use super::model::Outline;
use crate::graph::GraphBackend;
use crate::llm::{ChatModel, LlmError, Message};
use crate::tools::{ToolCall, ToolDispatcher, parse_tool_calls, tools_description};

pub const DEFAULT_MAX_TOOL_CALLS: usize = 5;
pub const FINAL_MARKER: &str = "Final Answer:";

const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 4096;
const PREVIOUS_EXCERPT_CHARS: usize = 2000;

const FINALIZE_PROMPT: &str =
    "Based on the information gathered so far, write `Final Answer:` followed by the section content.";
const CONTINUE_PROMPT: &str = "Continue reasoning, or write `Final Answer:` followed by the section content.";
const BUDGET_SPENT_PROMPT: &str =
    "The tool budget for this section is spent. Do not call tools again. Write `Final Answer:` followed by the section content now.";
const FORCE_FINAL_PROMPT: &str =
    "The round limit is reached. Stop using tools and write `Final Answer:` followed by the section content.";

/// Generated section text and the tool calls that were actually executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionDraft {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Text after the last final marker, trimmed.
pub fn final_answer(reply: &str) -> Option<&str> {
    reply
        .rsplit_once(FINAL_MARKER)
        .map(|(_, answer)| answer.trim())
}

pub struct SectionGenerator<'a, M, B> {
    model: &'a M,
    dispatcher: &'a ToolDispatcher<'a, B>,
    max_tool_calls: usize,
}

impl<'a, M: ChatModel, B: GraphBackend> SectionGenerator<'a, M, B> {
    pub fn new(model: &'a M, dispatcher: &'a ToolDispatcher<'a, B>) -> Self {
        Self {
            model,
            dispatcher,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
        }
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_tool_calls + 2
    }

    fn system_prompt(&self, outline: &Outline, requirement: &str, title: &str) -> String {
        format!(
            "You are an expert author of public-opinion simulation reports, writing one section.\n\n\
             Report title: {}\n\
             Report summary: {}\n\
             Simulation requirement: {requirement}\n\n\
             Section to write: {title}\n\n\
             You may call the tools below, at most {} times in total:\n\n{}\n\n\
             Work in this format:\n\
             Thought: what information the section still needs\n\
             Action: a tool call, written as\n\
             <tool_call>\n{{\"name\": \"tool_name\", \"parameters\": {{\"param\": \"value\"}}}}\n</tool_call>\n\n\
             Once you have enough information, write:\n\
             {FINAL_MARKER}\n\
             [the complete section in Markdown]\n\n\
             Cite concrete facts, keep continuity with earlier sections, \
             and do not repeat what they already cover.",
            outline.title,
            outline.summary,
            self.max_tool_calls,
            tools_description(),
        )
    }

    /// Run the loop for one section. Only model transport errors escape.
    pub async fn generate(
        &self,
        outline: &Outline,
        requirement: &str,
        title: &str,
        previous: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<SectionDraft, LlmError> {
        info!(section = title, "generating section");
        let excerpt: String = if previous.is_empty() {
            "(this is the first section)".to_string()
        } else {
            previous.chars().take(PREVIOUS_EXCERPT_CHARS).collect()
        };
        let mut messages = vec![
            Message::system(self.system_prompt(outline, requirement, title)),
            Message::user(format!(
                "Sections written so far:\n{excerpt}\n\nNow write the section: {title}\n\n\
                 Think about what you need, gather it with tools, then write the content."
            )),
        ];

        let max_rounds = self.max_rounds();
        let mut executed: Vec<ToolCall> = Vec::new();

        for round in 0..max_rounds {
            if let Some(cb) = progress {
                cb(
                    "generating",
                    (round * 100 / max_rounds) as i32,
                    &format!(
                        "Thinking and acting ({}/{})",
                        executed.len(),
                        self.max_tool_calls
                    ),
                );
            }

            let reply = self.model.chat(&messages, TEMPERATURE, MAX_TOKENS).await?;
            debug!(round, chars = reply.len(), "model reply");

            if let Some(answer) = final_answer(&reply) {
                info!(section = title, tool_calls = executed.len(), "section complete");
                return Ok(SectionDraft {
                    content: answer.to_string(),
                    tool_calls: executed,
                });
            }

            let calls = parse_tool_calls(&reply);
            messages.push(Message::assistant(reply));

            if calls.is_empty() {
                messages.push(Message::user(FINALIZE_PROMPT));
                continue;
            }

            let mut observations = Vec::new();
            for call in calls {
                if executed.len() >= self.max_tool_calls {
                    debug!(tool = %call.name, "tool budget spent, skipping call");
                    continue;
                }
                let result = self.dispatcher.execute(&call).await;
                observations.push(format!("Tool {} returned:\n{}", call.name, result.render()));
                executed.push(call);
            }

            let body = if observations.is_empty() {
                "(no tools executed)".to_string()
            } else {
                observations.join("\n\n")
            };
            let tail = if executed.len() >= self.max_tool_calls {
                BUDGET_SPENT_PROMPT
            } else {
                CONTINUE_PROMPT
            };
            messages.push(Message::user(format!("Observation:\n{body}\n\n{tail}")));
        }

        warn!(section = title, max_rounds, "round limit reached, forcing final answer");
        messages.push(Message::user(FORCE_FINAL_PROMPT));
        let reply = self.model.chat(&messages, TEMPERATURE, MAX_TOKENS).await?;
        let content = final_answer(&reply).map(str::to_string).unwrap_or(reply);
        Ok(SectionDraft {
            content,
            tool_calls: executed,
        })
    }
}
