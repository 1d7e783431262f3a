use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::graph::GraphBackend;
use crate::llm::{ChatModel, LlmError, Message};
use crate::tools::{ToolCall, ToolDispatcher, parse_tool_calls, strip_tool_calls, tools_description};

pub const DEFAULT_CHAT_ROUNDS: usize = 3;

const HISTORY_TURNS: usize = 10;
const RESULT_CHARS: usize = 1000;
const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 2048;

const NO_TOOLS_PROMPT: &str =
    "Do not call any more tools. Answer the question directly from the information above.";

/// Answer plus the tool calls executed while producing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Ad hoc question answering over the graph. Nothing is persisted.
pub struct ChatAgent<'a, M, B> {
    model: &'a M,
    dispatcher: &'a ToolDispatcher<'a, B>,
    max_rounds: usize,
}

impl<'a, M: ChatModel, B: GraphBackend> ChatAgent<'a, M, B> {
    pub fn new(model: &'a M, dispatcher: &'a ToolDispatcher<'a, B>) -> Self {
        Self {
            model,
            dispatcher,
            max_rounds: DEFAULT_CHAT_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub async fn converse(
        &self,
        requirement: &str,
        message: &str,
        history: &[Message],
    ) -> Result<ChatReply, LlmError> {
        info!(graph_id = self.dispatcher.graph_id(), "chat message");
        let system = format!(
            "You are an analyst answering questions about a simulation report.\n\n\
             Simulation requirement: {requirement}\n\
             Graph id: {}\n\n\
             You can call these tools:\n\n{}\n\n\
             Call a tool as:\n\
             <tool_call>\n{{\"name\": \"tool_name\", \"parameters\": {{\"param\": \"value\"}}}}\n</tool_call>\n\n\
             Answer from facts and data, cite what you used, and say so when information is missing.",
            self.dispatcher.graph_id(),
            tools_description(),
        );

        let mut messages = vec![Message::system(system)];
        let recent = history.len().saturating_sub(HISTORY_TURNS);
        messages.extend(history[recent..].iter().filter(|m| !m.is_system()).cloned());
        messages.push(Message::user(message));

        let mut executed = Vec::new();
        for _ in 0..self.max_rounds {
            let reply = self.model.chat(&messages, TEMPERATURE, MAX_TOKENS).await?;
            let calls = parse_tool_calls(&reply);
            if calls.is_empty() {
                return Ok(ChatReply {
                    response: strip_tool_calls(&reply),
                    tool_calls: executed,
                });
            }

            let mut results = Vec::new();
            for call in calls {
                let rendered = self.dispatcher.execute(&call).await.render();
                let truncated: String = rendered.chars().take(RESULT_CHARS).collect();
                results.push(format!("[{}]: {truncated}", call.name));
                executed.push(call);
            }
            messages.push(Message::assistant(reply));
            messages.push(Message::user(format!(
                "Tool results:\n{}\n\nAnswer the question based on the information above.",
                results.join("\n\n")
            )));
        }

        warn!(rounds = self.max_rounds, "chat round limit reached");
        messages.push(Message::user(NO_TOOLS_PROMPT));
        let reply = self.model.chat(&messages, TEMPERATURE, MAX_TOKENS).await?;
        Ok(ChatReply {
            response: strip_tool_calls(&reply),
            tool_calls: executed,
        })
    }
}
