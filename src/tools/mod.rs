pub mod dispatcher;
pub mod parser;

pub use dispatcher::{TOOLS, ToolDispatcher, ToolKind, ToolSpec, tools_description};
pub use parser::{parse_tool_calls, strip_tool_calls};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A retrieval request extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Numeric parameter given either as a number or a numeric string.
    pub fn param_usize(&self, key: &str) -> Option<usize> {
        match self.parameters.get(key)? {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Text(String),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }

    /// Observation text handed back to the model.
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Error(e) => format!("Error: {e}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
