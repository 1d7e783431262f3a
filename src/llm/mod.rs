pub mod client;
pub mod error;
pub mod types;

pub use client::AnthropicClient;
pub use error::LlmError;
pub use types::{Message, MessagesRequest, MessagesResponse, Usage};

use serde_json::Value;

/// The language-model collaborator used by the planner, the section loop and chat.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    /// Send a conversation and return the model's text reply.
    async fn chat(
        &self,
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    /// Send a conversation and parse the reply as a JSON object.
    async fn chat_json(&self, messages: &[Message], temperature: f32) -> Result<Value, LlmError> {
        let text = self.chat(messages, temperature, 4096).await?;
        extract_json(&text)
    }
}

/// Pull the outermost JSON object out of model text, tolerating code fences and chatter.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim().trim_matches('\u{feff}');
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) else {
        return Err(LlmError::InvalidJson("no JSON object found".into()));
    };
    if end < start {
        return Err(LlmError::InvalidJson("no JSON object found".into()));
    }
    serde_json::from_str(&unfenced[start..=end]).map_err(|e| LlmError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_json() {
        let v = extract_json(r#"{"title": "T"}"#).unwrap();
        assert_eq!(v["title"], "T");
    }

    #[test]
    fn extract_fenced_json() {
        let v = extract_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn extract_json_with_chatter() {
        let v = extract_json("Here is the outline:\n{\"sections\": []}\nHope it helps.").unwrap();
        assert!(v["sections"].as_array().unwrap().is_empty());
    }

    #[test]
    fn extract_rejects_non_json() {
        assert!(matches!(
            extract_json("not valid json at all"),
            Err(LlmError::InvalidJson(_))
        ));
        assert!(extract_json("} backwards {").is_err());
    }
}
