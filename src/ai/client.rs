//! Model request/response contract
//!
//! Everything upstream of the transport talks to a [`ModelClient`]; the
//! reqwest implementation lives in [`super::http`] and tests plug in stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AiConfig;
use crate::error::RequestError;

/// Message role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Provider-neutral completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ModelRequest {
    /// Request against the configured provider and model
    pub fn from_config(config: &AiConfig, messages: Vec<Message>) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: None,
        }
    }

    /// System messages joined, for providers that take the system prompt separately
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// Non-system messages in order
    pub fn conversation(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Completion text plus whatever metadata the provider reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            finish_reason: None,
        }
    }

    /// Decode any of the response shapes providers have used
    ///
    /// Accepts the choices array (`choices[0].message.content` or
    /// `choices[0].text`), content blocks (`content: [{text}]`), a direct
    /// `content`/`text`/`response` string, and a top-level `message` given
    /// as an object or a string.
    pub fn from_json(value: &Value) -> Result<Self, RequestError> {
        let content = extract_content(value)
            .ok_or_else(|| RequestError::Malformed("no message text in response".to_string()))?;
        if content.trim().is_empty() {
            return Err(RequestError::Malformed("empty message in response".to_string()));
        }

        Ok(Self {
            content,
            usage: extract_usage(value),
            finish_reason: extract_finish_reason(value),
        })
    }
}

/// Transport for model completions
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, RequestError>;
}

fn extract_content(value: &Value) -> Option<String> {
    if let Some(choice) = value.get("choices").and_then(|c| c.get(0)) {
        let text = choice
            .pointer("/message/content")
            .or_else(|| choice.get("text"))
            .or_else(|| choice.pointer("/delta/content"))
            .and_then(Value::as_str);
        if let Some(text) = text {
            return Some(text.to_string());
        }
    }

    match value.get("content") {
        Some(Value::String(text)) => return Some(text.clone()),
        Some(Value::Array(blocks)) => {
            let text: String = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if !text.is_empty() {
                return Some(text);
            }
        }
        _ => {}
    }

    for field in ["text", "response"] {
        if let Some(text) = value.get(field).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    match value.get("message") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(message) => message
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    }
}

fn extract_usage(value: &Value) -> Option<Usage> {
    let count = |v: &Value, keys: &[&str]| -> Option<u32> {
        keys.iter()
            .find_map(|k| v.get(*k).and_then(Value::as_u64))
            .map(|n| n.min(u32::MAX as u64) as u32)
    };

    if let Some(usage) = value.get("usage") {
        let prompt = count(usage, &["prompt_tokens", "input_tokens"]);
        let completion = count(usage, &["completion_tokens", "output_tokens"]);
        let total = count(usage, &["total_tokens"]).or_else(|| Some(prompt? + completion?));
        return Some(Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        });
    }

    // Ollama reports evaluation counters at the top level
    let prompt = count(value, &["prompt_eval_count"]);
    let completion = count(value, &["eval_count"]);
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt.zip(completion).map(|(p, c)| p + c),
    })
}

fn extract_finish_reason(value: &Value) -> Option<String> {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("finish_reason"))
        .or_else(|| value.get("stop_reason"))
        .or_else(|| value.get("done_reason"))
        .or_else(|| value.get("finish_reason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
