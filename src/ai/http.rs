//! reqwest-backed model client
//!
//! Speaks the Anthropic messages API, the OpenAI chat completions API (and
//! every server that mimics it) and the Ollama chat API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::client::{Message, ModelClient, ModelRequest, ModelResponse};
use crate::config::AiConfig;
use crate::error::RequestError;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const OLLAMA_URL: &str = "http://localhost:11434/api/chat";

/// Wire protocol family of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    /// Unknown provider names are treated as OpenAI-compatible
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => ProviderKind::Anthropic,
            "ollama" | "local" => ProviderKind::Ollama,
            _ => ProviderKind::OpenAi,
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => ANTHROPIC_URL,
            ProviderKind::OpenAi => OPENAI_URL,
            ProviderKind::Ollama => OLLAMA_URL,
        }
    }
}

/// Request body for the Anthropic messages API
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
}

/// Request body for OpenAI-compatible chat completions
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Request body for the Ollama chat API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

pub struct HttpModelClient {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl HttpModelClient {
    /// Create a client from the `[ai]` section
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`; providers that need no key work without it.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    fn url(&self, kind: ProviderKind) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| kind.default_url().to_string())
    }

    fn build(&self, kind: ProviderKind, request: &ModelRequest) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(self.url(kind))
            .header(header::CONTENT_TYPE, "application/json");

        match kind {
            ProviderKind::Anthropic => {
                let body = AnthropicRequest {
                    model: request.model.clone(),
                    max_tokens: request.max_tokens,
                    messages: request.conversation(),
                    system: request.system_prompt(),
                    temperature: request.temperature,
                };
                let builder = builder
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body);
                match &self.api_key {
                    Some(key) => builder.header("x-api-key", key),
                    None => builder,
                }
            }
            ProviderKind::OpenAi => {
                let body = ChatCompletionRequest {
                    model: &request.model,
                    messages: &request.messages,
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                    stream: request.stream,
                };
                let builder = builder.json(&body);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            }
            ProviderKind::Ollama => {
                let body = OllamaRequest {
                    model: &request.model,
                    messages: &request.messages,
                    stream: false,
                    options: OllamaOptions {
                        temperature: request.temperature,
                        num_predict: request.max_tokens.min(i32::MAX as u32) as i32,
                    },
                };
                builder.json(&body)
            }
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, RequestError> {
        let kind = ProviderKind::parse(&request.provider);
        debug!(provider = ?kind, model = %request.model, "Sending model request");

        let response = self.build(kind, request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::from_status(status.as_u16(), body, retry_after));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| RequestError::Malformed(e.to_string()))?;
        ModelResponse::from_json(&value)
    }
}

/// `retry-after` given in whole seconds
fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use header::{HeaderMap, HeaderValue};

    #[test]
    fn test_provider_kinds() {
        assert_eq!(ProviderKind::parse("Anthropic"), ProviderKind::Anthropic);
        assert_eq!(ProviderKind::parse("ollama"), ProviderKind::Ollama);
        assert_eq!(ProviderKind::parse("openai"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("openrouter"), ProviderKind::OpenAi);
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_endpoint_override() {
        let config = AiConfig {
            endpoint: Some("http://127.0.0.1:1234/v1/chat/completions".into()),
            api_key_env: "NEXUS_COMMIT_TEST_UNSET_KEY".into(),
            ..AiConfig::default()
        };
        let client = HttpModelClient::new(&config).unwrap();
        assert_eq!(
            client.url(ProviderKind::OpenAi),
            "http://127.0.0.1:1234/v1/chat/completions"
        );
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_anthropic_body_keeps_system_separate() {
        let request = ModelRequest::from_config(
            &AiConfig::default(),
            vec![Message::system("rules"), Message::user("diff")],
        );
        let body = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages: request.conversation(),
            system: request.system_prompt(),
            temperature: request.temperature,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "rules");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
