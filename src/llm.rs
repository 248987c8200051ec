//! Chat-completion providers.
//!
//! The answer synthesizer only needs one capability: turn a prompt into
//! text. [`ChatProvider`] is that seam. Two HTTP implementations exist:
//!
//! - **[`GeminiProvider`]** (default): `POST /v1beta/models/{model}:generateContent`,
//!   key from `GEMINI_API_KEY`.
//! - **[`OpenAIChatProvider`]**: `POST /v1/chat/completions`, key from
//!   `OPENAI_API_KEY`.
//!
//! Both share the retry policy in [`retry`](crate::retry). The provider is
//! chosen once, in [`create_chat_provider`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{ConfigurationError, GenerationError};
use crate::retry::{send_with_retry, SendError};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
    /// Complete a single-turn prompt.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ConfigurationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConfigurationError::Invalid(format!("failed to build HTTP client: {}", e)))
}

fn api_key(provider: &'static str, var: &'static str) -> Result<String, ConfigurationError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigurationError::MissingCredential { provider, var }),
    }
}

fn send_error(provider: &str, e: SendError) -> GenerationError {
    GenerationError::new(provider, e.to_string())
}

// ============ Gemini ============

pub struct GeminiProvider {
    model: String,
    api_key: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigurationError> {
        Self::with_api_key(config, api_key("gemini", "GEMINI_API_KEY")?)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: String) -> Result<Self, ConfigurationError> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let response = send_with_retry("gemini", self.max_retries, || {
            self.client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| send_error("gemini", e))?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::new("gemini", format!("invalid response: {}", e)))?;
        parse_gemini_response(&json)
    }
}

/// Concatenate `candidates[0].content.parts[].text`.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "response has no candidates".to_string());
            GenerationError::new("gemini", reason)
        })?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(GenerationError::new("gemini", "empty completion"));
    }
    Ok(text)
}

// ============ OpenAI ============

pub struct OpenAIChatProvider {
    model: String,
    api_key: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChatProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigurationError> {
        Self::with_api_key(config, api_key("openai", "OPENAI_API_KEY")?)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: String) -> Result<Self, ConfigurationError> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_output_tokens,
        });
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let response = send_with_retry("openai", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| send_error("openai", e))?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::new("openai", format!("invalid response: {}", e)))?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| GenerationError::new("openai", "response has no message content"))
    }
}

/// Build the configured chat provider.
///
/// | Config Value | Provider | Credential |
/// |-------------|----------|------------|
/// | `"gemini"` | [`GeminiProvider`] | `GEMINI_API_KEY` |
/// | `"openai"` | [`OpenAIChatProvider`] | `OPENAI_API_KEY` |
pub fn create_chat_provider(config: &LlmConfig) -> Result<Arc<dyn ChatProvider>, ConfigurationError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIChatProvider::new(config)?)),
        other => Err(ConfigurationError::Invalid(format!(
            "Unknown llm provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::{http_response, spawn_mock_server};
    use std::sync::atomic::Ordering;

    fn config_for(port: u16) -> LlmConfig {
        LlmConfig {
            url: Some(format!("http://127.0.0.1:{}", port)),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_gemini_joins_parts() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{"text": "Revenue "}, {"text": "grew [Source 1]."}] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Revenue grew [Source 1].");
    }

    #[test]
    fn test_parse_gemini_reports_block_reason() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&json).unwrap_err();
        assert!(err.message.contains("SAFETY"));
        assert_eq!(err.provider, "gemini");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let cfg = LlmConfig {
            provider: "palm".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_chat_provider(&cfg),
            Err(ConfigurationError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_gemini_retries_then_succeeds() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"42"}]}}]}"#;
        let (port, hits) = spawn_mock_server(vec![
            http_response("503 Service Unavailable", "{}"),
            http_response("200 OK", body),
        ])
        .await;
        let p = GeminiProvider::with_api_key(&config_for(port), "k".to_string()).unwrap();
        assert_eq!(p.complete("question").await.unwrap(), "42");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gemini_client_error_is_generation_error() {
        let (port, hits) =
            spawn_mock_server(vec![http_response("403 Forbidden", "bad key")]).await;
        let p = GeminiProvider::with_api_key(&config_for(port), "k".to_string()).unwrap();
        let err = p.complete("question").await.unwrap_err();
        assert!(err.message.contains("403"));
        assert!(err.sources.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_openai_chat_against_mock_server() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"From the table."}}]}"#;
        let (port, _hits) = spawn_mock_server(vec![http_response("200 OK", body)]).await;
        let cfg = LlmConfig {
            provider: "openai".to_string(),
            ..config_for(port)
        };
        let p = OpenAIChatProvider::with_api_key(&cfg, "k".to_string()).unwrap();
        assert_eq!(p.complete("q").await.unwrap(), "From the table.");
    }
}
