//! Optional language-model backend for answer generation.
//!
//! The `disabled` provider is the default; callers are expected to
//! check [`LlmConfig::is_enabled`] and use their own deterministic
//! fallback when generation is unavailable or fails.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Run one chat completion. Errors here never abort a pipeline; the
/// caller degrades to its context-only fallback.
pub async fn complete(config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    match config.provider.as_str() {
        "openai" => complete_openai(config, system, user).await,
        "disabled" => bail!("llm provider is disabled"),
        other => bail!("Unknown llm provider: '{}'", other),
    }
}

async fn complete_openai(config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .context("OPENAI_API_KEY must be set for the openai llm provider")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let request = ChatRequest {
        model: &config.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };

    let response = client
        .post(OPENAI_CHAT_URL)
        .bearer_auth(&api_key)
        .json(&request)
        .send()
        .await
        .context("Chat completion request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Chat completion returned {}: {}", status, body);
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .context("Failed to parse chat completion response")?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("Chat completion response had no content")?;

    debug!(model = %config.model, chars = content.len(), "chat completion ok");
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let config = LlmConfig::default();
        assert!(!config.is_enabled());
        assert!(complete(&config, "sys", "user").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_provider_errors() {
        let config = LlmConfig {
            provider: "granite".to_string(),
            ..LlmConfig::default()
        };
        assert!(complete(&config, "sys", "user").await.is_err());
    }

    #[test]
    fn test_chat_request_serializes() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 10,
            temperature: 0.1,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"gpt-4o-mini\""));
        assert!(json.contains("\"role\":\"user\""));
    }
}
