use crate::config::{env_parse, env_string};
use crate::context::{PromptBundle, TokenBudget};
use crate::{FusionError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::adapter::promptbundle_to_messages_and_text;
use super::CompletionModel;

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., https://api.openai.com/v1 or http://localhost:8000/v1
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub max_input_tokens: usize,
    pub max_output_tokens: usize,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: env_string("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: env_string("LLM_MODEL").unwrap_or_else(|| "gpt-4".to_string()),
            api_key: env_string("LLM_API_KEY").or_else(|| env_string("OPENAI_API_KEY")),
            request_timeout_ms: env_parse("LLM_TIMEOUT_MS").unwrap_or(60_000),
            temperature: env_parse("LLM_TEMPERATURE").unwrap_or(0.2),
            max_input_tokens: TokenBudget::default().max_input_tokens,
            max_output_tokens: TokenBudget::default().max_output_tokens,
        }
    }
}

impl LlmClientConfig {
    pub fn budget(&self) -> TokenBudget {
        TokenBudget {
            max_input_tokens: self.max_input_tokens,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Minimal response containing the assistant text
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub provider: Option<String>, // "responses" or "chat.completions"
    pub usage: Option<serde_json::Value>,
}

/// HTTP client that prefers the OpenAI Responses API and falls back to Chat Completions
#[derive(Clone)]
pub struct LlmClient {
    pub(crate) http: Client,
    pub(crate) cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| FusionError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    /// Generate a completion for the given prompt bundle
    /// Contract:
    /// - Input: PromptBundle + optional budget
    /// - Output: LlmResponse with assistant text
    /// - Error: network/parse; the chat fallback is attempted before erroring
    pub async fn generate(
        &self,
        bundle: &PromptBundle,
        budget: Option<TokenBudget>,
    ) -> Result<LlmResponse> {
        let budget = budget.unwrap_or_else(|| self.cfg.budget());
        let (messages, input_text) = promptbundle_to_messages_and_text(bundle, budget);

        let responses_url = format!("{}/responses", self.cfg.base_url.trim_end_matches('/'));
        debug!(
            target: "llm_client",
            kind = ?bundle.kind,
            "POST {} via Responses API", responses_url
        );

        let mut req = self
            .http
            .post(&responses_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.model,
            "input": input_text,
            "max_output_tokens": budget.max_output_tokens as u32,
            "temperature": self.cfg.temperature,
        });

        match req.json(&body).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    let val: serde_json::Value = resp.json().await.map_err(|e| {
                        FusionError::Llm(format!("Failed to parse Responses JSON: {e}"))
                    })?;
                    if let Some(text) = extract_text_from_responses(&val) {
                        return Ok(LlmResponse {
                            text,
                            model: val
                                .get("model")
                                .and_then(|v| v.as_str())
                                .map(|s| s.to_string()),
                            provider: Some("responses".to_string()),
                            usage: val.get("usage").cloned(),
                        });
                    }
                    // fallthrough to chat if we couldn't parse
                } else if resp.status() == StatusCode::NOT_FOUND {
                    // Endpoint missing; try chat fallback
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(target: "llm_client", %status, body = %body, "Responses API error; trying chat.completions fallback");
                }
            }
            Err(err) => {
                warn!(target: "llm_client", error = %err, "Responses API request failed; trying chat.completions fallback");
            }
        }

        let chat_url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        debug!(target: "llm_client", "POST {} via Chat Completions", chat_url);

        let mut req = self
            .http
            .post(&chat_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "max_tokens": budget.max_output_tokens as u32,
            "temperature": self.cfg.temperature,
        });

        let resp = req.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                FusionError::Timeout(format!("Chat Completions request: {e}"))
            } else {
                FusionError::Llm(format!("Chat Completions HTTP error: {e}"))
            }
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(FusionError::Llm(format!(
                "Chat Completions error: status={} body={}",
                status, text
            )));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            FusionError::Llm(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        let text = extract_text_from_chat_completions(&val).ok_or_else(|| {
            FusionError::Llm("Missing choices[0].message.content in chat completions".into())
        })?;
        Ok(LlmResponse {
            text,
            model: val
                .get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            provider: Some("chat.completions".to_string()),
            usage: val.get("usage").cloned(),
        })
    }
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, bundle: &PromptBundle) -> Result<String> {
        let response = self.generate(bundle, None).await?;
        debug!(
            target: "llm_client",
            provider = response.provider.as_deref().unwrap_or("unknown"),
            model = response.model.as_deref().unwrap_or("unknown"),
            usage = ?response.usage,
            "Completion received"
        );
        Ok(response.text)
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn extract_text_from_responses(v: &serde_json::Value) -> Option<String> {
    if let Some(s) = v.get("output_text").and_then(|x| x.as_str()) {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    if let Some(arr) = v.get("output").and_then(|x| x.as_array()) {
        let mut acc = String::new();
        for item in arr {
            if let Some(contents) = item.get("content").and_then(|c| c.as_array()) {
                for c in contents {
                    if let Some(t) = c
                        .get("text")
                        .and_then(|t| t.get("value"))
                        .and_then(|v| v.as_str())
                    {
                        acc.push_str(t);
                    } else if let Some(t) = c.get("text").and_then(|v| v.as_str()) {
                        acc.push_str(t);
                    }
                }
            }
        }
        if !acc.is_empty() {
            return Some(acc);
        }
    }
    extract_text_from_chat_completions(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_output_array_segments() {
        let v = json!({
            "output": [{"content": [{"text": "{\"status\":"}, {"text": {"value": "\"answered\"}"}}]}]
        });
        assert_eq!(
            extract_text_from_responses(&v).as_deref(),
            Some("{\"status\":\"answered\"}")
        );
    }

    #[test]
    fn responses_falls_back_to_choices_shape() {
        let v = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(extract_text_from_responses(&v).as_deref(), Some("hi"));
    }
}
