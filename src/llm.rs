//! Language model backends.
//!
//! [`ChatModel`] is a single-turn completion: prompt in, text out. The
//! answer generator builds the whole prompt, so backends stay thin.
//!
//! | `llm.provider` | Backend | Key |
//! |----------------|---------|-----|
//! | `groq` | [`OpenAiCompatibleModel`] at `https://api.groq.com/openai/v1` | `GROQ_API_KEY` |
//! | `openai` | [`OpenAiCompatibleModel`] at `https://api.openai.com/v1` | `OPENAI_API_KEY` |
//! | `ollama` | [`OllamaModel`] at `http://localhost:11434` | none |
//! | `disabled` | [`DisabledModel`] | none |
//!
//! `llm.url` and `llm.api_key_env` override the defaults above.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::http;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete `prompt`, returning the model's full reply.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Always fails; lets ingestion run without a model configured.
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Language model provider is disabled")
    }
}

/// Chat-completions client for OpenAI and API-compatible services (Groq).
pub struct OpenAiCompatibleModel {
    service: &'static str,
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleModel {
    /// # Errors
    ///
    /// Returns an error if the API key variable is not set.
    pub fn new(
        config: &LlmConfig,
        service: &'static str,
        default_base_url: &str,
        default_key_env: &str,
    ) -> Result<Self> {
        let key_env = config.api_key_env.as_deref().unwrap_or(default_key_env);
        let api_key = std::env::var(key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", key_env))?;
        let base_url = config.url.as_deref().unwrap_or(default_base_url);

        Ok(Self {
            service,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client_with_timeout(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let json = http::post_json_with_retry(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            self.service,
        )
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Client for Ollama's `/api/generate` endpoint (non-streaming).
pub struct OllamaModel {
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self {
            model: config.model.clone(),
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client_with_timeout(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            }
        });
        let json = http::post_json_with_retry(
            &self.client,
            &self.endpoint,
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

/// Create the [`ChatModel`] named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "groq" => Ok(Arc::new(OpenAiCompatibleModel::new(
            config,
            "Groq",
            GROQ_BASE_URL,
            "GROQ_API_KEY",
        )?)),
        "openai" => Ok(Arc::new(OpenAiCompatibleModel::new(
            config,
            "OpenAI",
            OPENAI_BASE_URL,
            "OPENAI_API_KEY",
        )?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
