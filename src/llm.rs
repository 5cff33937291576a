//! OpenAI-compatible chat-completions client used to translate one block.
//!
//! Qwen (DashScope compatible mode) and OpenAI speak the same
//! `POST {base}/chat/completions` protocol, so one client serves both; the
//! endpoint is resolved once in [`crate::config::ReaderConfig`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx and timeouts are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). Authentication failures and other 4xx
//! answers are returned immediately.

use crate::cache::TranslationCache;
use crate::config::{LlmEndpoint, ReaderConfig};
use crate::error::ReaderError;
use crate::pipeline::postprocess::clean_translation;
use crate::pipeline::translate::Translator;
use crate::prompts::{translation_prompt, TRANSLATION_SYSTEM_PROMPT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Translation client with a shared result cache.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: LlmEndpoint,
    temperature: f32,
    timeout: Duration,
    max_retries: u32,
    retry_backoff_ms: u64,
    cache: Arc<TranslationCache>,
}

impl LlmClient {
    pub fn new(config: &ReaderConfig) -> Result<Self, ReaderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ReaderError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new_shared(http, config))
    }

    /// Reuse an existing connection pool with a fresh cache.
    pub fn new_shared(http: reqwest::Client, config: &ReaderConfig) -> Self {
        let cache = Arc::new(TranslationCache::with_capacity(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_max_entries,
        ));
        Self::with_parts(http, config, cache)
    }

    /// Share a connection pool and cache with other components.
    pub fn with_parts(http: reqwest::Client, config: &ReaderConfig, cache: Arc<TranslationCache>) -> Self {
        Self {
            http,
            endpoint: config.llm.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.llm_timeout_secs),
            max_retries: config.llm_max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            cache,
        }
    }

    pub fn endpoint(&self) -> &LlmEndpoint {
        &self.endpoint
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn shared_cache(&self) -> Arc<TranslationCache> {
        self.cache.clone()
    }

    /// Translate `text` into `target_lang`.
    ///
    /// Blank input comes back unchanged without a call. Empty model output
    /// falls back to the source text.
    pub async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        model: Option<&str>,
    ) -> Result<String, ReaderError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        if let Some(hit) = self.cache.get(text, target_lang) {
            return Ok(hit);
        }
        if !self.endpoint.is_configured() {
            return Err(ReaderError::ProviderNotConfigured {
                hint: "Set QWEN_API_KEY (or OPENAI_API_KEY) in the environment or .env file.".into(),
            });
        }

        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.endpoint.model.as_str());
        let prompt = translation_prompt(text, target_lang);

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(attempt, max_retries = self.max_retries, backoff_ms = backoff, "Retrying translation call");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            match self.chat(model, &prompt).await {
                Ok(raw) => {
                    let cleaned = clean_translation(&raw);
                    if cleaned.is_empty() {
                        warn!(model, "Model returned an empty translation; keeping the source text");
                        return Ok(text.to_string());
                    }
                    self.cache.insert(text, target_lang, &cleaned);
                    return Ok(cleaned);
                }
                Err(e) if is_transient(&e) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ReaderError::Internal("translation retry loop ended without a result".into())))
    }

    async fn chat(&self, model: &str, prompt: &str) -> Result<String, ReaderError> {
        let url = format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: TRANSLATION_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.endpoint.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let detail = response.text().await.unwrap_or_default();
            return Err(map_status(status, model, detail, retry_after_secs));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;
        if let Some(usage) = &parsed.usage {
            debug!(
                model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Translation call finished"
            );
        }
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReaderError::LlmApiError {
                message: "response contained no choices".into(),
            })?;
        info!(model, chars = content.chars().count(), "Block translated");
        Ok(content)
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> ReaderError {
        if e.is_timeout() {
            ReaderError::ApiTimeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            ReaderError::transport(url, e)
        }
    }
}

fn map_status(status: StatusCode, model: &str, detail: String, retry_after_secs: Option<u64>) -> ReaderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReaderError::AuthError {
            detail: format!("HTTP {status}: {detail}"),
        },
        StatusCode::TOO_MANY_REQUESTS => ReaderError::RateLimitExceeded {
            model: model.to_string(),
            retry_after_secs,
        },
        _ => ReaderError::LlmApiError {
            message: format!("HTTP {status}: {detail}"),
        },
    }
}

fn is_transient(e: &ReaderError) -> bool {
    match e {
        ReaderError::RateLimitExceeded { .. } | ReaderError::ApiTimeout { .. } | ReaderError::Transport { .. } => true,
        ReaderError::LlmApiError { message } => message.starts_with("HTTP 5"),
        _ => false,
    }
}

impl Translator for LlmClient {
    async fn translate(&self, text: &str, target_lang: &str, model: Option<&str>) -> Result<String, ReaderError> {
        self.translate_text(text, target_lang, model).await
    }
}
