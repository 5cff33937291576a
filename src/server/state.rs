//! Shared handler state.

use crate::config::{LlmProvider, ReaderConfig};
use crate::error::ReaderError;
use crate::llm::LlmClient;
use crate::mineru::MineruClient;
use crate::pipeline::translate::LayoutTranslator;
use crate::workflow::MineruStatusSource;
use std::sync::Arc;
use std::time::Duration;

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ReaderConfig>,
    pub mineru: Arc<MineruStatusSource>,
    pub translator: Arc<LayoutTranslator<LlmClient>>,
}

impl AppState {
    /// Build clients sharing one connection pool.
    pub fn new(config: ReaderConfig) -> Result<Self, ReaderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ReaderError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http(config, http))
    }

    pub fn with_http(config: ReaderConfig, http: reqwest::Client) -> Self {
        let llm = LlmClient::new_shared(http.clone(), &config);
        let mineru = MineruStatusSource::new(MineruClient::with_http(http, &config), config.mineru_dir.clone());
        Self {
            config: Arc::new(config),
            mineru: Arc::new(mineru),
            translator: Arc::new(LayoutTranslator::new(llm)),
        }
    }

    pub fn llm(&self) -> &LlmClient {
        self.translator.inner()
    }

    /// `(qwen_configured, openai_configured)` for error summaries.
    pub fn provider_flags(&self) -> (bool, bool) {
        let endpoint = &self.config.llm;
        let configured = endpoint.is_configured();
        (
            configured && endpoint.provider == LlmProvider::Qwen,
            configured && endpoint.provider == LlmProvider::OpenAiCompatible,
        )
    }
}
