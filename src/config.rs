//! Configuration for the reader backend and its clients.
//!
//! All behaviour is controlled through [`ReaderConfig`], built via its
//! [`ReaderConfigBuilder`] or loaded from the process environment with
//! [`ReaderConfig::from_env`]. One struct carries every knob so the server,
//! the CLI and the tests share the same defaults.

use crate::error::ReaderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_QWEN_MODEL: &str = "qwen-turbo";
pub const DEFAULT_MINERU_BASE_URL: &str = "https://mineru.net/api/v4";

/// Which credential set the LLM endpoint was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// `QWEN_API_KEY` was set.
    Qwen,
    /// Fallback to `OPENAI_API_KEY` on an OpenAI-compatible base URL.
    OpenAiCompatible,
}

/// Resolved OpenAI-compatible chat endpoint.
#[derive(Clone, PartialEq)]
pub struct LlmEndpoint {
    pub provider: LlmProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for LlmEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmEndpoint")
            .field("provider", &self.provider)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl LlmEndpoint {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// MinerU model flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    Pipeline,
    #[default]
    Vlm,
}

impl ModelVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelVersion::Pipeline => "pipeline",
            ModelVersion::Vlm => "vlm",
        }
    }

    /// Parse a user-supplied value; unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pipeline" => Some(ModelVersion::Pipeline),
            "vlm" => Some(ModelVersion::Vlm),
            _ => None,
        }
    }
}

/// Fixed-interval polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status queries. Default: 3 s.
    pub interval: Duration,
    /// Maximum number of status queries. Default: 120 (~6 minutes).
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    /// Upper bound of the wall-clock time spent sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Policy with the same interval whose budget covers `total`.
    pub fn for_timeout(interval: Duration, total: Duration) -> Self {
        let per = interval.as_millis().max(1);
        let attempts = total.as_millis().div_ceil(per).max(1);
        Self {
            interval,
            max_attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        }
    }
}

/// Configuration for parsing, translation and serving.
///
/// Built via [`ReaderConfig::builder()`], [`ReaderConfig::from_env()`] or
/// [`ReaderConfig::default()`].
///
/// # Example
/// ```rust
/// use litreader::ReaderConfig;
///
/// let config = ReaderConfig::builder()
///     .mineru_token("tok")
///     .batch_size(10)
///     .default_target_lang("zh")
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 10);
/// ```
#[derive(Clone)]
pub struct ReaderConfig {
    /// Translation endpoint (Qwen preferred, OpenAI-compatible fallback).
    pub llm: LlmEndpoint,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub llm_timeout_secs: u64,

    /// Sampling temperature for translation. Default: 0.2.
    pub temperature: f32,

    /// Retries for rate-limited or 5xx LLM calls. Default: 2.
    pub llm_max_retries: u32,

    /// Base back-off between LLM retries in ms, doubled each retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// MinerU bearer token. Empty means "not configured".
    pub mineru_token: String,

    /// MinerU API root. Default: `https://mineru.net/api/v4`.
    pub mineru_base_url: String,

    /// MinerU model flavour. Default: vlm.
    pub model_version: ModelVersion,

    /// Server-side wait budget for `wait=true` submissions, seconds. Default: 300.
    pub mineru_timeout_secs: u64,

    /// Client-side polling policy. Default: every 3 s, 120 attempts.
    pub poll: PollPolicy,

    /// Blocks per `/api/translate-layout` call. Default: 10.
    pub batch_size: usize,

    /// Target language when the request names none. Default: `zh`.
    pub default_target_lang: String,

    /// Lifetime of cached translations in seconds. Default: 86 400.
    pub cache_ttl_secs: u64,

    /// Most translations kept in memory at once. Default: 10 000.
    pub cache_max_entries: usize,

    /// Where uploaded PDFs and JSON files land. Default: `data/files`.
    pub upload_dir: PathBuf,

    /// Where parser result archives are extracted. Default: `data/mineru`.
    pub mineru_dir: PathBuf,

    /// Largest accepted request body in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Server listen address. Default: `0.0.0.0:5000`.
    pub bind_addr: String,

    /// Attach a permissive CORS layer. Default: true.
    pub cors: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            llm: LlmEndpoint {
                provider: LlmProvider::OpenAiCompatible,
                api_key: String::new(),
                base_url: DEFAULT_QWEN_BASE_URL.to_string(),
                model: DEFAULT_QWEN_MODEL.to_string(),
            },
            llm_timeout_secs: 60,
            temperature: 0.2,
            llm_max_retries: 2,
            retry_backoff_ms: 500,
            mineru_token: String::new(),
            mineru_base_url: DEFAULT_MINERU_BASE_URL.to_string(),
            model_version: ModelVersion::default(),
            mineru_timeout_secs: 300,
            poll: PollPolicy::default(),
            batch_size: 10,
            default_target_lang: "zh".to_string(),
            cache_ttl_secs: 24 * 60 * 60,
            cache_max_entries: 10_000,
            upload_dir: PathBuf::from("data/files"),
            mineru_dir: PathBuf::from("data/mineru"),
            max_upload_bytes: 100 * 1024 * 1024,
            bind_addr: "0.0.0.0:5000".to_string(),
            cors: true,
        }
    }
}

impl fmt::Debug for ReaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderConfig")
            .field("llm", &self.llm)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("temperature", &self.temperature)
            .field("llm_max_retries", &self.llm_max_retries)
            .field(
                "mineru_token",
                &if self.mineru_token.is_empty() { "<unset>" } else { "<redacted>" },
            )
            .field("mineru_base_url", &self.mineru_base_url)
            .field("model_version", &self.model_version)
            .field("mineru_timeout_secs", &self.mineru_timeout_secs)
            .field("poll", &self.poll)
            .field("batch_size", &self.batch_size)
            .field("default_target_lang", &self.default_target_lang)
            .field("upload_dir", &self.upload_dir)
            .field("mineru_dir", &self.mineru_dir)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl ReaderConfig {
    /// Create a new builder for `ReaderConfig`.
    pub fn builder() -> ReaderConfigBuilder {
        ReaderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ReaderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    ///
    /// Recognised keys: `QWEN_API_KEY`, `QWEN_BASE_URL`, `QWEN_MODEL`,
    /// `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `DEFAULT_MODEL`, `MINERU_TOKEN`,
    /// `MINERU_BASE_URL`, `MINERU_MODEL_VERSION`, `MINERU_TIMEOUT`,
    /// `UPLOAD_FOLDER`, `MINERU_FOLDER`, `BIND_ADDR`, `LITREADER_CORS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut builder = Self::builder().llm(resolve_llm_endpoint(&get));

        if let Some(token) = get("MINERU_TOKEN") {
            builder = builder.mineru_token(token);
        }
        if let Some(url) = get("MINERU_BASE_URL") {
            builder = builder.mineru_base_url(url);
        }
        if let Some(v) = get("MINERU_MODEL_VERSION") {
            let version = ModelVersion::parse(&v).ok_or_else(|| {
                ReaderError::InvalidConfig(format!(
                    "MINERU_MODEL_VERSION must be 'pipeline' or 'vlm', got '{v}'"
                ))
            })?;
            builder = builder.model_version(version);
        }
        if let Some(v) = get("MINERU_TIMEOUT") {
            let secs = v.parse::<u64>().map_err(|_| {
                ReaderError::InvalidConfig(format!("MINERU_TIMEOUT must be seconds, got '{v}'"))
            })?;
            builder = builder.mineru_timeout_secs(secs);
        }
        if let Some(dir) = get("UPLOAD_FOLDER") {
            builder = builder.upload_dir(dir);
        }
        if let Some(dir) = get("MINERU_FOLDER") {
            builder = builder.mineru_dir(dir);
        }
        if let Some(addr) = get("BIND_ADDR") {
            builder = builder.bind_addr(addr);
        }
        if let Some(v) = get("LITREADER_CORS") {
            builder = builder.cors(!matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off"));
        }

        builder.build()
    }

    /// Server-side poll policy for `wait=true`: same interval, budget from
    /// `mineru_timeout_secs`.
    pub fn server_poll_policy(&self) -> PollPolicy {
        PollPolicy::for_timeout(self.poll.interval, Duration::from_secs(self.mineru_timeout_secs))
    }
}

/// Qwen credentials win; otherwise fall back to the OpenAI-compatible set.
fn resolve_llm_endpoint(get: &dyn Fn(&str) -> Option<String>) -> LlmEndpoint {
    let qwen_base = get("QWEN_BASE_URL").unwrap_or_else(|| DEFAULT_QWEN_BASE_URL.to_string());
    let qwen_model = get("QWEN_MODEL").unwrap_or_else(|| DEFAULT_QWEN_MODEL.to_string());

    if let Some(key) = get("QWEN_API_KEY") {
        return LlmEndpoint {
            provider: LlmProvider::Qwen,
            api_key: key,
            base_url: qwen_base,
            model: qwen_model,
        };
    }

    LlmEndpoint {
        provider: LlmProvider::OpenAiCompatible,
        api_key: get("OPENAI_API_KEY").unwrap_or_default(),
        base_url: get("OPENAI_BASE_URL").unwrap_or(qwen_base),
        model: get("DEFAULT_MODEL").unwrap_or(qwen_model),
    }
}

/// Builder for [`ReaderConfig`].
#[derive(Debug)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    pub fn llm(mut self, endpoint: LlmEndpoint) -> Self {
        self.config.llm = endpoint;
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm.api_key = key.into();
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.base_url = url.into();
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn llm_max_retries(mut self, n: u32) -> Self {
        self.config.llm_max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn mineru_token(mut self, token: impl Into<String>) -> Self {
        self.config.mineru_token = token.into();
        self
    }

    pub fn mineru_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.mineru_base_url = url.into();
        self
    }

    pub fn model_version(mut self, version: ModelVersion) -> Self {
        self.config.model_version = version;
        self
    }

    pub fn mineru_timeout_secs(mut self, secs: u64) -> Self {
        self.config.mineru_timeout_secs = secs;
        self
    }

    pub fn poll(mut self, policy: PollPolicy) -> Self {
        self.config.poll = policy;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn default_target_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.default_target_lang = lang.into();
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn cache_max_entries(mut self, n: usize) -> Self {
        self.config.cache_max_entries = n;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn mineru_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.mineru_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn cors(mut self, v: bool) -> Self {
        self.config.cors = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReaderConfig, ReaderError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(ReaderError::InvalidConfig("batch size must be ≥ 1".into()));
        }
        if c.cache_max_entries == 0 {
            return Err(ReaderError::InvalidConfig("cache capacity must be ≥ 1".into()));
        }
        if c.poll.max_attempts == 0 {
            return Err(ReaderError::InvalidConfig(
                "poll attempts must be ≥ 1".into(),
            ));
        }
        if c.mineru_base_url.trim().is_empty() || c.llm.base_url.trim().is_empty() {
            return Err(ReaderError::InvalidConfig("base URLs must not be empty".into()));
        }
        if c.default_target_lang.trim().is_empty() {
            return Err(ReaderError::InvalidConfig(
                "default target language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
