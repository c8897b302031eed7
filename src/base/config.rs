//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Largest accepted poll backoff multiplier.
pub const MAX_RUN_POLL_MULTIPLIER: f64 = 10.0;

/// Default OpenAI API base URL.
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_request_timeout_secs() -> u64 {
    60
}

/// Default name for a created assistant.
fn default_assistant_name() -> String {
    "assistkit".to_string()
}

/// Default model for a created assistant.
fn default_assistant_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default instructions for a created assistant.
fn default_assistant_instructions() -> String {
    prompts::DEFAULT_ASSISTANT_INSTRUCTIONS.to_string()
}

fn default_run_poll_interval_ms() -> u64 {
    1000
}

fn default_run_poll_max_interval_ms() -> u64 {
    8000
}

fn default_run_poll_multiplier() -> f64 {
    1.5
}

fn default_run_timeout_secs() -> u64 {
    300
}

/// Default model for OpenAI-compatible chat completions.
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default model for OpenAI-compatible embeddings.
fn default_embeddings_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_embeddings_batch_size() -> usize {
    512
}

fn default_true() -> bool {
    true
}

fn default_maritaca_base_url() -> String {
    "https://chat.maritaca.ai/api".to_string()
}

fn default_maritaca_model() -> String {
    "sabia-3".to_string()
}

fn default_jina_base_url() -> String {
    "https://api.jina.ai/v1/embeddings".to_string()
}

fn default_jina_model() -> String {
    "jina-embeddings-v2-base-en".to_string()
}

fn default_langsmith_endpoint() -> String {
    "https://api.smith.langchain.com".to_string()
}

fn default_langsmith_project() -> String {
    "default".to_string()
}

fn default_scraper_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36".to_string()
}

/// Path fragments the scrapers never follow.
pub fn default_scraper_blacklist() -> Vec<String> {
    ["login", "signup", "signin", "register", "logout", "download", "redirect"].into_iter().map(String::from).collect()
}

fn default_scraper_timeout_secs() -> u64 {
    30
}

fn default_browser_settle_secs() -> u64 {
    10
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_whisper_language() -> String {
    "en".to_string()
}

fn default_whisper_temperature() -> f32 {
    0.7
}

/// Configuration for assistkit.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Shared, immutable settings.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The settings themselves, reached through `Config`'s `Deref`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// OpenAI API key (`ASSISTKIT_OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: String,
    /// OpenAI API base URL (`ASSISTKIT_OPENAI_BASE_URL`).
    /// Override this to talk to an OpenAI-compatible host (e.g. NVIDIA NIM).
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// Bound on a single Assistants API request, in seconds (`ASSISTKIT_OPENAI_REQUEST_TIMEOUT_SECS`).
    /// Zero disables it.
    #[serde(default = "default_openai_request_timeout_secs")]
    pub openai_request_timeout_secs: u64,
    /// Existing assistant to run (`ASSISTKIT_ASSISTANT_ID`).
    /// When absent, an assistant is created from the fields below.
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// Name of a created assistant (`ASSISTKIT_ASSISTANT_NAME`).
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    /// Model of a created assistant (`ASSISTKIT_ASSISTANT_MODEL`).
    #[serde(default = "default_assistant_model")]
    pub assistant_model: String,
    /// Instructions of a created assistant (`ASSISTKIT_ASSISTANT_INSTRUCTIONS`).
    #[serde(default = "default_assistant_instructions")]
    pub assistant_instructions: String,
    /// Sampling temperature of a created assistant (`ASSISTKIT_ASSISTANT_TEMPERATURE`).
    /// Value between 0 and 2.
    #[serde(default)]
    pub assistant_temperature: Option<f32>,
    /// First delay between run status checks, in milliseconds (`ASSISTKIT_RUN_POLL_INTERVAL_MS`).
    #[serde(default = "default_run_poll_interval_ms")]
    pub run_poll_interval_ms: u64,
    /// Upper bound of the backed-off poll delay, in milliseconds (`ASSISTKIT_RUN_POLL_MAX_INTERVAL_MS`).
    #[serde(default = "default_run_poll_max_interval_ms")]
    pub run_poll_max_interval_ms: u64,
    /// Factor applied to the poll delay after every non-terminal check (`ASSISTKIT_RUN_POLL_MULTIPLIER`).
    #[serde(default = "default_run_poll_multiplier")]
    pub run_poll_multiplier: f64,
    /// Overall bound on waiting for a run, in seconds (`ASSISTKIT_RUN_TIMEOUT_SECS`).
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Model for OpenAI-compatible chat completions (`ASSISTKIT_CHAT_MODEL`).
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model for OpenAI-compatible embeddings (`ASSISTKIT_EMBEDDINGS_MODEL`).
    #[serde(default = "default_embeddings_model")]
    pub embeddings_model: String,
    /// Number of texts sent per embeddings request (`ASSISTKIT_EMBEDDINGS_BATCH_SIZE`).
    #[serde(default = "default_embeddings_batch_size")]
    pub embeddings_batch_size: usize,
    /// Replace newlines with spaces before embedding (`ASSISTKIT_EMBEDDINGS_STRIP_NEW_LINES`).
    #[serde(default = "default_true")]
    pub embeddings_strip_new_lines: bool,
    /// Maritaca API key (`ASSISTKIT_MARITACA_API_KEY`).
    #[serde(default)]
    pub maritaca_api_key: Option<String>,
    /// Maritaca API base URL (`ASSISTKIT_MARITACA_BASE_URL`).
    #[serde(default = "default_maritaca_base_url")]
    pub maritaca_base_url: String,
    /// Maritaca model (`ASSISTKIT_MARITACA_MODEL`).
    #[serde(default = "default_maritaca_model")]
    pub maritaca_model: String,
    /// Jina API key (`ASSISTKIT_JINA_API_KEY`).
    #[serde(default)]
    pub jina_api_key: Option<String>,
    /// Jina embeddings endpoint (`ASSISTKIT_JINA_BASE_URL`).
    #[serde(default = "default_jina_base_url")]
    pub jina_base_url: String,
    /// Jina embeddings model (`ASSISTKIT_JINA_MODEL`).
    #[serde(default = "default_jina_model")]
    pub jina_model: String,
    /// Emit LangSmith run events (`ASSISTKIT_TRACING_ENABLED`).
    #[serde(default)]
    pub tracing_enabled: bool,
    /// LangSmith API key (`ASSISTKIT_LANGSMITH_API_KEY`).
    #[serde(default)]
    pub langsmith_api_key: Option<String>,
    /// LangSmith API endpoint (`ASSISTKIT_LANGSMITH_ENDPOINT`).
    #[serde(default = "default_langsmith_endpoint")]
    pub langsmith_endpoint: String,
    /// LangSmith project that receives the runs (`ASSISTKIT_LANGSMITH_PROJECT`).
    #[serde(default = "default_langsmith_project")]
    pub langsmith_project: String,
    /// User agent sent by the scrapers (`ASSISTKIT_SCRAPER_USER_AGENT`).
    #[serde(default = "default_scraper_user_agent")]
    pub scraper_user_agent: String,
    /// Link path fragments the scrapers skip (`ASSISTKIT_SCRAPER_BLACKLIST`).
    #[serde(default = "default_scraper_blacklist")]
    pub scraper_blacklist: Vec<String>,
    /// Bound on a single scrape, in seconds (`ASSISTKIT_SCRAPER_TIMEOUT_SECS`).
    #[serde(default = "default_scraper_timeout_secs")]
    pub scraper_timeout_secs: u64,
    /// Delay after navigation before the browser scraper reads the page (`ASSISTKIT_BROWSER_SETTLE_SECS`).
    #[serde(default = "default_browser_settle_secs")]
    pub browser_settle_secs: u64,
    /// Whisper model (`ASSISTKIT_WHISPER_MODEL`).
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
    /// Language of transcribed audio (`ASSISTKIT_WHISPER_LANGUAGE`).
    #[serde(default = "default_whisper_language")]
    pub whisper_language: String,
    /// Transcription temperature (`ASSISTKIT_WHISPER_TEMPERATURE`).
    #[serde(default = "default_whisper_temperature")]
    pub whisper_temperature: f32,
}

impl ConfigInner {
    /// First delay between run status checks.
    pub fn run_poll_interval(&self) -> Duration {
        Duration::from_millis(self.run_poll_interval_ms)
    }

    /// Upper bound of the poll delay.
    pub fn run_poll_max_interval(&self) -> Duration {
        Duration::from_millis(self.run_poll_max_interval_ms)
    }

    /// Overall bound on waiting for a run.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Config {
    /// Load from `ASSISTKIT_*` environment variables and an optional TOML file.
    ///
    /// The file is `explicit_path` when given, otherwise `.hidden/config.toml` if it exists.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("ASSISTKIT").try_parsing(true).list_separator(",").with_list_parse_key("scraper_blacklist"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the invariants the services rely on.
    pub fn validate(&self) -> Res<()> {
        if let Some(temperature) = self.assistant_temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(anyhow::anyhow!("Assistant temperature must be between 0 and 2."));
            }
        }

        if !(0.0..=2.0).contains(&self.whisper_temperature) {
            return Err(anyhow::anyhow!("Whisper temperature must be between 0 and 2."));
        }

        if self.run_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Run poll interval must be greater than zero."));
        }

        if self.run_poll_max_interval_ms < self.run_poll_interval_ms {
            return Err(anyhow::anyhow!("Run poll max interval must not be smaller than the poll interval."));
        }

        if !self.run_poll_multiplier.is_finite() || !(1.0..=MAX_RUN_POLL_MULTIPLIER).contains(&self.run_poll_multiplier) {
            return Err(anyhow::anyhow!("Run poll multiplier must be between 1 and {MAX_RUN_POLL_MULTIPLIER}."));
        }

        if self.run_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Run timeout must be greater than zero."));
        }

        if self.embeddings_batch_size == 0 {
            return Err(anyhow::anyhow!("Embeddings batch size must be greater than zero."));
        }

        if self.tracing_enabled && self.langsmith_api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(anyhow::anyhow!("Tracing is enabled, but no LangSmith API key is set."));
        }

        Ok(())
    }
}

// Tests.
