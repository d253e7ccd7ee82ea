use std::time::Duration;

use thiserror::Error;

pub const MIN_BATCH_SIZE: usize = 2;
pub const MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 9;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
    pub interests: String,
    pub feed: FeedConfig,
    pub notifier: NotifierConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

impl ClassifierConfig {
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some() && self.api_key.is_some()
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: "deepseek-chat".to_string(),
            temperature: 0.3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// Dead-man's switch: a partial batch is flushed after this long.
    pub batch_timeout: Duration,
    /// Pause between consecutive batches while items remain pending.
    pub next_batch_delay: Duration,
    /// Upper bound on waiting for a refill from the discovery source.
    pub stabilization_time: Duration,
    /// Extra quiet period after a refill before flushing resumes.
    pub settle_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: Duration::from_millis(3_000),
            next_batch_delay: Duration::from_millis(1_000),
            stabilization_time: Duration::from_millis(4_000),
            settle_delay: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub path: String,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub telegram_bot_token: Option<String>,
    pub chat_id: Option<i64>,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
