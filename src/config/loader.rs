use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, FeedConfig, LoggingConfig,
    NotifierConfig, PipelineConfig, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = ClassifierConfig::default();
        let classifier = ClassifierConfig {
            api_url: validate_endpoint(non_empty("CLASSIFIER_API_URL"))?,
            api_key: non_empty("CLASSIFIER_API_KEY"),
            model: non_empty("CLASSIFIER_MODEL").unwrap_or(defaults.model),
            temperature: env::var("CLASSIFIER_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|t| (0.0..=2.0).contains(t))
                .unwrap_or(defaults.temperature),
            request_timeout: millis("CLASSIFIER_TIMEOUT").unwrap_or(defaults.request_timeout),
        };

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            batch_size: parse_batch_size(env::var("BATCH_SIZE").ok().as_deref()),
            batch_timeout: millis("BATCH_TIMEOUT").unwrap_or(defaults.batch_timeout),
            next_batch_delay: millis("NEXT_BATCH_DELAY").unwrap_or(defaults.next_batch_delay),
            stabilization_time: millis("STABILIZATION_TIME")
                .unwrap_or(defaults.stabilization_time),
            settle_delay: millis("SETTLE_DELAY").unwrap_or(defaults.settle_delay),
        };

        let feed = FeedConfig {
            path: env::var("FEED_PATH").unwrap_or_else(|_| "feed.jsonl".to_string()),
            page_size: env::var("FEED_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(20),
        };

        let notifier = NotifierConfig {
            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            chat_id: env::var("NOTIFY_CHAT_ID")
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok()),
            timezone: env::var("NOTIFY_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "filtered.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(Self {
            classifier,
            pipeline,
            interests: env::var("INTERESTS").unwrap_or_default(),
            feed,
            notifier,
            directories,
            logging,
        })
    }
}

/// Out-of-range or unparsable sizes fall back to the default.
pub fn parse_batch_size(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(n))
        .unwrap_or(DEFAULT_BATCH_SIZE)
}

fn validate_endpoint(raw: Option<String>) -> Result<Option<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(raw)),
        Ok(url) => Err(ConfigError::Invalid {
            key: "CLASSIFIER_API_URL",
            reason: format!("unsupported scheme {}", url.scheme()),
        }),
        Err(err) => Err(ConfigError::Invalid {
            key: "CLASSIFIER_API_URL",
            reason: err.to_string(),
        }),
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
