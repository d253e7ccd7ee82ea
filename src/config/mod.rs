pub mod env;
mod loader;

pub use env::{
    AppConfig, ClassifierConfig, DirectoryConfig, FeedConfig, LoggingConfig, NotifierConfig,
    PipelineConfig, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
pub use loader::load_config;
