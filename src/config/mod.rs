mod settings;

pub use settings::{
    LLMConfig, LoggingConfig, Settings, SqlConfig, StorageConfig, SummarizerConfig, UploadConfig,
};
