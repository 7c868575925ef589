use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaceSeekError {
    #[error("Provider error: {0}")]
    Provider(#[from] placeseek_providers::ProviderError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Search engine has shut down")]
    EngineClosed,
    #[error("No tokio runtime available to spawn the search engine")]
    NoRuntime,
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlaceSeekError>;
