use thiserror::Error;

/// Errors that can occur in the rate limit backends
#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend sweepers require a running tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, RateLimitError>;
