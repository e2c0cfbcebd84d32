use thiserror::Error;

#[derive(Error, Debug)]
pub enum UrpoError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trace not found: {0}")]
    TraceNotFound(String),

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    #[error("queue full, backpressure in effect")]
    Backpressure,

    #[error("collector is shutting down")]
    ShuttingDown,

    #[error("shutdown deadline exceeded, spans may have been lost")]
    DeadlineExceeded,

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Channel send error")]
    ChannelSend,

    #[error("Channel receive error")]
    ChannelReceive,

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {message}")]
    Parse { message: String },
}

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, UrpoError>;

impl UrpoError {
    /// Creates a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new validation error.
    pub fn invalid_span<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpan(msg.into())
    }

    /// Creates a new decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::DecodeError(msg.into())
    }

    /// Creates a new parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Returns true if this error is recoverable by the caller retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Backpressure | Self::Timeout { .. } | Self::ChannelSend | Self::ChannelReceive
        )
    }

    /// Returns the error category for metrics/logging correlation.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::TraceNotFound(_) | Self::NotFound(_) => "not_found",
            Self::InvalidSpan(_) => "validation",
            Self::Backpressure => "backpressure",
            Self::ShuttingDown => "shutting_down",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::DecodeError(_) => "decode",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) | Self::Parse { .. } => "serialization",
            Self::Join(_) => "async",
            Self::ChannelSend | Self::ChannelReceive => "channel",
            Self::Timeout { .. } => "timeout",
        }
    }
}
