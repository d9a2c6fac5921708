//! Error types shared across pipview crates.

use serde::{Deserialize, Serialize};

/// Top-level error type for pipview operations.
#[derive(Debug, thiserror::Error)]
pub enum PipError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Source lost: {message}")]
    SourceLost { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Channel closed: {message}")]
    ChannelClosed { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PipError.
pub type PipResult<T> = Result<T, PipError>;

/// Wire-level error classification carried in Control Channel responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    SourceUnavailable,
    SourceLost,
    NotFound,
    Unsupported,
    Internal,
}

impl PipError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: msg.into(),
        }
    }

    pub fn source_lost(msg: impl Into<String>) -> Self {
        Self::SourceLost {
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed {
            message: msg.into(),
        }
    }

    /// Classification used when the error crosses the Control Channel.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest { .. } | Self::Json(_) => ErrorKind::InvalidRequest,
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::SourceLost { .. } => ErrorKind::SourceLost,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Capture { .. }
            | Self::Platform { .. }
            | Self::Config { .. }
            | Self::ChannelClosed { .. }
            | Self::Io(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// The message without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidRequest { message }
            | Self::SourceUnavailable { message }
            | Self::SourceLost { message }
            | Self::NotFound { message }
            | Self::Unsupported { message }
            | Self::Capture { message }
            | Self::Platform { message }
            | Self::Config { message }
            | Self::ChannelClosed { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Rebuild an error from its wire form.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidRequest => Self::InvalidRequest { message },
            ErrorKind::SourceUnavailable => Self::SourceUnavailable { message },
            ErrorKind::SourceLost => Self::SourceLost { message },
            ErrorKind::NotFound => Self::NotFound { message },
            ErrorKind::Unsupported => Self::Unsupported { message },
            ErrorKind::Internal => Self::Other(anyhow::anyhow!(message)),
        }
    }
}
