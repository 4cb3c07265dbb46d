//! Error types shared by the gateway, the stores and the lookup service.

use thiserror::Error;

/// Coarse classification callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    Transport,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Caller input was incomplete or malformed. Raised before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider could not resolve the place, or a stored record is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("'{city}' is already in the favorites of user '{user_id}'")]
    Duplicate { city: String, user_id: String },

    /// Non-2xx answer from the weather provider other than "not found".
    #[error("Weather provider request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Weather provider request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse weather provider response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Upstream { .. }
            | Self::Timeout
            | Self::Transport(_)
            | Self::Parse(_)
            | Self::Storage(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status reported by the provider, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether repeating the same call could succeed. Nothing retries automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(msg) => format!(
                "{msg}. Try the \"City,State,Country\" format (e.g. \"Ashta,MP,IN\")."
            ),
            Self::Duplicate { city, .. } => format!("{city} is already in your favorites"),
            Self::Upstream { message, .. } => format!("Weather service error: {message}"),
            Self::Timeout => "The weather service did not answer in time.".to_string(),
            Self::Transport(_) => {
                "Failed to reach the weather service. Check your connection.".to_string()
            }
            Self::Parse(_) => "The weather service sent an unexpected response.".to_string(),
            Self::Storage(_) => "Local storage error".to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
