use thiserror::Error;

impl From<serde_json::Error> for PulseError {
    fn from(err: serde_json::Error) -> Self {
        Self::FetchError(format!("JSON decoding error: {}", err))
    }
}

impl From<sqlx::Error> for PulseError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageError(format!("Database error: {}", err))
    }
}

impl From<reqwest::Error> for PulseError {
    fn from(err: reqwest::Error) -> Self {
        Self::FetchError(format!("HTTP error: {}", err))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The hosting API could not be reached or answered with an error.
    /// Transient: the caller retries on its own schedule.
    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Delivery error: {0}")]
    DeliveryError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Credential error: {0}")]
    CredentialError(String),

    #[error("A poll cycle is already running")]
    CycleInProgress,

    #[error("Poll cycle was cancelled")]
    Cancelled,
}

impl PulseError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchError(_) | Self::CycleInProgress)
    }

    pub fn delivery(id: &str, reason: impl std::fmt::Display) -> Self {
        Self::DeliveryError(format!("notification {}: {}", id, reason))
    }
}
