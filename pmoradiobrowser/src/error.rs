//! Error types for the Radio Browser layer

pub type Result<T> = std::result::Result<T, Error>;

/// Failures inside the Radio Browser layer
///
/// None of these cross the service boundary: [`crate::RadioBrowser`]
/// turns them into failure envelopes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Favorites database
    #[error("Favorites database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The mirror discovery endpoint answered with a non-success status
    #[error("Mirror discovery returned HTTP {0}")]
    Discovery(reqwest::StatusCode),

    /// A blocking file task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    /// Input refused, the message is meant for the end user
    #[error("{0}")]
    Rejected(String),
}

impl Error {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
