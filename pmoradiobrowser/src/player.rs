//! Playback collaborator
//!
//! The player daemon is reached through the [`Player`] trait; the binary
//! provides the concrete adapter.

use crate::models::PlayerStatus;
use async_trait::async_trait;

/// Errors reported by a player
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// The player cannot be reached at all
    #[error("player unavailable: {0}")]
    Unavailable(String),

    /// The player refused or failed a command
    #[error("player command '{command}' failed: {reason}")]
    Command { command: String, reason: String },
}

impl PlayerError {
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Commands and queries understood by the player daemon
#[async_trait]
pub trait Player: Send + Sync {
    /// Empty the play queue
    async fn clear(&self) -> Result<(), PlayerError>;

    /// Append a stream URL to the queue
    async fn add(&self, url: &str) -> Result<(), PlayerError>;

    /// Start playback
    async fn play(&self) -> Result<(), PlayerError>;

    /// Stop playback, keeping the queue
    async fn stop(&self) -> Result<(), PlayerError>;

    /// Playback state and URL of the current song
    async fn status(&self) -> Result<PlayerStatus, PlayerError>;
}

/// Player used when none is configured: every call is unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlayer;

#[async_trait]
impl Player for NoPlayer {
    async fn clear(&self) -> Result<(), PlayerError> {
        Err(PlayerError::Unavailable("no player configured".into()))
    }

    async fn add(&self, _url: &str) -> Result<(), PlayerError> {
        Err(PlayerError::Unavailable("no player configured".into()))
    }

    async fn play(&self) -> Result<(), PlayerError> {
        Err(PlayerError::Unavailable("no player configured".into()))
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        Err(PlayerError::Unavailable("no player configured".into()))
    }

    async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        Err(PlayerError::Unavailable("no player configured".into()))
    }
}
