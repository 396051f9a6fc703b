//! Chat intake: a Twitch IRC client and the trigger router fed by it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;

pub mod irc;
pub mod router;
pub mod token;
mod twitch;

pub use router::{spawn_intake, DispatchOutcome, Trigger, TriggerHandler, TriggerRouter};
pub use token::{validate_token, TokenInfo, CHAT_READ_SCOPE, VALIDATE_URL};
pub use twitch::{ChatLogin, TwitchChat, TwitchChatOptions, TWITCH_IRC_URL};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid chat url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("chat transport is not connected")]
    NotConnected,
    #[error("chat login rejected: {0}")]
    LoginRejected(String),
    #[error("oauth token rejected: {0}")]
    InvalidToken(String),
    #[error("oauth token lacks the '{scope}' scope")]
    MissingScope { scope: String },
    #[error("oauth token belongs to client '{actual}', expected '{expected}'")]
    ClientIdMismatch { expected: String, actual: String },
    #[error("invalid trigger pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel login without the leading `#`.
    pub channel: String,
    pub sender: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Login accepted; channels can be joined now.
    Ready,
    Message(ChatMessage),
    Disconnected { reason: String },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn start(&self) -> Result<(), ChatError>;
    async fn join(&self, channel: &str) -> Result<(), ChatError>;
    fn subscribe(&self) -> broadcast::Receiver<ChatEvent>;
    async fn stop(&self);
}

/// Channel names are case-insensitive and written with or without `#`.
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_ascii_lowercase()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
