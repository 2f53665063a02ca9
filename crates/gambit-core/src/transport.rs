use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::TransportError;
use crate::ids::{ChallengeId, SessionId};

/// One non-blank line of a newline-delimited feed, or the error that ended it.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// The local account as known to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

/// Machine-readable reason codes for declining a challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclineReason {
    StandardOnly,
    NoBot,
}

impl DeclineReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StandardOnly => "standardOnly",
            Self::NoBot => "noBot",
        }
    }
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the engine needs from the game server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_identity(&self) -> Result<Identity, TransportError>;

    async fn accept_challenge(&self, id: &ChallengeId) -> Result<(), TransportError>;

    async fn decline_challenge(
        &self,
        id: &ChallengeId,
        reason: DeclineReason,
    ) -> Result<(), TransportError>;

    async fn submit_move(&self, session: &SessionId, mv: &str) -> Result<(), TransportError>;

    /// Open the account-wide event feed.
    async fn lifecycle_stream(&self) -> Result<RecordStream, TransportError>;

    /// Open the feed of a single session.
    async fn session_stream(&self, session: &SessionId) -> Result<RecordStream, TransportError>;
}
