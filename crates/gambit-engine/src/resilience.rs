use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Why the lifecycle feed went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disconnect {
    /// The feed could not be opened (network error or non-200).
    ConnectFailed,
    /// The server ended the feed cleanly.
    Closed,
    ReadError,
}

impl Disconnect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectFailed => "connect_failed",
            Self::Closed => "closed",
            Self::ReadError => "read_error",
        }
    }
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed reconnect delays for the lifecycle feed. Unbounded retries, no growth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub connect_failure: Duration,
    pub stream_closed: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connect_failure: Duration::from_secs(15),
            stream_closed: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, cause: Disconnect) -> Duration {
        match cause {
            Disconnect::ConnectFailed => self.connect_failure,
            Disconnect::Closed | Disconnect::ReadError => self.stream_closed,
        }
    }
}

/// Injectable delay so the reconnect loop can run without real time passing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
