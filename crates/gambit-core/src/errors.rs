/// Substrings (lowercase) of rejection messages that mean the move itself was bad.
pub const ILLEGAL_MOVE_VOCABULARY: &[&str] = &[
    "illegal move",
    "invalid uci",
    "move not found",
    "not possible to play",
    "cannot move to",
];

/// Failures talking to the game server.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the server refused a move because the move was illegal or malformed.
    ///
    /// Matching is a case-insensitive substring search over the full error text.
    /// Everything else (auth, network, unrelated server errors) is fatal for the turn.
    pub fn is_illegal_move(&self) -> bool {
        let text = self.to_string().to_lowercase();
        ILLEGAL_MOVE_VOCABULARY
            .iter()
            .any(|needle| text.contains(needle))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Rejected { .. } => "rejected",
            Self::ServerError { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::StreamInterrupted(_) => "stream_interrupted",
            Self::Decode(_) => "decode_error",
        }
    }

    /// Classify an HTTP status code and the server's message.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(message),
            500..=599 => Self::ServerError {
                status,
                body: message,
            },
            _ => Self::Rejected { status, message },
        }
    }
}

/// Failures obtaining a move suggestion. Every variant skips the turn.
#[derive(Clone, Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),
    #[error("oracle API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("oracle provider error: {message}")]
    Provider {
        message: String,
        kind: Option<String>,
    },
    #[error("oracle returned no move")]
    EmptyResponse,
    #[error("oracle response {raw:?} is not a plausible move")]
    ImplausibleMove { raw: String },
    #[error("oracle response could not be decoded: {0}")]
    Decode(String),
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

impl OracleError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Api { .. } => "api",
            Self::Provider { .. } => "provider",
            Self::EmptyResponse => "empty_response",
            Self::ImplausibleMove { .. } => "implausible_move",
            Self::Decode(_) => "decode",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
