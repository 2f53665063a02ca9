use gambit_core::errors::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed session record: {0}")]
    MalformedSession(String),

    #[error("invalid engine config: {0}")]
    Config(String),
}

impl EngineError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_kind(),
            Self::MalformedSession(_) => "malformed_session",
            Self::Config(_) => "config",
        }
    }
}
