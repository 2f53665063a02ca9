use gambit_core::game::MoveToken;

use crate::error::EngineError;
use crate::resilience::ReconnectPolicy;

pub const DEFAULT_OPENING_MOVE: &str = "d2d4";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Played without consulting the oracle when we open the game.
    pub opening_move: String,
    /// Total submissions per turn, including the first.
    pub max_attempts: u32,
    pub reconnect: ReconnectPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            opening_move: DEFAULT_OPENING_MOVE.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        MoveToken::parse(&self.opening_move)
            .map_err(|e| EngineError::Config(format!("opening move: {e}")))?;
        if self.max_attempts == 0 {
            return Err(EngineError::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
