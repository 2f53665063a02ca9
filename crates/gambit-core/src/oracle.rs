use async_trait::async_trait;

use crate::errors::OracleError;

/// Why the previous suggestion was refused, fed back on the next request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub failed_move: String,
    pub reason: String,
}

impl Feedback {
    /// Render as the instruction appended to the oracle prompt.
    pub fn describe(&self, moves: &[String]) -> String {
        format!(
            "Your previous suggested move {} (for move list: [{}]) was rejected by the server: {}. \
             Please provide a different valid UCI move.",
            self.failed_move,
            moves.join(" "),
            self.reason
        )
    }
}

/// External move recommender.
///
/// Returns the raw suggestion text; shape validation is the caller's job
/// (see [`crate::MoveToken::parse`]).
#[async_trait]
pub trait MoveOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn suggest(
        &self,
        moves: &[String],
        feedback: Option<&Feedback>,
    ) -> Result<String, OracleError>;
}
