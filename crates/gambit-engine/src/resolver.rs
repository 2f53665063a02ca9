use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use gambit_core::errors::{OracleError, TransportError};
use gambit_core::game::{MoveToken, Side};
use gambit_core::ids::SessionId;
use gambit_core::oracle::{Feedback, MoveOracle};
use gambit_core::transport::Transport;
use gambit_telemetry::MetricsRecorder;

/// How one turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    Accepted { mv: String, attempts: u32 },
    /// No usable suggestion; the turn is reconsidered on the next update.
    Skipped { reason: OracleError, attempts: u32 },
    /// Every submission was rejected as illegal.
    Exhausted { attempts: u32 },
    /// A rejection outside the illegal-move vocabulary.
    Fatal { error: TransportError, attempts: u32 },
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Skipped { .. } => "skipped",
            Self::Exhausted { .. } => "exhausted",
            Self::Fatal { .. } => "fatal",
        }
    }

    /// Number of submissions made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Accepted { attempts, .. }
            | Self::Skipped { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::Fatal { attempts, .. } => *attempts,
        }
    }
}

/// Turns oracle suggestions into an accepted move with bounded, classified retries.
pub struct MoveResolver {
    transport: Arc<dyn Transport>,
    oracle: Arc<dyn MoveOracle>,
    metrics: Arc<MetricsRecorder>,
    opening_move: String,
    max_attempts: u32,
}

impl MoveResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        oracle: Arc<dyn MoveOracle>,
        metrics: Arc<MetricsRecorder>,
        opening_move: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport,
            oracle,
            metrics,
            opening_move: opening_move.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Play one turn. Callers only invoke this when it is `side`'s move.
    pub async fn resolve(&self, session: &SessionId, moves: &[String], side: Side) -> TurnOutcome {
        let mut candidate = if moves.is_empty() && side.moves_first() {
            info!(session_id = %session, mv = %self.opening_move, "playing opening move");
            self.opening_move.clone()
        } else {
            match self.suggest(session, moves, None).await {
                Ok(mv) => mv,
                Err(reason) => return self.skip(session, reason, 0),
            }
        };

        for attempt in 1..=self.max_attempts {
            info!(session_id = %session, attempt, mv = %candidate, moves = moves.len(), "submitting move");
            let rejection = match self.transport.submit_move(session, &candidate).await {
                Ok(()) => {
                    info!(session_id = %session, attempt, mv = %candidate, "move accepted");
                    self.record_submission("accepted");
                    return TurnOutcome::Accepted {
                        mv: candidate,
                        attempts: attempt,
                    };
                }
                Err(e) => e,
            };

            if !rejection.is_illegal_move() {
                warn!(
                    session_id = %session,
                    attempt,
                    mv = %candidate,
                    error = %rejection,
                    kind = rejection.error_kind(),
                    "move submission failed, not retrying"
                );
                self.record_submission("fatal");
                return TurnOutcome::Fatal {
                    error: rejection,
                    attempts: attempt,
                };
            }

            self.record_submission("illegal");
            warn!(
                session_id = %session,
                attempt,
                max_attempts = self.max_attempts,
                mv = %candidate,
                error = %rejection,
                "move rejected as illegal"
            );
            if attempt == self.max_attempts {
                break;
            }

            let feedback = Feedback {
                failed_move: candidate,
                reason: rejection.to_string(),
            };
            candidate = match self.suggest(session, moves, Some(&feedback)).await {
                Ok(mv) => mv,
                Err(reason) => return self.skip(session, reason, attempt),
            };
        }

        warn!(
            session_id = %session,
            attempts = self.max_attempts,
            moves = moves.len(),
            "no legal move after all attempts, waiting for next update"
        );
        TurnOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }

    /// Ask the oracle and check the suggestion's shape.
    async fn suggest(
        &self,
        session: &SessionId,
        moves: &[String],
        feedback: Option<&Feedback>,
    ) -> Result<String, OracleError> {
        let started = Instant::now();
        let result = self
            .oracle
            .suggest(moves, feedback)
            .await
            .and_then(|raw| MoveToken::parse(&raw))
            .map(|token| token.as_str().to_string());
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.error_kind(),
        };
        let labels = [("oracle", self.oracle.name())];
        self.metrics
            .histogram_observe("oracle_latency_ms", &labels, elapsed_ms);
        self.metrics
            .counter_inc("oracle_requests", &[("outcome", outcome)], 1);

        match &result {
            Ok(mv) => debug!(
                session_id = %session,
                mv = %mv,
                retry = feedback.is_some(),
                latency_ms = elapsed_ms as u64,
                "oracle suggested move"
            ),
            Err(e) => warn!(session_id = %session, error = %e, "oracle gave no usable move"),
        }
        result
    }

    fn skip(&self, session: &SessionId, reason: OracleError, attempts: u32) -> TurnOutcome {
        info!(session_id = %session, attempts, reason = %reason, "skipping turn");
        TurnOutcome::Skipped { reason, attempts }
    }

    fn record_submission(&self, outcome: &str) {
        self.metrics
            .counter_inc("moves_submitted", &[("outcome", outcome)], 1);
    }
}
