use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use gambit_core::events::SessionEvent;
use gambit_core::game::TerminalStatus;
use gambit_core::ids::SessionId;
use gambit_core::transport::Transport;
use gambit_telemetry::MetricsRecorder;

use crate::error::EngineError;
use crate::registry::Registration;
use crate::resolver::MoveResolver;
use crate::session::{OpponentPresence, Session, Turn};

/// Shared by every session worker.
pub struct WorkerContext {
    pub transport: Arc<dyn Transport>,
    pub resolver: MoveResolver,
    pub metrics: Arc<MetricsRecorder>,
    /// Account id of the local bot, used to find our side.
    pub local_id: String,
}

/// Why a worker returned normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Finished(TerminalStatus),
    /// End of input or read error on the session feed.
    StreamClosed,
    /// The termination signal was closed from outside.
    Terminated,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished(_) => "finished",
            Self::StreamClosed => "stream_closed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished(status) => write!(f, "finished ({status})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// What to do after applying one record.
enum Step {
    Continue,
    Play(Turn),
    End(Result<SessionEnd, EngineError>),
}

/// Drives one session from its feed until it ends. Owns the registry entry.
pub struct SessionWorker {
    ctx: Arc<WorkerContext>,
    registration: Registration,
}

impl SessionWorker {
    pub fn new(ctx: Arc<WorkerContext>, registration: Registration) -> Self {
        Self { ctx, registration }
    }

    pub fn session_id(&self) -> &SessionId {
        self.registration.session().id()
    }

    /// Consume the feed. The session is deregistered when this returns.
    pub async fn run(self) -> Result<SessionEnd, EngineError> {
        let session = Arc::clone(self.registration.session());
        info!(session_id = %session.id(), "session worker started");
        self.ctx.metrics.counter_inc("sessions_started", &[], 1);

        let result = self.drive(&session).await;

        let reason = match &result {
            Ok(end) => end.as_str(),
            Err(e) => e.error_kind(),
        };
        self.ctx
            .metrics
            .counter_inc("sessions_finished", &[("reason", reason)], 1);
        match &result {
            Ok(end) => info!(session_id = %session.id(), end = %end, "session worker finished"),
            Err(e) => warn!(session_id = %session.id(), error = %e, "session worker failed"),
        }
        result
    }

    async fn drive(&self, session: &Session) -> Result<SessionEnd, EngineError> {
        let id = session.id();
        let termination = session.termination();

        let mut stream = match self.ctx.transport.session_stream(id).await {
            Ok(stream) => stream,
            Err(e) => {
                session.terminate();
                return Err(e.into());
            }
        };

        loop {
            if session.is_terminated() {
                return Ok(SessionEnd::Terminated);
            }

            let next = tokio::select! {
                biased;
                _ = termination.closed() => return Ok(SessionEnd::Terminated),
                next = stream.next() => next,
            };

            let line = match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!(session_id = %id, error = %e, "session feed read error");
                    return Ok(self.vanish(session));
                }
                None => {
                    info!(session_id = %id, "session feed closed by server");
                    return Ok(self.vanish(session));
                }
            };

            let event = match SessionEvent::decode(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(session_id = %id, error = %e, line = %line, "ignoring undecodable session record");
                    continue;
                }
            };

            match self.apply(session, event) {
                Step::Continue => {}
                Step::Play(turn) => {
                    let outcome = self.ctx.resolver.resolve(id, &turn.moves, turn.side).await;
                    debug!(session_id = %id, outcome = outcome.as_str(), attempts = outcome.attempts(), "turn resolved");
                }
                Step::End(end) => return end,
            }
        }
    }

    /// Apply one record under the session lock.
    fn apply(&self, session: &Session, event: SessionEvent) -> Step {
        let id = session.id();
        match event {
            SessionEvent::Full(full) => {
                let Some(state) = full.state.clone() else {
                    warn!(session_id = %id, "full-state record without state");
                    session.terminate();
                    return Step::End(Err(EngineError::MalformedSession(
                        "full-state record without state".into(),
                    )));
                };
                let detected = full.side_for(&self.ctx.local_id);
                if detected.is_none() {
                    warn!(
                        session_id = %id,
                        local_id = %self.ctx.local_id,
                        white = ?full.white_id,
                        black = ?full.black_id,
                        "could not determine our side"
                    );
                }
                let (side, move_count, turn) = session.update(|s| {
                    if s.side.is_none() {
                        s.side = detected;
                    }
                    s.moves = state.moves;
                    (s.side, s.moves.len(), s.pending_turn())
                });
                info!(session_id = %id, side = ?side, moves = move_count, "session joined");
                self.turn_step(session, turn)
            }
            SessionEvent::State(state) => {
                let terminal = state.terminal();
                let turn = session.update(|s| {
                    s.moves = state.moves;
                    s.pending_turn()
                });
                if let Some(status) = terminal {
                    info!(session_id = %id, status = %status, "session over");
                    session.terminate();
                    return Step::End(Ok(SessionEnd::Finished(status)));
                }
                self.turn_step(session, turn)
            }
            SessionEvent::Chat {
                username,
                room,
                text,
            } => {
                info!(session_id = %id, username = %username, room = %room, text = %text, "chat");
                Step::Continue
            }
            SessionEvent::OpponentGone {
                gone,
                claim_win_in_seconds,
            } => {
                let presence = if gone {
                    OpponentPresence::Gone
                } else {
                    OpponentPresence::Present
                };
                session.update(|s| s.opponent = presence);
                info!(
                    session_id = %id,
                    gone,
                    claim_win_in_seconds = ?claim_win_in_seconds,
                    "opponent presence changed"
                );
                Step::Continue
            }
            SessionEvent::Unknown { tag } => {
                debug!(session_id = %id, tag = %tag, "unhandled session record");
                Step::Continue
            }
        }
    }

    fn turn_step(&self, session: &Session, turn: Option<Turn>) -> Step {
        match turn {
            Some(turn) => Step::Play(turn),
            None => {
                let snap = session.snapshot();
                debug!(
                    session_id = %session.id(),
                    side = ?snap.side,
                    to_move = %snap.side_to_move(),
                    moves = snap.moves.len(),
                    "not our turn"
                );
                Step::Continue
            }
        }
    }

    fn vanish(&self, session: &Session) -> SessionEnd {
        if session.terminate_vanished() {
            info!(session_id = %session.id(), "feed ended unexpectedly, opponent presumed gone");
            SessionEnd::StreamClosed
        } else {
            SessionEnd::Terminated
        }
    }
}
