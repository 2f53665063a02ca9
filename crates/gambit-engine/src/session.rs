use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use gambit_core::game::Side;
use gambit_core::ids::SessionId;

/// Whether the remote opponent is still connected. Advisory only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpponentPresence {
    #[default]
    Present,
    Gone,
}

/// Mutable fields of one session. Only the owning worker writes them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub moves: Vec<String>,
    pub side: Option<Side>,
    pub opponent: OpponentPresence,
}

/// Snapshot handed to move resolution once the lock is released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub side: Side,
    pub moves: Vec<String>,
}

impl SessionState {
    pub fn side_to_move(&self) -> Side {
        Side::to_move(self.moves.len())
    }

    /// The turn to play now, if our side is known and it is our move.
    pub fn pending_turn(&self) -> Option<Turn> {
        let side = self.side?;
        (side == self.side_to_move()).then(|| Turn {
            side,
            moves: self.moves.clone(),
        })
    }
}

struct Inner {
    state: SessionState,
    terminated: bool,
}

/// Read-only view of a session's one-shot termination.
#[derive(Clone, Debug)]
pub struct TerminationSignal {
    token: CancellationToken,
}

impl TerminationSignal {
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the session has been terminated.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

/// One active game.
pub struct Session {
    id: SessionId,
    inner: Mutex<Inner>,
    token: CancellationToken,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            inner: Mutex::new(Inner {
                state: SessionState::default(),
                terminated: false,
            }),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    /// Run `f` against the state under the session lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.inner.lock().state)
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lock().terminated
    }

    pub fn termination(&self) -> TerminationSignal {
        TerminationSignal {
            token: self.token.clone(),
        }
    }

    /// Close the termination signal. Returns `true` only for the call that closed it.
    pub fn terminate(&self) -> bool {
        self.close_with(|_| {})
    }

    /// Close after the feed vanished: the opponent is presumed gone.
    pub fn terminate_vanished(&self) -> bool {
        self.close_with(|state| state.opponent = OpponentPresence::Gone)
    }

    fn close_with(&self, mark: impl FnOnce(&mut SessionState)) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.terminated {
                return false;
            }
            mark(&mut inner.state);
            inner.terminated = true;
        }
        self.token.cancel();
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
