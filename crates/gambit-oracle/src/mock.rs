use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use gambit_core::errors::OracleError;
use gambit_core::oracle::{Feedback, MoveOracle};

/// Pre-programmed suggestions for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockSuggestion {
    Move(String),
    Error(OracleError),
}

impl MockSuggestion {
    pub fn mv(s: &str) -> Self {
        Self::Move(s.to_string())
    }
}

/// One recorded `suggest` call.
#[derive(Clone, Debug)]
pub struct MockCall {
    pub moves: Vec<String>,
    pub feedback: Option<Feedback>,
}

/// Oracle that returns scripted suggestions in sequence.
pub struct MockOracle {
    responses: Vec<MockSuggestion>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<MockCall>>,
}

impl MockOracle {
    pub fn new(responses: Vec<MockSuggestion>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: oracle answering with the given moves in order.
    pub fn moves(moves: &[&str]) -> Self {
        Self::new(moves.iter().map(|m| MockSuggestion::mv(m)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MoveOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn suggest(
        &self,
        moves: &[String],
        feedback: Option<&Feedback>,
    ) -> Result<String, OracleError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push(MockCall {
            moves: moves.to_vec(),
            feedback: feedback.cloned(),
        });

        match self.responses.get(idx) {
            Some(MockSuggestion::Move(m)) => Ok(m.clone()),
            Some(MockSuggestion::Error(e)) => Err(e.clone()),
            None => Err(OracleError::Unavailable(format!(
                "MockOracle: no response configured for call {idx}"
            ))),
        }
    }
}
