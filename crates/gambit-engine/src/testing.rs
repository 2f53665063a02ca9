//! Scripted fakes for the engine's collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use gambit_core::errors::TransportError;
use gambit_core::ids::{ChallengeId, SessionId};
use gambit_core::transport::{DeclineReason, Identity, RecordStream, Transport};

use crate::resilience::Sleeper;

/// What a feed does when opened.
#[derive(Clone, Debug)]
pub enum StreamScript {
    /// Opening fails.
    Fail(TransportError),
    /// Yield the items, then end of input.
    Records(Vec<Result<String, TransportError>>),
    /// Yield the lines, then stay open without data.
    Hold(Vec<String>),
}

impl StreamScript {
    pub fn lines(lines: &[&str]) -> Self {
        Self::Records(lines.iter().map(|l| Ok(l.to_string())).collect())
    }

    pub fn hold(lines: &[&str]) -> Self {
        Self::Hold(lines.iter().map(|l| l.to_string()).collect())
    }
}

/// Transport with scripted feeds and submission results.
///
/// Unscripted submissions succeed; unscripted feeds fail to open.
pub struct MockTransport {
    identity: Identity,
    lifecycle: Mutex<VecDeque<StreamScript>>,
    sessions: Mutex<HashMap<SessionId, StreamScript>>,
    submit_results: Mutex<VecDeque<Result<(), TransportError>>>,
    submissions: Mutex<Vec<(SessionId, String)>>,
    accepted: Mutex<Vec<ChallengeId>>,
    declined: Mutex<Vec<(ChallengeId, DeclineReason)>>,
    session_opens: Mutex<Vec<SessionId>>,
    lifecycle_opens: AtomicUsize,
    records_read: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new(local_id: &str) -> Self {
        Self {
            identity: Identity {
                id: local_id.to_string(),
                username: local_id.to_string(),
            },
            lifecycle: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(HashMap::new()),
            submit_results: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
            declined: Mutex::new(Vec::new()),
            session_opens: Mutex::new(Vec::new()),
            lifecycle_opens: AtomicUsize::new(0),
            records_read: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue the script for the next lifecycle connection.
    pub fn with_lifecycle(self, script: StreamScript) -> Self {
        self.lifecycle.lock().push_back(script);
        self
    }

    pub fn with_session(self, id: &str, script: StreamScript) -> Self {
        self.sessions.lock().insert(SessionId::from_raw(id), script);
        self
    }

    pub fn with_submit_results(self, results: Vec<Result<(), TransportError>>) -> Self {
        self.submit_results.lock().extend(results);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn submissions(&self) -> Vec<(SessionId, String)> {
        self.submissions.lock().clone()
    }

    pub fn submitted_moves(&self) -> Vec<String> {
        self.submissions.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn accepted(&self) -> Vec<ChallengeId> {
        self.accepted.lock().clone()
    }

    pub fn declined(&self) -> Vec<(ChallengeId, DeclineReason)> {
        self.declined.lock().clone()
    }

    pub fn session_opens(&self) -> Vec<SessionId> {
        self.session_opens.lock().clone()
    }

    pub fn lifecycle_opens(&self) -> usize {
        self.lifecycle_opens.load(Ordering::SeqCst)
    }

    /// Items pulled from any feed so far.
    pub fn records_read(&self) -> usize {
        self.records_read.load(Ordering::SeqCst)
    }

    fn open(&self, script: Option<StreamScript>) -> Result<RecordStream, TransportError> {
        let counter = Arc::clone(&self.records_read);
        let count = move |_: &Result<String, TransportError>| {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        match script {
            None => Err(TransportError::Network("no stream scripted".into())),
            Some(StreamScript::Fail(e)) => Err(e),
            Some(StreamScript::Records(items)) => {
                Ok(Box::pin(futures::stream::iter(items).inspect(count)))
            }
            Some(StreamScript::Hold(lines)) => Ok(Box::pin(
                futures::stream::iter(lines.into_iter().map(Ok::<String, TransportError>))
                    .chain(futures::stream::pending())
                    .inspect(count),
            )),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_identity(&self) -> Result<Identity, TransportError> {
        Ok(self.identity.clone())
    }

    async fn accept_challenge(&self, id: &ChallengeId) -> Result<(), TransportError> {
        self.accepted.lock().push(id.clone());
        Ok(())
    }

    async fn decline_challenge(
        &self,
        id: &ChallengeId,
        reason: DeclineReason,
    ) -> Result<(), TransportError> {
        self.declined.lock().push((id.clone(), reason));
        Ok(())
    }

    async fn submit_move(&self, session: &SessionId, mv: &str) -> Result<(), TransportError> {
        self.submissions
            .lock()
            .push((session.clone(), mv.to_string()));
        self.submit_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn lifecycle_stream(&self) -> Result<RecordStream, TransportError> {
        self.lifecycle_opens.fetch_add(1, Ordering::SeqCst);
        let script = self.lifecycle.lock().pop_front();
        self.open(script)
    }

    async fn session_stream(&self, session: &SessionId) -> Result<RecordStream, TransportError> {
        self.session_opens.lock().push(session.clone());
        let script = self.sessions.lock().remove(session);
        self.open(script)
    }
}

/// Records requested delays instead of waiting. Optionally cancels a token
/// after a number of sleeps so a reconnect loop can be stopped.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
    stop: Option<(usize, CancellationToken)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_after(sleeps: usize, token: CancellationToken) -> Self {
        Self {
            slept: Mutex::new(Vec::new()),
            stop: Some((sleeps, token)),
        }
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut slept = self.slept.lock();
            slept.push(duration);
            slept.len()
        };
        if let Some((limit, token)) = &self.stop {
            if count >= *limit {
                token.cancel();
            }
        }
        tokio::task::yield_now().await;
    }
}
