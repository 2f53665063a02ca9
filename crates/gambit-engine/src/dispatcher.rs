use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gambit_core::events::{Challenge, LifecycleEvent};
use gambit_core::ids::SessionId;
use gambit_core::transport::Transport;
use gambit_telemetry::MetricsRecorder;

use crate::policy::{self, ChallengeDecision};
use crate::registry::SessionRegistry;
use crate::resilience::{Disconnect, ReconnectPolicy, Sleeper};
use crate::worker::{SessionWorker, WorkerContext};

/// Keeps the account-wide feed open and fans its records out.
pub struct LifecycleDispatcher {
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsRecorder>,
    workers: Arc<WorkerContext>,
    registry: Arc<SessionRegistry>,
    policy: ReconnectPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl LifecycleDispatcher {
    pub fn new(
        workers: Arc<WorkerContext>,
        registry: Arc<SessionRegistry>,
        policy: ReconnectPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport: Arc::clone(&workers.transport),
            metrics: Arc::clone(&workers.metrics),
            workers,
            registry,
            policy,
            sleeper,
        }
    }

    /// Reconnect forever until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("lifecycle dispatcher started");
        while !shutdown.is_cancelled() {
            let Some(cause) = self.run_once(&shutdown).await else {
                break;
            };
            let delay = self.policy.delay_for(cause);
            self.metrics
                .counter_inc("lifecycle_reconnects", &[("cause", cause.as_str())], 1);
            warn!(cause = %cause, delay_secs = delay.as_secs(), "lifecycle feed lost, reconnecting");

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.sleeper.sleep(delay) => {}
            }
        }
        info!("lifecycle dispatcher stopped");
    }

    /// One connection's worth of records. `None` means shutdown was requested.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> Option<Disconnect> {
        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return None,
            opened = self.transport.lifecycle_stream() => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "could not open lifecycle feed");
                return Some(Disconnect::ConnectFailed);
            }
        };
        info!("lifecycle feed connected");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(line)) => {
                    self.handle_record(&line);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "lifecycle feed read error");
                    return Some(Disconnect::ReadError);
                }
                None => {
                    info!("lifecycle feed closed by server");
                    return Some(Disconnect::Closed);
                }
            }
        }
    }

    /// Act on one raw record. Returns the task spawned for it, if any.
    pub fn handle_record(&self, line: &str) -> Option<JoinHandle<()>> {
        let event = match LifecycleEvent::decode(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, line, "ignoring undecodable lifecycle record");
                return None;
            }
        };
        match event {
            LifecycleEvent::ChallengeCreated(challenge) => Some(self.on_challenge(challenge)),
            LifecycleEvent::ChallengeUpdate { id, status } => {
                debug!(challenge_id = %id, status = %status, "challenge update");
                None
            }
            LifecycleEvent::SessionStart(id) => self.start_session(id),
            LifecycleEvent::Unknown { tag } => {
                debug!(tag = %tag, "unhandled lifecycle record");
                None
            }
        }
    }

    /// Spawn a worker unless the session is already active.
    pub fn start_session(&self, id: SessionId) -> Option<JoinHandle<()>> {
        let Some(registration) = self.registry.try_register(&id) else {
            debug!(session_id = %id, "session already active, ignoring start");
            return None;
        };
        let worker = SessionWorker::new(Arc::clone(&self.workers), registration);
        Some(tokio::spawn(async move {
            // Outcome is logged by the worker
            let _ = worker.run().await;
        }))
    }

    /// Accept or decline, fire-and-forget.
    fn on_challenge(&self, challenge: Challenge) -> JoinHandle<()> {
        let decision = policy::evaluate(&challenge, &self.workers.local_id);
        info!(
            challenge_id = %challenge.id,
            variant = ?challenge.variant,
            challenger = ?challenge.challenger.as_ref().and_then(|c| c.id.as_deref()),
            decision = %decision,
            "challenge received"
        );

        let transport = Arc::clone(&self.transport);
        let metrics = Arc::clone(&self.metrics);
        let id = challenge.id;
        tokio::spawn(async move {
            let result = match decision {
                ChallengeDecision::Accept => transport.accept_challenge(&id).await,
                ChallengeDecision::Decline(reason) => {
                    transport.decline_challenge(&id, reason).await
                }
            };
            metrics.counter_inc("challenges", &[("decision", decision.as_str())], 1);
            match result {
                Ok(()) => info!(challenge_id = %id, decision = %decision, "challenge answered"),
                Err(e) => warn!(challenge_id = %id, decision = %decision, error = %e, "challenge answer failed"),
            }
        })
    }
}
