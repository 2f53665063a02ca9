pub mod config;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod registry;
pub mod resilience;
pub mod resolver;
pub mod session;
pub mod testing;
pub mod worker;

pub use config::EngineConfig;
pub use dispatcher::LifecycleDispatcher;
pub use error::EngineError;
pub use registry::{Registration, SessionRegistry};
pub use resilience::{Disconnect, ReconnectPolicy, Sleeper, TokioSleeper};
pub use resolver::{MoveResolver, TurnOutcome};
pub use session::{OpponentPresence, Session, SessionState, TerminationSignal};
pub use worker::{SessionEnd, SessionWorker, WorkerContext};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gambit_core::oracle::MoveOracle;
use gambit_core::transport::{Identity, Transport};
use gambit_telemetry::MetricsRecorder;

/// Wires registry, workers and dispatcher together.
pub struct Engine {
    workers: Arc<WorkerContext>,
    registry: Arc<SessionRegistry>,
    policy: ReconnectPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Engine {
    pub fn new(
        transport: Arc<dyn Transport>,
        oracle: Arc<dyn MoveOracle>,
        identity: &Identity,
        metrics: Arc<MetricsRecorder>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let resolver = MoveResolver::new(
            Arc::clone(&transport),
            oracle,
            Arc::clone(&metrics),
            config.opening_move,
            config.max_attempts,
        );
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&metrics)));
        Ok(Self {
            workers: Arc::new(WorkerContext {
                transport,
                resolver,
                metrics,
                local_id: identity.id.clone(),
            }),
            registry,
            policy: config.reconnect,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn dispatcher(&self) -> LifecycleDispatcher {
        LifecycleDispatcher::new(
            Arc::clone(&self.workers),
            Arc::clone(&self.registry),
            self.policy,
            Arc::clone(&self.sleeper),
        )
    }

    /// Run the dispatcher until `shutdown`, then close every active session.
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let dispatcher = self.dispatcher();
        let registry = self.registry();
        tokio::spawn(async move {
            dispatcher.run(shutdown).await;
            let closed = registry.terminate_all();
            info!(closed, "closed active sessions");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, RecordingSleeper, StreamScript};
    use gambit_oracle::mock::MockOracle;

    fn identity() -> Identity {
        Identity {
            id: "me".into(),
            username: "Me".into(),
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let result = Engine::new(
            Arc::new(MockTransport::new("me")),
            Arc::new(MockOracle::moves(&[])),
            &identity(),
            Arc::new(MetricsRecorder::new()),
            EngineConfig {
                opening_move: "".into(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn shutdown_closes_active_sessions() {
        let transport = Arc::new(
            MockTransport::new("me")
                .with_lifecycle(StreamScript::hold(&[r#"{"type":"gameStart","game":{"id":"g1"}}"#]))
                .with_session("g1", StreamScript::hold(&[])),
        );
        let engine = Engine::new(
            transport.clone(),
            Arc::new(MockOracle::moves(&[])),
            &identity(),
            Arc::new(MetricsRecorder::new()),
            EngineConfig::default(),
        )
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::new()));
        let registry = engine.registry();
        let shutdown = CancellationToken::new();
        let handle = engine.spawn(shutdown.clone());

        for _ in 0..1000 {
            if transport.session_opens().len() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.len(), 1);
        let session = registry.get(&gambit_core::ids::SessionId::from_raw("g1")).unwrap();

        shutdown.cancel();
        handle.await.unwrap();
        assert!(session.termination().is_closed());
        for _ in 0..1000 {
            if registry.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(registry.is_empty());
    }
}
