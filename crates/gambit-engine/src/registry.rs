use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use gambit_core::ids::SessionId;
use gambit_telemetry::MetricsRecorder;

use crate::session::Session;

/// Process-wide map of active sessions.
///
/// An entry exists exactly while its worker holds the [`Registration`].
/// No I/O happens under the lock.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    metrics: Arc<MetricsRecorder>,
}

impl SessionRegistry {
    pub fn new(metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Insert a fresh session unless one with this id is already active.
    pub fn try_register(self: &Arc<Self>, id: &SessionId) -> Option<Registration> {
        let session = {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(id) {
                return None;
            }
            let session = Arc::new(Session::new(id.clone()));
            sessions.insert(id.clone(), Arc::clone(&session));
            self.publish_size(sessions.len());
            session
        };
        info!(session_id = %id, "session registered");
        Some(Registration {
            registry: Arc::clone(self),
            session,
        })
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.lock().keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Close every active session. Returns how many this call closed.
    pub fn terminate_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.lock().values().cloned().collect();
        sessions.iter().filter(|s| s.terminate()).count()
    }

    /// Remove `session` if it is still the registered entry for its id.
    fn remove(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.lock();
        let owned = sessions
            .get(session.id())
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if owned {
            sessions.remove(session.id());
            self.publish_size(sessions.len());
        }
        owned
    }

    fn publish_size(&self, size: usize) {
        self.metrics.gauge_set("active_sessions", &[], size as f64);
    }
}

/// Ownership of one registry entry. Dropping it deregisters the session.
pub struct Registration {
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
}

impl Registration {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.remove(&self.session) {
            info!(session_id = %self.session.id(), "session deregistered");
        } else {
            debug!(session_id = %self.session.id(), "session already absent from registry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(Arc::new(MetricsRecorder::new())))
    }

    #[test]
    fn register_is_idempotent() {
        let registry = registry();
        let id = SessionId::from_raw("g1");
        let first = registry.try_register(&id);
        assert!(first.is_some());
        assert!(registry.try_register(&id).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&id));
    }

    #[test]
    fn dropping_registration_removes_entry() {
        let registry = registry();
        let id = SessionId::from_raw("g1");
        let reg = registry.try_register(&id).unwrap();
        assert_eq!(reg.session().id(), &id);
        drop(reg);
        assert!(registry.is_empty());
        // Free for a new worker afterwards
        assert!(registry.try_register(&id).is_some());
    }

    #[test]
    fn gauge_tracks_size() {
        let metrics = Arc::new(MetricsRecorder::new());
        let registry = Arc::new(SessionRegistry::new(metrics.clone()));
        let a = registry.try_register(&SessionId::from_raw("a")).unwrap();
        let _b = registry.try_register(&SessionId::from_raw("b")).unwrap();
        assert_eq!(metrics.gauge_get("active_sessions", &[]), 2.0);
        drop(a);
        assert_eq!(metrics.gauge_get("active_sessions", &[]), 1.0);
        assert_eq!(registry.ids(), vec![SessionId::from_raw("b")]);
    }

    #[test]
    fn terminate_all_closes_each_once() {
        let registry = registry();
        let a = registry.try_register(&SessionId::from_raw("a")).unwrap();
        let b = registry.try_register(&SessionId::from_raw("b")).unwrap();
        a.session().terminate();
        assert_eq!(registry.terminate_all(), 1);
        assert!(b.session().is_terminated());
        assert_eq!(registry.terminate_all(), 0);
        // Termination alone does not deregister
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn lookup_returns_same_session() {
        let registry = registry();
        let id = SessionId::from_raw("g9");
        let reg = registry.try_register(&id).unwrap();
        let found = registry.get(&id).unwrap();
        assert!(Arc::ptr_eq(&found, reg.session()));
        assert!(registry.get(&SessionId::from_raw("nope")).is_none());
    }
}
