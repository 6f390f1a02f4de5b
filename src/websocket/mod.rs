pub mod events;
pub mod handlers;

use axum::extract::ws::Message as WsMessage;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// One connected websocket. The sender feeds the connection's outbound pump;
/// dropping it closes the socket from our side.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub tx: UnboundedSender<WsMessage>,
}

/// In-process registry of live websocket sessions, keyed by user id. A user
/// may hold several sessions at once (multiple devices or tabs); all of them
/// receive every event addressed to the user.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Vec<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: Uuid, session: Session) {
        self.sessions.entry(user_id).or_default().push(session);
        tracing::debug!(user_id = %user_id, "websocket session registered");
    }

    /// Removes one session; the user's entry is dropped when it was the last.
    pub fn unregister(&self, user_id: Uuid, session_id: Uuid) {
        let now_empty = match self.sessions.get_mut(&user_id) {
            Some(mut entry) => {
                entry.retain(|s| s.id != session_id);
                entry.is_empty()
            }
            None => return,
        };
        // The guard is released above; removing under it would deadlock.
        if now_empty {
            self.sessions.remove_if(&user_id, |_, v| v.is_empty());
        }
        tracing::debug!(user_id = %user_id, "websocket session unregistered");
    }

    /// Snapshot of the user's live sessions. Cloned out so no map guard is
    /// held while the caller pushes frames.
    pub fn channels_for(&self, user_id: Uuid) -> Vec<Session> {
        self.sessions
            .get(&user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Total live sessions across all users.
    pub fn count(&self) -> usize {
        self.sessions.iter().map(|entry| entry.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session() -> Session {
        let (tx, _rx) = mpsc::unbounded_channel();
        Session {
            id: Uuid::new_v4(),
            tx,
        }
    }

    #[test]
    fn register_and_unregister() {
        let registry = SessionRegistry::new();
        let user = Uuid::new_v4();
        let s1 = session();
        let s2 = session();
        registry.register(user, s1.clone());
        registry.register(user, s2.clone());
        assert_eq!(registry.channels_for(user).len(), 2);
        assert_eq!(registry.count(), 2);

        registry.unregister(user, s1.id);
        assert_eq!(registry.channels_for(user).len(), 1);

        registry.unregister(user, s2.id);
        assert!(registry.channels_for(user).is_empty());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn unregister_unknown_user_is_noop() {
        let registry = SessionRegistry::new();
        registry.unregister(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn concurrent_register_unregister_keeps_count_exact() {
        let registry = std::sync::Arc::new(SessionRegistry::new());
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        std::thread::scope(|scope| {
            for user in &users {
                let registry = registry.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        let s = session();
                        let id = s.id;
                        registry.register(*user, s);
                        registry.unregister(*user, id);
                    }
                    registry.register(*user, session());
                });
            }
        });

        assert_eq!(registry.count(), users.len());
        for user in &users {
            assert_eq!(registry.channels_for(*user).len(), 1);
        }
    }
}
