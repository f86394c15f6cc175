//! Explicit login sessions.
//!
//! A `Session` is created on login/signup, destroyed on logout and passed by
//! value/reference to whatever needs the current user. There is no ambient
//! "current user" anywhere else.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use campuscart_core::{SessionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The authenticated user for this session.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last time the session was resolved to its user.
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }
}

/// In-process session table.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, user_id: UserId) -> Session {
        let now = Utc::now();
        let session = Session {
            id: SessionId::generate(),
            user_id,
            created_at: now,
            last_seen: now,
        };
        match self.inner.write() {
            Ok(mut map) => {
                map.insert(session.id.clone(), session.clone());
            }
            Err(_) => tracing::error!("session registry lock poisoned; session not stored"),
        }
        tracing::debug!(session_id = %session.id, user_id = %session.user_id, "session created");
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.inner.read().ok()?.get(id).cloned()
    }

    /// The user behind a session handle; `None` when logged out or expired.
    /// Marks the session as active.
    pub fn current_user(&self, id: &SessionId) -> Option<UserId> {
        let mut map = self.inner.write().ok()?;
        let session = map.get_mut(id)?;
        session.last_seen = Utc::now();
        Some(session.user_id.clone())
    }

    /// Returns the destroyed session, if it existed.
    pub fn destroy(&self, id: &SessionId) -> Option<Session> {
        let removed = self.inner.write().ok()?.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "session destroyed");
        }
        removed
    }

    /// Destroy every session not seen since `cutoff`; returns their ids.
    pub fn expire_idle(&self, cutoff: DateTime<Utc>) -> Vec<SessionId> {
        let Ok(mut map) = self.inner.write() else {
            tracing::error!("session registry lock poisoned; nothing expired");
            return Vec::new();
        };
        let expired: Vec<SessionId> = map
            .values()
            .filter(|s| s.last_seen < cutoff)
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            map.remove(id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "idle sessions expired");
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_create_get_destroy() {
        let registry = SessionRegistry::new();
        let user = UserId::parse("usr_1").unwrap();

        let session = registry.create(user.clone());
        assert!(session.id().as_str().starts_with(SessionId::PREFIX));
        assert_eq!(registry.current_user(session.id()), Some(user));

        assert!(registry.destroy(session.id()).is_some());
        assert_eq!(registry.current_user(session.id()), None);
        assert!(registry.destroy(session.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.create(UserId::parse("usr_a").unwrap());
        let b = registry.create(UserId::parse("usr_a").unwrap());
        assert_ne!(a.id(), b.id());

        registry.destroy(a.id());
        assert!(registry.get(b.id()).is_some());
    }

    #[test]
    fn idle_sessions_expire_and_active_ones_survive() {
        let registry = SessionRegistry::new();
        let idle = registry.create(UserId::parse("usr_idle").unwrap());
        let cutoff = Utc::now() + chrono::Duration::milliseconds(1);
        let active = registry.create(UserId::parse("usr_active").unwrap());
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(registry.current_user(active.id()).is_some());

        let expired = registry.expire_idle(cutoff);
        assert_eq!(expired, vec![idle.id().clone()]);
        assert_eq!(registry.current_user(idle.id()), None);
        assert!(registry.get(active.id()).unwrap().last_seen() >= cutoff);
        assert_eq!(registry.len(), 1);
    }
}
