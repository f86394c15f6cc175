use campuscart_core::{SessionId, UserId};

/// Session context for a request.
///
/// Inserted by the session middleware; present on every cart/order route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: SessionId,
    user_id: UserId,
}

impl SessionContext {
    pub fn new(session_id: SessionId, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}
