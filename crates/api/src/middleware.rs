use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use campuscart_auth::SessionRegistry;
use campuscart_core::SessionId;

use crate::app::errors;
use crate::context::SessionContext;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct SessionState {
    pub sessions: Arc<SessionRegistry>,
}

pub async fn session_middleware(
    State(state): State<SessionState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(session_id) = extract_session_id(req.headers()) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "missing session");
    };

    let Some(user_id) = state.sessions.current_user(&session_id) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "unknown session");
    };

    req.extensions_mut().insert(SessionContext::new(session_id, user_id));

    next.run(req).await
}

fn extract_session_id(headers: &HeaderMap) -> Option<SessionId> {
    let raw = headers.get(SESSION_HEADER)?.to_str().ok()?;
    SessionId::parse(raw).ok()
}
