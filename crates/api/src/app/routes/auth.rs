use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use campuscart_auth::{Credentials, IdentityOracle, NewAccount};
use campuscart_core::UserId;

use crate::app::{AppServices, dto, errors};
use crate::context::SessionContext;

fn start_session(services: &AppServices, user_id: UserId, status: StatusCode) -> axum::response::Response {
    let session = services.sessions.create(user_id);
    (
        status,
        Json(dto::SessionResponse {
            session_id: session.id().clone(),
            user_id: session.user_id().clone(),
        }),
    )
        .into_response()
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewAccount>,
) -> axum::response::Response {
    match services.identity.register(body).await {
        Ok(user_id) => start_session(&services, user_id, StatusCode::CREATED),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Credentials>,
) -> axum::response::Response {
    match services.identity.authenticate(&body).await {
        Ok(user_id) => start_session(&services, user_id, StatusCode::OK),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> StatusCode {
    services.sessions.destroy(session.session_id());
    services.discard_cart(session.session_id());
    StatusCode::NO_CONTENT
}
