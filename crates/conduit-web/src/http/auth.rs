//! `/auth/*` (§4.1, §6): login, logout, change-password, and the
//! token-identity echo used by the front-end to hydrate its session.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use conduit_core::error::ConduitError;
use conduit_identity::auth;
use conduit_identity::users;

use crate::app::AppState;
use crate::error::WebResult;
use crate::http::authenticate;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserSummary {
    email: String,
    role: &'static str,
    require_password_change: bool,
}

pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> WebResult<Json<Value>> {
    let conn = state.identity_db.lock().unwrap();
    let (token, user) = auth::login(
        &conn,
        &state.config.auth.jwt_secret,
        state.config.auth.token_lifetime_secs,
        &req.email,
        &req.password,
    )?;
    let summary = UserSummary {
        email: user.email,
        role: user.role.as_str(),
        require_password_change: user.require_password_change,
    };
    Ok(Json(json!({"token": token, "user": summary})))
}

/// Stateless JWTs mean there is nothing to revoke server-side; the client
/// discards its token. Kept as a real endpoint so the front-end has a
/// symmetrical login/logout pair and a place to hang future session
/// invalidation.
pub async fn logout() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let conn = state.identity_db.lock().unwrap();
    auth::change_password(&conn, &claims.sub, &req.current_password, &req.new_password)?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> WebResult<Json<UserSummary>> {
    let claims = authenticate(&state, &headers)?;
    let conn = state.identity_db.lock().unwrap();
    let user = users::get_web_user(&conn, &claims.sub)?
        .ok_or_else(|| ConduitError::NotFound(claims.sub.clone()))?;
    Ok(Json(UserSummary {
        email: user.email,
        role: user.role.as_str(),
        require_password_change: user.require_password_change,
    }))
}
