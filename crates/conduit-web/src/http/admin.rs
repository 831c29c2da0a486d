//! `/admin/*` (§6): user provisioning and the binding roster, gated on
//! `Claims.role == "admin"`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_core::error::ConduitError;
use conduit_identity::types::WebRole;
use conduit_identity::{auth, users};

use crate::app::AppState;
use crate::error::WebResult;
use crate::http::{authenticate, require_admin};

fn parse_role(role: &str) -> WebResult<WebRole> {
    match role {
        "admin" => Ok(WebRole::Admin),
        "user" => Ok(WebRole::User),
        other => Err(ConduitError::InvalidInput(format!("unknown role: {other}")).into()),
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    require_admin(&claims)?;
    auth::validate_password_strength(&req.password)?;
    let role = req.role.as_deref().map(parse_role).transpose()?.unwrap_or_default();
    let hash = auth::hash_password(&req.password)?;
    let conn = state.identity_db.lock().unwrap();
    let user = users::create_web_user(&conn, &req.email, &hash, role)?;
    Ok(Json(json!({"email": user.email, "role": user.role.as_str()})))
}

pub async fn list_users(State(state): State<Arc<AppState>>, headers: HeaderMap) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    require_admin(&claims)?;
    let conn = state.identity_db.lock().unwrap();
    let users = users::list_web_users(&conn)?;
    Ok(Json(json!({"users": users})))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    require_admin(&claims)?;
    auth::validate_password_strength(&req.new_password)?;
    let hash = auth::hash_password(&req.new_password)?;
    let conn = state.identity_db.lock().unwrap();
    users::set_password_hash(&conn, &email, &hash)?;
    Ok(Json(json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

pub async fn set_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    require_admin(&claims)?;
    let role = parse_role(&req.role)?;
    let conn = state.identity_db.lock().unwrap();
    users::set_role(&conn, &email, role)?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn list_bindings(State(state): State<Arc<AppState>>, headers: HeaderMap) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    require_admin(&claims)?;
    let conn = state.identity_db.lock().unwrap();
    let bound = users::list_bound(&conn)?;
    Ok(Json(json!({"bindings": bound})))
}
