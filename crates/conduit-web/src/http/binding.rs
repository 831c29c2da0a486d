//! `/binding/*` (§4.1 binding protocol step 1, §6).

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use conduit_core::config::BINDING_CODE_TTL_SECS;
use conduit_identity::{binding, users};

use crate::app::AppState;
use crate::error::WebResult;
use crate::http::authenticate;

pub async fn generate_code(State(state): State<Arc<AppState>>, headers: HeaderMap) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let conn = state.identity_db.lock().unwrap();
    let code = binding::generate_code(&conn, &claims.sub)?;
    Ok(Json(json!({
        "code": code.code,
        "expires_at": code.expires_at,
        "expires_in": BINDING_CODE_TTL_SECS,
    })))
}

pub async fn status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let conn = state.identity_db.lock().unwrap();
    let unified = users::resolve_or_create_by_email(&conn, &claims.sub)?;
    Ok(Json(json!({
        "binding_status": unified.binding_status.as_str(),
        "telegram_chat_id": unified.telegram_chat_id,
    })))
}
