//! `/conversations*` (§3 "Conversation", §6 CRUD surface).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_core::error::ConduitError;
use conduit_identity::users;

use crate::app::AppState;
use crate::error::WebResult;
use crate::http::authenticate;

const DEFAULT_PAGE_SIZE: u32 = 20;

fn unified_user_id(state: &AppState, email: &str) -> WebResult<String> {
    let conn = state.identity_db.lock().unwrap();
    Ok(users::resolve_or_create_by_email(&conn, email)?.unified_user_id)
}

#[derive(Deserialize)]
pub struct ListQuery {
    page_size: Option<u32>,
    #[serde(default)]
    include_deleted: bool,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let uid = unified_user_id(&state, &claims.sub)?;
    let list = state.history.list_conversations(&uid, q.page_size.unwrap_or(DEFAULT_PAGE_SIZE), q.include_deleted)?;
    Ok(Json(serde_json::to_value(list)?))
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub seed_text: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let uid = unified_user_id(&state, &claims.sub)?;
    let conversation = state.history.create_conversation(&uid, &req.seed_text)?;
    Ok(Json(serde_json::to_value(conversation)?))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let uid = unified_user_id(&state, &claims.sub)?;
    let conversation = state
        .history
        .get_conversation(&uid, &id)?
        .ok_or_else(|| ConduitError::NotFound(id.clone()))?;
    Ok(Json(serde_json::to_value(conversation)?))
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub pinned: Option<bool>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let uid = unified_user_id(&state, &claims.sub)?;
    if let Some(title) = &req.title {
        state.history.rename_conversation(&uid, &id, title)?;
    }
    if let Some(pinned) = req.pinned {
        state.history.set_pinned(&uid, &id, pinned)?;
    }
    Ok(Json(json!({"status": "ok"})))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let uid = unified_user_id(&state, &claims.sub)?;
    state.history.delete_conversation(&uid, &id)?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let uid = unified_user_id(&state, &claims.sub)?;
    let messages = state.history.conversation_messages(&uid, &id)?;
    Ok(Json(json!({"messages": messages})))
}
