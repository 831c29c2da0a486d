//! `/history*` (§4.2 time-grouped reads and export, §6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_history::export;
use conduit_identity::users;

use crate::app::AppState;
use crate::error::WebResult;
use crate::http::authenticate;

const DEFAULT_LIMIT: u32 = 50;
const EXPORT_LIMIT: u32 = 10_000;

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<u32>,
    last_key: Option<String>,
    channel: Option<String>,
}

/// With `channel` set, returns a flat newest-first page (optionally cursored
/// by `last_key`, a `timestamp_msgid`). Without it, returns the
/// `{today, yesterday, this_week, earlier}` grouping used by the default
/// history view.
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<HistoryQuery>,
) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let unified_user_id = {
        let conn = state.identity_db.lock().unwrap();
        users::resolve_or_create_by_email(&conn, &claims.sub)?.unified_user_id
    };
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);

    if q.channel.is_some() || q.last_key.is_some() {
        let mut messages = state.history.user_history(&unified_user_id, q.channel.as_deref(), EXPORT_LIMIT)?;
        if let Some(cursor) = &q.last_key {
            messages.retain(|m| m.timestamp_msgid.as_str() < cursor.as_str());
        }
        let next_cursor = messages.get(limit as usize).map(|m| m.timestamp_msgid.clone());
        messages.truncate(limit as usize);
        return Ok(Json(json!({"messages": messages, "next_cursor": next_cursor})));
    }

    let bucketed = state.history.bucketed_history(&unified_user_id, limit)?;
    Ok(Json(serde_json::to_value(bucketed)?))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    format: String,
    channel: Option<String>,
}

fn default_format() -> String {
    "json".to_string()
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ExportQuery>,
) -> WebResult<Response> {
    let claims = authenticate(&state, &headers)?;
    let unified_user_id = {
        let conn = state.identity_db.lock().unwrap();
        users::resolve_or_create_by_email(&conn, &claims.sub)?.unified_user_id
    };
    let messages = state.history.user_history(&unified_user_id, q.channel.as_deref(), EXPORT_LIMIT)?;

    match q.format.as_str() {
        "markdown" => {
            let body = export::to_markdown(&messages);
            Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], body).into_response())
        }
        _ => {
            let body = export::to_json(&messages)?;
            Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
        }
    }
}

pub async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> WebResult<Json<Value>> {
    let claims = authenticate(&state, &headers)?;
    let unified_user_id = {
        let conn = state.identity_db.lock().unwrap();
        users::resolve_or_create_by_email(&conn, &claims.sub)?.unified_user_id
    };
    let (message_count, conversation_count) = state.history.stats(&unified_user_id)?;
    Ok(Json(json!({"message_count": message_count, "conversation_count": conversation_count})))
}
