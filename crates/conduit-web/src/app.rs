//! Shared state for the whole binary (§5): every axum handler is an
//! independent tokio task reading from `Arc<AppState>`. The identity store
//! is a single `Mutex<Connection>` (sqlite has no real concurrent-writer
//! story); the history store manages its own internal mutex behind
//! `HistoryManager`; live WebSocket sessions are tracked in a `DashMap`
//! alongside the TTL-bounded `ConnectionRegistry`.

use std::sync::{Arc, Mutex};

use axum::routing::{get, post, put};
use axum::Router;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use conduit_bus::BusClient;
use conduit_connections::ConnectionRegistry;
use conduit_core::config::ConduitConfig;
use conduit_history::HistoryManager;
use conduit_protocol::ws::ServerFrame;
use conduit_router::ResponseRouter;
use conduit_telegram::BotTelegramSender;

use crate::http::{admin, auth, binding, conversations, history};
use crate::sender::WebSenderImpl;
use crate::ws;

/// One outbound sender per live WebSocket — looked up by `WebSenderImpl`
/// when the response router has a `web` channel frame to deliver.
pub type WsClients = Arc<DashMap<String, mpsc::UnboundedSender<ServerFrame>>>;

pub struct AppState {
    pub config: ConduitConfig,
    pub identity_db: Mutex<rusqlite::Connection>,
    pub history: Arc<HistoryManager>,
    pub connections: Arc<ConnectionRegistry>,
    pub bus: Arc<dyn BusClient>,
    pub ws_clients: WsClients,
    pub router: Arc<ResponseRouter>,
}

impl AppState {
    pub fn new(
        config: ConduitConfig,
        identity_db: rusqlite::Connection,
        history: Arc<HistoryManager>,
        bus: Arc<dyn BusClient>,
        telegram_bot: teloxide::Bot,
    ) -> Arc<Self> {
        let connections = Arc::new(ConnectionRegistry::new());
        let ws_clients: WsClients = Arc::new(DashMap::new());

        let telegram_sender = Arc::new(BotTelegramSender::new(telegram_bot));
        let web_sender = Arc::new(WebSenderImpl::new(ws_clients.clone()));
        let router = Arc::new(ResponseRouter::new(
            history.clone(),
            connections.clone(),
            telegram_sender,
            web_sender,
        ));

        Arc::new(Self {
            config,
            identity_db: Mutex::new(identity_db),
            history,
            connections,
            bus,
            ws_clients,
            router,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/me", get(auth::me))
        .route("/binding/generate-code", post(binding::generate_code))
        .route("/binding/status", get(binding::status))
        .route("/history", get(history::list))
        .route("/history/export", get(history::export))
        .route("/history/stats", get(history::stats))
        .route("/conversations", get(conversations::list).post(conversations::create))
        .route(
            "/conversations/{id}",
            get(conversations::get_one).put(conversations::update).delete(conversations::remove),
        )
        .route("/conversations/{id}/messages", get(conversations::messages))
        .route("/admin/users", post(admin::create_user).get(admin::list_users))
        .route("/admin/users/{email}/password", put(admin::reset_password))
        .route("/admin/users/{email}/role", put(admin::set_role))
        .route("/admin/bindings", get(admin::list_bindings))
        .route("/ws", get(ws::connection::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
