use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use conduit_bus::{BusClient, InMemoryBusClient, NatsBusClient};
use conduit_commands::handlers::{
    AdminCommandHandler, BindCommandHandler, DebugCommandHandler, InfoCommandHandler, NewSessionCommandHandler,
};
use conduit_commands::permission_gate::PermissionGate;
use conduit_commands::CommandRouter;
use conduit_core::config::{BusConfig, ConduitConfig};
use conduit_history::HistoryManager;
use conduit_identity::permissions::PermissionLevel;
use conduit_telegram::{webhook_router, InMemoryObjectStore, TelegramState};

use conduit_web::app::{build_router, AppState};
use conduit_web::bus_consumer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "conduit_web=info,tower_http=debug".into()))
        .init();

    let config_path = std::env::var("CONDUIT_CONFIG").ok();
    let config = ConduitConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, falling back to defaults");
        ConduitConfig::default()
    });

    let identity_conn = Connection::open(&config.database.path)?;
    conduit_identity::db::init_db(&identity_conn)?;

    let history_conn = Connection::open(&config.database.path)?;
    let history = Arc::new(HistoryManager::new(history_conn)?);

    let bus: Arc<dyn BusClient> = match &config.bus {
        BusConfig::InMemory => Arc::new(InMemoryBusClient::new()),
        BusConfig::Nats { url } => Arc::new(NatsBusClient::connect(url).await?),
    };

    let bot_token = config.telegram.as_ref().map(|t| t.bot_token.clone()).unwrap_or_else(|| "unconfigured".into());
    let bot = Bot::new(bot_token);

    let state = AppState::new(config.clone(), identity_conn, history.clone(), bus.clone(), bot.clone());

    let mut app = build_router(state.clone());

    if let Some(telegram_config) = config.telegram.clone() {
        let telegram_identity = Connection::open(&config.database.path)?;
        let telegram_history = Connection::open(&config.database.path)?;
        conduit_history::db::init_db(&telegram_history)?;

        let mut commands = CommandRouter::new();
        commands.register(Box::new(DebugCommandHandler));
        commands.register(Box::new(InfoCommandHandler));
        commands.register(Box::new(NewSessionCommandHandler));
        commands.register(Box::new(BindCommandHandler));
        commands.register(Box::new(PermissionGate::new(AdminCommandHandler, PermissionLevel::Admin)));

        let telegram_state = Arc::new(TelegramState {
            config: telegram_config,
            identity_db: Mutex::new(telegram_identity),
            history_db: Mutex::new(telegram_history),
            commands,
            bus: bus.clone(),
            object_store: Arc::new(InMemoryObjectStore::new()),
            sender: Arc::new(conduit_telegram::BotTelegramSender::new(bot.clone())),
            bot,
        });

        app = app.nest("/telegram", webhook_router().with_state(telegram_state));
    }

    if let BusConfig::Nats { url } = &config.bus {
        let router = state.router.clone();
        let url = url.clone();
        tokio::spawn(async move {
            bus_consumer::run(url, router).await;
        });
    }

    {
        let history = history.clone();
        let connections = state.connections.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                if let Err(e) = history.sweep_expired() {
                    warn!(error = %e, "history sweep failed");
                }
                connections.reap_expired();
            }
        });
    }

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "conduit-web listening");
    axum::serve(listener, app).await?;
    Ok(())
}
