use std::sync::Arc;

use anyhow::Context;
use chathub::{AppState, Config, FileChatLog, Hub, SqliteStore, rooms::registry::RoomRegistry};
use clap::Parser;
use tokio::signal;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::from_default_env().add_directive("chathub=info".parse()?);
    if std::env::var("CHATHUB_LOG_JSON").unwrap_or_default() == "1" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = Config::parse();

    let store = SqliteStore::connect(&config.database_url, config.max_db_connections)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    store.migrate().await?;
    let store = Arc::new(store);

    let chat_log = FileChatLog::open(&config.chat_log)
        .with_context(|| format!("opening chat log {}", config.chat_log.display()))?;

    let hub = Hub::new(RoomRegistry::new(Arc::new(chat_log)), store.clone(), store);
    let seeded = hub.seed().await?;
    tracing::info!("{seeded} rooms loaded");

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_idle_minutes)));

    let app = chathub::app(AppState { hub }, session_layer);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("installing ctrl-c handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("installing SIGTERM handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
