mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use postbox_api::AppStateInner;
use postbox_crypto::{AesGcmCipher, Cipher, Passthrough, keys::key_from_base64};
use postbox_store::{Engine, KvBackend, SqliteBackend, Store};

use crate::config::{BackendKind, Config};

/// Demo accounts registered when `POSTBOX_SEED` is set.
const SEED_USERS: &[(&str, &str)] = &[
    ("root", "root"),
    ("user1", "pass"),
    ("user2", "pass"),
    ("user3", "pass"),
    ("user4", "pass"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postbox=debug,postbox_store=debug,postbox_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let cipher: Arc<dyn Cipher> = match &config.encryption_key {
        Some(encoded) => Arc::new(AesGcmCipher::new(key_from_base64(encoded)?)),
        None => Arc::new(Passthrough),
    };

    let engine = match config.backend {
        BackendKind::Sqlite => Engine::from(SqliteBackend::open(&config.db_path, config.lock_timeout)?),
        BackendKind::Memory => Engine::from(KvBackend::new(config.lock_timeout)),
    };

    let store = Store::new(engine, cipher);
    if config.seed {
        let created = store.seed_users(SEED_USERS)?;
        info!("Seeded {} demo user(s)", created);
    }

    let state = Arc::new(AppStateInner { store });

    let app = postbox_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Postbox listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Postbox stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
