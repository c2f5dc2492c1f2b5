mod backend_client;
mod config;
mod drafts;
mod errors;
mod models;
mod normalize;
mod routes;
mod state;
mod tailoring;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend_client::{BackendClient, ResumeApi};
use crate::config::{Config, DraftBackend};
use crate::drafts::kv::{FileKvStore, KvStore, MemoryKvStore, RedisKvStore};
use crate::drafts::DraftStore;
use crate::routes::build_router;
use crate::state::AppState;
use crate::tailoring::session::TailorSession;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor v{}", env!("CARGO_PKG_VERSION"));

    // Initialize draft persistence
    let kv = build_kv_store(&config.draft_backend)?;
    let drafts = DraftStore::new(kv, &config.draft_session, config.draft_debounce);
    info!(
        "Draft store initialized ({:?}, session '{}')",
        config.draft_backend, config.draft_session
    );

    // Initialize backend client
    let api: Arc<dyn ResumeApi> =
        Arc::new(BackendClient::new(&config.api_base, config.backend_timeout)?);
    info!("Backend client initialized ({})", config.api_base);

    let session = Arc::new(
        TailorSession::start(drafts, api.clone(), config.user_id.clone(), config.limits).await,
    );

    let state = AppState {
        session: session.clone(),
        api,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown();
    info!("Session closed");

    Ok(())
}

fn build_kv_store(backend: &DraftBackend) -> Result<Arc<dyn KvStore>> {
    let kv: Arc<dyn KvStore> = match backend {
        DraftBackend::File { dir } => Arc::new(FileKvStore::new(dir.as_str())),
        DraftBackend::Redis { url } => Arc::new(RedisKvStore::new(redis::Client::open(url.as_str())?)),
        DraftBackend::Memory => Arc::new(MemoryKvStore::new()),
    };
    Ok(kv)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for shutdown signal: {e}");
    }
}
