//! kadai-daemon entry point.
//!
//! Loads config and secrets, picks the store and object backends, builds the
//! shared state, wires middleware, and starts the HTTP server. Route handlers
//! live in `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use kadai_audit::AuditWriter;
use kadai_config::{
    report_unused_keys, secrets::resolve_secrets, ConfigConsumer, ShopConfig, UnusedKeyPolicy,
};
use kadai_daemon::{routes, state};
use kadai_db::{DocumentStore, MemoryStore, PgStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (loaded, cfg) = kadai_config::load_shop_config_from_env().context("load config failed")?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let report = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    for pointer in &report.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not read by the daemon");
    }

    let secrets = resolve_secrets(&cfg);
    if secrets.admin_password.is_none() {
        warn!(
            env = %cfg.admin.password_env,
            "admin password not set; admin console is closed"
        );
    }

    let store = open_store(secrets.database_url.as_deref()).await?;
    let objects = kadai_storage::object_store_from_config(&cfg.storage);
    let audit = AuditWriter::resume(&cfg.audit.path, cfg.audit.hash_chain)
        .context("open audit log failed")?;
    info!(
        store = store.backend_name(),
        objects = objects.backend_name(),
        audit = %cfg.audit.path,
        "backends ready"
    );

    let shared = Arc::new(state::AppState::new(
        &cfg,
        store.clone(),
        objects,
        secrets.admin_password.as_deref(),
        Some(audit),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_order_events(store.changes(), shared.bus.clone());

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_from_config(&cfg));

    let addr: SocketAddr = cfg
        .server
        .addr
        .parse()
        .with_context(|| format!("invalid server.addr {:?}", cfg.server.addr))?;
    info!("kadai-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Postgres when a URL is configured, otherwise the in-memory store.
async fn open_store(database_url: Option<&str>) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await.context("connect document store failed")?;
            kadai_db::migrate(pg.pool()).await?;
            Ok(Arc::new(pg))
        }
        None => {
            warn!("no database url set; using the in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// CORS: only the configured storefront origins.
fn cors_from_config(cfg: &ShopConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .server
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
