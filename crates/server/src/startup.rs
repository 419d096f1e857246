use std::{net::SocketAddr, sync::Arc};

use axum::http::{header, Method};
use axum::Router;
use configs::AppConfig;
use service::retry::RetryPolicy;
use service::store::GithubStore;
use service::EntryStoreUpdater;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::routes;
use crate::state::AppState;

/// `Access-Control-Allow-Origin: *`, `Content-Type` header, `POST`/`OPTIONS`.
pub fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::OPTIONS])
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Wire the GitHub-backed updater into the router.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let store = GithubStore::new(&cfg.store)?;
    let updater = EntryStoreUpdater::new(Arc::new(store), cfg.store.commit_origin.clone())
        .with_retry(RetryPolicy::from_config(&cfg.retry));
    let state = AppState::new(cfg.store.clone(), updater);
    Ok(routes::build_router(state, build_cors()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl+C; shutdown only via process signal");
        std::future::pending::<()>().await;
    }
    info!(service = "server", event = "shutdown_signal", "received Ctrl+C, shutting down");
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    match cfg.store.resolve() {
        Ok(access) => info!(
            repo = %access.location.repo,
            path = %access.location.path,
            branch = access.location.branch.as_deref().unwrap_or("<default>"),
            "entries document configured"
        ),
        // still serve: every save answers 500 until the settings are provided
        Err(e) => warn!(error = %e, "store configuration incomplete"),
    }
    if cfg.retry.enabled {
        info!(max_attempts = cfg.retry.max_attempts, "retry on version conflict enabled");
    }

    let app = build_app(&cfg)?;

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting entry store server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
