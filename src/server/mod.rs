//! HTTP API server over the store and search engine.

pub mod routes;

use std::sync::Arc;

use axum::Router;
use parking_lot::RwLock;
use tracing::info;

use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::search::SearchEngine;
use crate::store::Store;

/// Shared application state for the HTTP server.
#[derive(Debug)]
pub struct AppState {
    pub engine: SearchEngine,
    pub metrics: RwLock<MetricsCollector>,
    /// Expected `X-Key` header value, if authentication is on.
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(engine: SearchEngine, api_key: Option<String>) -> Self {
        Self {
            engine,
            metrics: RwLock::new(MetricsCollector::new()),
            api_key,
        }
    }

    pub fn store(&self) -> &Store {
        self.engine.store()
    }
}

/// Build the router over a fresh, empty store.
pub fn app(config: &Config) -> Router {
    let store = Arc::new(Store::new());
    let engine = SearchEngine::with_config(store, config.search.clone());
    let state = Arc::new(AppState::new(engine, config.api_key.clone()));
    routes::create_router(state)
}

/// Start the HTTP server and serve until the process is stopped.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let app = app(&config);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(
        addr = %config.addr,
        auth = config.api_key.is_some(),
        "server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
