mod config;
mod db;
mod errors;
mod extraction;
mod grading;
mod idp;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::grading::Grader;
use crate::idp::create_idp_adapter;
use crate::pipeline::Pipeline;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting grader API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set, using the in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    let idp = create_idp_adapter(&config.idp)?;
    let grader = Arc::new(Grader::from_config(&config.llm));

    let pipeline = Pipeline::start(
        store.clone(),
        idp.clone(),
        grader,
        &config.pipeline,
        config.idp.fallback_to_fixtures,
    );
    let recovered = pipeline.recover_interrupted().await?;
    if recovered > 0 {
        warn!("{recovered} interrupted job(s) marked ERROR; rerun them to regrade");
    }

    let state = AppState {
        store,
        idp,
        pipeline,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
