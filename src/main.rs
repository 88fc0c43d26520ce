use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fixora::classifier::ClassifierClient;
use fixora::config::AppConfig;
use fixora::notify::LogNotifier;
use fixora::shared::state::AppState;
use fixora::shared::utils::create_pool;
use fixora::tickets::configure_tickets_routes;
use fixora::tickets::engine::TicketEngine;
use fixora::tickets::store::DieselTicketStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database.url)?;
    let store = Arc::new(DieselTicketStore::new(pool));
    let engine = Arc::new(TicketEngine::new(store, Arc::new(LogNotifier)));
    let classifier = Arc::new(ClassifierClient::new(
        config.classifier.webhook_url.clone(),
        Duration::from_secs(config.classifier.timeout_secs),
    )?);

    let addr = config.bind_addr();
    let state = Arc::new(AppState {
        config,
        engine,
        classifier,
    });

    let app = configure_tickets_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!(%addr, "fixora listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
