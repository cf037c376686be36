mod config;
mod error;
mod routes;

use std::sync::Arc;

use config::ApiConfig;
use routes::{app_router, AppState};
use snapsync_core::db::{Database, Schema};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("snapsync_api=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(ApiConfig::from_env()?);
    tracing::info!("Starting snapsync-api with config: {:?}", config);

    let db = Database::open(&config.db_path, Schema::Catalog).await?;
    let state = AppState::new(config, db);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("snapsync-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
