use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use blog_api::config;
use blog_api::routes::{app, AppState};
use blog_api::store::memory::MemoryStore;
use blog_api::store::postgres::PgStore;
use blog_api::store::Store;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::config();
    tracing::info!(environment = ?config.environment, "starting blog API");

    if config.is_production() && config.security.jwt_secret.is_empty() {
        panic!("JWT_SECRET must be set in production");
    }

    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.max_connections)
                .await
                .unwrap_or_else(|e| panic!("failed to connect to database: {}", e));
            Arc::new(store)
        }
        None if !config.is_production() => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is not persisted)");
            Arc::new(MemoryStore::new())
        }
        None => panic!("DATABASE_URL must be set in production"),
    };

    let app = app(AppState { store });

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
