mod config;
mod error;
mod routes;

use config::AppConfig;
use fieldmark_core::db::Database;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fieldmark_server=info".parse().expect("valid directive")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting fieldmark-server with config: {:?}", config);

    let db = match &config.db_path {
        Some(path) => Database::open(path)?,
        None => {
            tracing::info!("FIELDMARK_DB not set; relaying through an in-memory store");
            Database::open_in_memory()?
        }
    };

    let state = AppState::new(db);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("fieldmark-server listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
