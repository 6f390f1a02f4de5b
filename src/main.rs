use std::sync::Arc;

use messenger_service::config::Config;
use messenger_service::error::AppError;
use messenger_service::services::crypto::NoopCrypto;
use messenger_service::state::AppState;
use messenger_service::{db, logging, migrations, routes};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;
    migrations::run_all(&pool).await?;

    let state = AppState::new(pool, Arc::new(NoopCrypto), config.clone());
    let router = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(addr = %addr, "messenger service listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;

    Ok(())
}
