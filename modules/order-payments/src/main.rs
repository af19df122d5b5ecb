use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use order_payments_rs::{
    auth::JwtKeys,
    config::Config,
    db::{init_pool, run_migrations},
    metrics::Metrics,
    router, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();

    tracing::info!("Starting order payments service...");

    let config = Config::from_env()?;
    tracing::info!(config = %config.summary(), "Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = init_pool(&config.database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&pool).await?;

    let state = AppState {
        pool,
        jwt: Arc::new(JwtKeys::from_secret(&config.jwt_secret)),
        metrics: Metrics::new()?,
        payment_timeout: config.payment_timeout(),
    };

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(%addr, "Order payments service listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
