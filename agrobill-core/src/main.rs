use agrobill_core::{
    app::{create_router, AppState},
    config::Config,
    db,
};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting AgroBill server...");

    let config = Config::from_env()?;
    let pool = db::create_pool(&config).await?;

    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let address = config.bind_address();
    let app = create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", address, e))?;

    info!("Server listening on {}", address);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
