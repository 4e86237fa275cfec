use axum::serve;
use progress_report_engine::api::routes::create_router;
use progress_report_engine::build_orchestrator;
use progress_report_engine::config::AppConfig;
use progress_report_engine::store::PostgresStore;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging; RUST_LOG overrides the defaults
    use env_logger::{Builder, Env};
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_env(Env::default())
        .init();

    log::info!("Progress report engine starting");

    // Load configuration
    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    log::info!("Connecting to PostgreSQL...");
    let database_url = config.database_url()?;
    let postgres_store = PostgresStore::new(&database_url, config.max_connections()).await?;

    log::info!("Running database migrations...");
    postgres_store.migrate().await?;

    let orchestrator = build_orchestrator(Arc::new(postgres_store), &config)?;

    run_server(create_router().with_state(Arc::new(orchestrator)), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Report server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
