use finance_fulfillment::{
    agent::FulfillmentAgent,
    api::start_server,
    config::ServerConfig,
    dataset::open_provider,
    handlers::create_default_registry,
    state::{spawn_idle_sweeper, InMemorySessionStore},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    info!("🚀 Finance Assistant Fulfillment - Webhook Server");
    info!("📍 Port: {}", config.port);
    info!("📂 Data: {} ({})", config.data_dir.display(), config.dataset_mode);
    info!("⏳ Session idle timeout: {}s", config.session_idle_timeout.as_secs());

    // Create components
    let dataset = open_provider(config.dataset_mode, &config.data_dir).await?;
    let registry = create_default_registry();
    let sessions = Arc::new(InMemorySessionStore::with_idle_timeout(config.session_idle_timeout));

    // Sweep at a tenth of the timeout, at most once a minute
    let sweep_every = (config.session_idle_timeout / 10).min(Duration::from_secs(60));
    spawn_idle_sweeper(sessions.clone(), sweep_every);

    let agent = Arc::new(FulfillmentAgent::new(registry, sessions, dataset));

    info!("✅ Agent initialized");

    start_server(agent, config.port).await?;

    Ok(())
}
