mod agent;
mod api;
mod bootstrap;
mod config;
mod error;
mod extraction;
mod gateway;
mod intake;
mod invoice;
mod scheduler;
mod server;
mod time;
mod treasury;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,syncpay=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("🚀 Starting SyncPay agent");

    dotenv::dotenv().ok();
    let config = config::Config::from_env()?;
    let bind_address = config.bind_address.clone();

    let (state, agent) = bootstrap::initialize_app_state(&config)?;

    // Recurring drivers: invoice checks and treasury rebalancing.
    agent.start();
    info!("✅ Agent loops started");

    let app = server::create_app(state).await;
    server::run_server(app, &bind_address).await?;

    Ok(())
}
