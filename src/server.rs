use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{
    get_invoice, health_check, list_invoices, root, treasury_status, AppState,
};

/// Read-only status surface; nothing here touches the write path.
pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                .route("/invoices", get(list_invoices))
                .route("/invoices/:number", get(get_invoice))
                .route("/treasury", get(treasury_status)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
