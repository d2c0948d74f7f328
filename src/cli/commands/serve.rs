use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use super::initdb::connect_and_migrate;
use crate::config::{initialize_app_state_with_url, Settings};
use crate::router::create_router;
use crate::session;

pub async fn serve(database_url: &str, bind_address: &str, settings: Settings) -> Result<()> {
    trace!("Entering serve function");
    info!("Iris web application starting up");
    debug!("Bind address: {}", bind_address);

    // Migrations run on their own connection; the server opens a fresh pool
    let db = connect_and_migrate(database_url).await?;
    let purged = session::purge_expired(&db)
        .await
        .context("Failed to purge expired sessions")?;
    info!("Removed {} expired session(s)", purged);

    if !settings.prediction.dataset_path.exists() {
        error!(
            "Dataset {} not found, measurement predictions will fail",
            settings.prediction.dataset_path.display()
        );
    }
    if !settings.prediction.image_model_path.exists() {
        error!(
            "Image model {} not found, image predictions will fail",
            settings.prediction.image_model_path.display()
        );
    }

    let state = initialize_app_state_with_url(database_url, settings).await?;
    debug!("Application state initialized successfully");

    let app = create_router(state);
    debug!("Router created successfully");

    info!("Starting server on {}", bind_address);
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind to address {}", bind_address))?;

    info!("Iris web server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
