use crate::handlers::{
    admin::{dashboard, delete_user},
    auth::{home, login, login_page, logout, register, register_page},
    health::health_check,
    predict::{predict_image, predict_measurements, predict_page},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();
    debug!(
        "Serving media from {} at {}",
        state.storage.root().display(),
        settings.storage.media_url
    );

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/", get(register_page).post(register))
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        .route("/home", get(home))
        // Prediction
        .route("/predict", get(predict_page))
        .route(
            "/predict/result",
            get(predict_measurements).post(predict_image),
        )
        // Staff-only administration
        .route("/custom_admin", get(dashboard))
        .route("/delete-user/:user_id", post(delete_user))
        // Uploaded images
        .nest_service(
            settings.storage.media_url.trim_end_matches('/'),
            ServeDir::new(state.storage.root()),
        )
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(DefaultBodyLimit::max(settings.storage.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    settings.server.request_timeout_secs,
                )))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
