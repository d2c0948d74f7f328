use crate::config::Settings;
use crate::storage::MediaStorage;
use chrono::{DateTime, Utc};
use compute::{PredictionError, PredictionErrorKind};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Layered application settings
    pub settings: Arc<Settings>,
    /// Store for uploaded images
    pub storage: MediaStorage,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            success: false,
        }
    }
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Description of a form page: which page it is and the fields it posts.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormPage {
    pub page: String,
    pub fields: Vec<String>,
}

impl FormPage {
    pub fn new(page: &str, fields: &[&str]) -> Self {
        Self {
            page: page.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Landing page of an authenticated user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HomePage {
    pub username: String,
    pub is_staff: bool,
}

/// Severity of a flash message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

/// One-shot message shown on the next admin listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

/// User row of the admin dashboard
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminUserRow {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<model::entities::user::Model> for AdminUserRow {
    fn from(user: model::entities::user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            date_joined: user.date_joined,
        }
    }
}

/// Upload row of the admin dashboard, joined with its owner
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadRow {
    pub id: i32,
    pub username: Option<String>,
    /// Public URL of the stored image
    pub image: String,
    pub predicted_class: String,
    pub created_at: DateTime<Utc>,
}

/// Admin dashboard: every user, every upload (newest first) and pending messages
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminDashboard {
    pub users: Vec<AdminUserRow>,
    pub uploads: Vec<UploadRow>,
    pub messages: Vec<FlashMessage>,
}

/// Why a prediction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PredictionFailure {
    DatasetLoadFailure,
    ModelLoadFailure,
    MalformedInput,
    InferenceFailure,
}

impl From<PredictionErrorKind> for PredictionFailure {
    fn from(kind: PredictionErrorKind) -> Self {
        match kind {
            PredictionErrorKind::DatasetLoadFailure => Self::DatasetLoadFailure,
            PredictionErrorKind::ModelLoadFailure => Self::ModelLoadFailure,
            PredictionErrorKind::MalformedInput => Self::MalformedInput,
            PredictionErrorKind::InferenceFailure => Self::InferenceFailure,
        }
    }
}

/// Outcome of a prediction attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// A species label
    Ok { label: String },
    /// A prediction failure
    Error {
        kind: PredictionFailure,
        message: String,
    },
}

impl From<&PredictionError> for PredictionOutcome {
    fn from(err: &PredictionError) -> Self {
        Self::Error {
            kind: err.kind().into(),
            message: err.to_string(),
        }
    }
}

/// Result page of the prediction endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PredictionResponse {
    /// `null` when no prediction was requested
    pub prediction: Option<PredictionOutcome>,
    /// Public URL of the uploaded image on the image path
    pub image_path: Option<String>,
}

impl PredictionResponse {
    pub fn empty() -> Self {
        Self {
            prediction: None,
            image_path: None,
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register_page,
        crate::handlers::auth::register,
        crate::handlers::auth::login_page,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::home,
        crate::handlers::predict::predict_page,
        crate::handlers::predict::predict_measurements,
        crate::handlers::predict::predict_image,
        crate::handlers::admin::dashboard,
        crate::handlers::admin::delete_user,
    ),
    components(
        schemas(
            ApiResponse<FormPage>,
            ApiResponse<HomePage>,
            ApiResponse<AdminDashboard>,
            ErrorResponse,
            HealthResponse,
            FormPage,
            HomePage,
            AdminDashboard,
            AdminUserRow,
            UploadRow,
            FlashMessage,
            FlashLevel,
            PredictionOutcome,
            PredictionFailure,
            PredictionResponse,
            crate::handlers::auth::RegisterForm,
            crate::handlers::auth::LoginForm,
            crate::handlers::predict::ImageUploadForm,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and logout"),
        (name = "predict", description = "Iris species prediction"),
        (name = "admin", description = "Staff-only user and upload management"),
    ),
    info(
        title = "Iris Web API",
        description = "Iris species prediction portal - classify flowers from measurements or photos",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
