use anyhow::{Context, Result};
use compute::PredictionConfig;
use config::{Config, Environment, File};
use sea_orm::Database;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::schemas::AppState;
use crate::storage::MediaStorage;

/// Prefix of environment overrides, e.g. `IRIS__PREDICTION__DATASET_PATH`.
const ENV_PREFIX: &str = "IRIS";

/// Application settings layered from defaults, an optional settings file and the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub prediction: PredictionConfig,
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub server: ServerSettings,
}

/// Where uploaded images are written and served from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub media_root: PathBuf,
    /// URL prefix the media root is mounted at.
    pub media_url: String,
    pub max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            media_url: "/media".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub ttl_hours: i64,
    /// Adds the `Secure` attribute; enable behind HTTPS.
    pub secure_cookie: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "sessionid".to_string(),
            ttl_hours: 24 * 14,
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings; a given `path` must exist, otherwise only defaults and environment apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading settings file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;
        Ok(settings)
    }
}

/// Connect to the database and assemble the shared application state.
pub async fn initialize_app_state_with_url(database_url: &str, settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", database_url))?;

    let storage = MediaStorage::new(&settings.storage.media_root, &settings.storage.media_url);
    debug!("Media root: {}", settings.storage.media_root.display());
    debug!("Dataset path: {}", settings.prediction.dataset_path.display());
    debug!("Image model path: {}", settings.prediction.image_model_path.display());

    Ok(AppState {
        db,
        settings: Arc::new(settings),
        storage,
    })
}
