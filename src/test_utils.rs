#[cfg(test)]
pub mod test_utils {
    use crate::config::Settings;
    use crate::identity::{self, NewUser};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use crate::storage::MediaStorage;
    use axum::http::{header, HeaderValue};
    use axum_test::{TestResponse, TestServer};
    use migration::{Migrator, MigratorTrait};
    use model::entities::user;
    use sea_orm::{Database, DatabaseConnection};
    use std::io::{Cursor, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_PASSWORD: &str = "correct-horse-battery";

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Write a small, well separated iris-like dataset with `per_class` rows per species.
    pub fn write_iris_csv(path: &Path, per_class: usize) {
        let centers = [
            ("Iris-setosa", [5.0, 3.4, 1.5, 0.2]),
            ("Iris-versicolor", [5.9, 2.8, 4.3, 1.3]),
            ("Iris-virginica", [6.6, 3.0, 5.6, 2.0]),
        ];
        let mut file = std::fs::File::create(path).expect("Failed to create dataset");
        writeln!(file, "sepal_length,sepal_width,petal_length,petal_width,species").unwrap();
        for (label, center) in centers {
            for i in 0..per_class {
                let jitter = ((i % 5) as f64 - 2.0) * 0.04;
                writeln!(
                    file,
                    "{:.2},{:.2},{:.2},{:.2},{}",
                    center[0] + jitter,
                    center[1] - jitter,
                    center[2] + jitter,
                    center[3] + jitter / 2.0,
                    label
                )
                .unwrap();
            }
        }
    }

    /// A PNG image of the given size filled with one colour.
    pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("Failed to encode PNG");
        buf
    }

    /// Settings pointing at fixtures inside `dir`: a dataset, image model weights and a media root.
    pub fn test_settings(dir: &TempDir) -> Settings {
        let dataset_path = dir.path().join("iris.csv");
        write_iris_csv(&dataset_path, 30);

        let image_model_path = dir.path().join("iris_image_model.safetensors");
        compute::image_model::write_initialized_weights(&image_model_path)
            .expect("Failed to write image model");

        let mut settings = Settings::default();
        settings.prediction.dataset_path = dataset_path;
        settings.prediction.image_model_path = image_model_path;
        settings.prediction.split_seed = Some(7);
        settings.storage.media_root = dir.path().join("media");
        settings
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state(settings: Settings) -> AppState {
        let db = setup_test_db().await;
        let storage = MediaStorage::new(&settings.storage.media_root, &settings.storage.media_url);
        AppState {
            db,
            settings: Arc::new(settings),
            storage,
        }
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// A running test server with its state and the directory holding its fixtures.
    pub struct TestApp {
        pub server: TestServer,
        pub state: AppState,
        pub dir: TempDir,
        _tracing: tracing::subscriber::DefaultGuard,
    }

    impl TestApp {
        pub fn media_root(&self) -> PathBuf {
            self.state.settings.storage.media_root.clone()
        }

        /// Create an account directly through the identity layer.
        pub async fn create_user(&self, username: &str, is_staff: bool, is_superuser: bool) -> user::Model {
            let email = format!("{}@example.com", username);
            identity::create_user(
                &self.state.db,
                NewUser {
                    username,
                    email: &email,
                    password: TEST_PASSWORD,
                    is_staff,
                    is_superuser,
                },
            )
            .await
            .expect("Failed to create test user")
        }

        /// Log in and return the `Cookie` header value carrying the session.
        pub async fn login(&self, username: &str) -> HeaderValue {
            let response = self
                .server
                .post("/login")
                .form(&[("username", username), ("password", TEST_PASSWORD)])
                .await;
            session_cookie(&response)
        }
    }

    /// `Cookie` request header value for the session installed by `response`.
    pub fn session_cookie(response: &TestResponse) -> HeaderValue {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("Response did not set a cookie")
            .to_str()
            .expect("Set-Cookie is not ASCII");
        let pair = set_cookie.split(';').next().unwrap_or_default().trim();
        HeaderValue::from_str(pair).expect("Invalid cookie pair")
    }

    /// Create axum app for testing, with fixtures written to a fresh temporary directory
    pub async fn setup_test_app() -> TestApp {
        setup_test_app_with(|_| {}).await
    }

    /// Like [`setup_test_app`], with a hook to adjust the settings
    pub async fn setup_test_app_with(adjust: impl FnOnce(&mut Settings)) -> TestApp {
        let tracing = init_test_tracing();

        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut settings = test_settings(&dir);
        adjust(&mut settings);

        let state = setup_test_app_state(settings).await;
        let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
        TestApp {
            server,
            state,
            dir,
            _tracing: tracing,
        }
    }
}
