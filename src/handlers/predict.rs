use crate::schemas::{
    ApiResponse, AppState, ErrorResponse, FormPage, PredictionOutcome, PredictionResponse,
};
use crate::session::Principal;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use compute::{PredictionError, Result as PredictionResult};
use model::entities::upload_record;
use model::Species;
use sea_orm::{ActiveModelTrait, Set};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};

/// Name of the multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "flower_image";

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// The four flower measurements of the numeric path
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MeasurementQuery {
    /// Sepal length
    pub n1: Option<String>,
    /// Sepal width
    pub n2: Option<String>,
    /// Petal length
    pub n3: Option<String>,
    /// Petal width
    pub n4: Option<String>,
}

/// Multipart body of the image path
#[derive(ToSchema)]
pub struct ImageUploadForm {
    /// The flower photo; any format the decoder understands
    #[schema(value_type = String, format = Binary)]
    pub flower_image: Vec<u8>,
}

impl MeasurementQuery {
    /// All four values, when every one of them is present and non-empty.
    fn complete(&self) -> Option<[&str; 4]> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }
        Some([
            present(&self.n1)?,
            present(&self.n2)?,
            present(&self.n3)?,
            present(&self.n4)?,
        ])
    }
}

fn outcome(result: &PredictionResult<Species>) -> PredictionOutcome {
    match result {
        Ok(species) => PredictionOutcome::Ok {
            label: species.label().to_string(),
        },
        Err(e) => {
            error!(kind = e.kind().as_str(), "Prediction failed: {}", e);
            PredictionOutcome::from(e)
        }
    }
}

/// Run CPU-bound prediction work off the async reactor.
async fn run_blocking<F>(work: F) -> PredictionResult<Species>
where
    F: FnOnce() -> PredictionResult<Species> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => Err(PredictionError::Inference(format!(
            "Prediction task did not complete: {}",
            e
        ))),
    }
}

/// Prediction form description
#[utoipa::path(
    get,
    path = "/predict",
    tag = "predict",
    responses(
        (status = 200, description = "Prediction form", body = ApiResponse<FormPage>)
    )
)]
#[instrument]
pub async fn predict_page() -> Json<ApiResponse<FormPage>> {
    Json(ApiResponse::ok(
        FormPage::new("predict", &["n1", "n2", "n3", "n4", IMAGE_FIELD]),
        "Predict an iris species from measurements or a photo",
    ))
}

/// Predict the species from four measurements
///
/// The measurement classifier is trained on the configured dataset for every
/// request. Missing or empty measurements yield an empty result.
#[utoipa::path(
    get,
    path = "/predict/result",
    tag = "predict",
    params(MeasurementQuery),
    responses(
        (status = 200, description = "Prediction result or tagged prediction error", body = PredictionResponse)
    )
)]
#[instrument(skip(state))]
pub async fn predict_measurements(
    State(state): State<AppState>,
    Query(query): Query<MeasurementQuery>,
) -> Json<PredictionResponse> {
    trace!("Entering predict_measurements function");
    let Some(raw) = query.complete() else {
        debug!("Incomplete measurements, nothing to predict");
        return Json(PredictionResponse::empty());
    };

    let result = match compute::parse_measurements(raw) {
        Ok(values) => {
            let config = state.settings.prediction.clone();
            run_blocking(move || {
                compute::predict_measurements(&config, &values).map(|p| p.species)
            })
            .await
        }
        Err(e) => Err(e),
    };

    Json(PredictionResponse {
        prediction: Some(outcome(&result)),
        image_path: None,
    })
}

/// Predict the species from an uploaded photo
///
/// The photo is stored and classified by the pre-trained image model. For
/// authenticated users a successful prediction is recorded as an upload.
#[utoipa::path(
    post,
    path = "/predict/result",
    tag = "predict",
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Prediction result or tagged prediction error", body = PredictionResponse),
        (status = 400, description = "Unreadable multipart body", body = ErrorResponse)
    )
)]
#[instrument(skip(state, principal, multipart))]
pub async fn predict_image(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, HandlerError> {
    trace!("Entering predict_image function");
    let Ok(mut multipart) = multipart else {
        debug!("Request is not multipart, nothing to predict");
        return Ok(Json(PredictionResponse::empty()));
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to read multipart body: {}", e);
        (
            e.status(),
            Json(ErrorResponse::new(e.body_text(), "INVALID_UPLOAD")),
        )
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_string)
        else {
            continue;
        };
        let data = field.bytes().await.map_err(|e| {
            warn!("Failed to read uploaded file: {}", e);
            (
                e.status(),
                Json(ErrorResponse::new(e.body_text(), "INVALID_UPLOAD")),
            )
        })?;
        info!("Received image: {} ({} bytes)", file_name, data.len());
        upload = Some((file_name, data));
        break;
    }
    let Some((file_name, data)) = upload else {
        debug!("No {} file in the form, nothing to predict", IMAGE_FIELD);
        return Ok(Json(PredictionResponse::empty()));
    };

    let stored_name = match state.storage.save(&file_name, &data).await {
        Ok(name) => name,
        Err(e) => {
            let failed = Err(PredictionError::Inference(format!("Cannot store upload: {}", e)));
            return Ok(Json(PredictionResponse {
                prediction: Some(outcome(&failed)),
                image_path: None,
            }));
        }
    };
    let image_path = state.storage.url(&stored_name);

    let file_path = state.storage.path(&stored_name);
    let model_path = state.settings.prediction.image_model_path.clone();
    let mut result =
        run_blocking(move || compute::classify_image_file(&file_path, &model_path)).await;

    let predicted = result.as_ref().ok().copied();
    if let (Some(species), Some(user)) = (predicted, &principal.user) {
        let record = upload_record::ActiveModel {
            user_id: Set(Some(user.id)),
            image: Set(stored_name.clone()),
            predicted_class: Set(species),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        match record.insert(&state.db).await {
            Ok(saved) => debug!("Recorded upload {} for user {}", saved.id, user.id),
            Err(e) => {
                result = Err(PredictionError::Inference(format!(
                    "Cannot record upload: {}",
                    e
                )))
            }
        }
    }

    Ok(Json(PredictionResponse {
        prediction: Some(outcome(&result)),
        image_path: Some(image_path),
    }))
}
