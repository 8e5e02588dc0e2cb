use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use shared::{
    ErrorResponse, GreenBandInfo, HealthResponse, LabelledPercentage, LabelledProbability,
    ModelInfoResponse, PredictUrlRequest, PredictionResponse, RejectionReason, ServiceInfoResponse,
    ThresholdsInfo,
};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::disease::disease_info;
use crate::error::{ClassifyError, InferenceError, InvalidImageError};
use crate::fetch::{FetchError, ImageFetcher};
use crate::inference::{ClassificationResult, DecisionEngine};

const FEATURES: [&str; 4] = [
    "Disease classification",
    "Non-banana leaf rejection",
    "Confidence assessment",
    "Uncertainty detection",
];

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub fetcher: ImageFetcher,
    pub inference_slots: Arc<Semaphore>,
    pub model_name: String,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        engine: Arc<DecisionEngine>,
        fetcher: ImageFetcher,
        model_name: String,
        max_upload_bytes: usize,
        max_concurrent_inferences: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            fetcher,
            inference_slots: Arc::new(Semaphore::new(max_concurrent_inferences)),
            model_name,
            max_upload_bytes,
            request_timeout,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Please include an image file in the 'file' field of your request.")]
    MissingFile,
    #[error("Upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
    #[error("Malformed upload: {0}")]
    Upload(String),
    #[error(transparent)]
    InvalidImage(#[from] InvalidImageError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Inference timed out after {0} seconds")]
    Timeout(u64),
    #[error("Inference worker unavailable: {0}")]
    Unavailable(String),
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::InvalidImage(e) => ApiError::InvalidImage(e),
            ClassifyError::Inference(e) => ApiError::Inference(e),
        }
    }
}

impl ApiError {
    fn label(&self) -> &'static str {
        match self {
            ApiError::MissingFile => "No file provided",
            ApiError::PayloadTooLarge(_) => "File too large",
            ApiError::Upload(_) => "Malformed upload",
            ApiError::InvalidImage(_) => "Invalid image",
            ApiError::Inference(_) => "Prediction failed",
            ApiError::Fetch(FetchError::TooLarge(_)) => "File too large",
            ApiError::Fetch(FetchError::InvalidUrl(_) | FetchError::UnsupportedScheme(_)) => "Invalid URL",
            ApiError::Fetch(_) => "Image download failed",
            ApiError::Timeout(_) => "Prediction timed out",
            ApiError::Unavailable(_) => "Service unavailable",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::Upload(_) | ApiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Fetch(FetchError::InvalidUrl(_) | FetchError::UnsupportedScheme(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Fetch(FetchError::TooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}: {}", self.label(), self);
        } else {
            warn!("{}: {}", self.label(), self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.label().to_string(),
            message: self.to_string(),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/model-info").route(web::get().to(model_info)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/predict-url").route(web::post().to(predict_url)));
}

async fn home(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfoResponse {
        message: "Banana Leaf Disease Classification API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
        diseases: state.engine.provider().class_labels().to_vec(),
        status: "ready".to_string(),
        model_loaded: true,
    })
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: true,
        backend: state.engine.provider().backend_name().to_string(),
    })
}

async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    let provider = state.engine.provider();
    let (height, width) = provider.target_size();
    let thresholds = state.engine.thresholds();
    let band = state.engine.green_band();

    HttpResponse::Ok().json(ModelInfoResponse {
        model_type: state.model_name.clone(),
        diseases: provider.class_labels().to_vec(),
        input_size: format!("{}x{} pixels", width, height),
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
        thresholds: ThresholdsInfo {
            min_confidence: thresholds.min_confidence,
            max_entropy: thresholds.max_entropy,
            min_green_ratio: thresholds.min_green_ratio,
        },
        green_band: GreenBandInfo {
            hue_min_degrees: band.hue_min_degrees,
            hue_max_degrees: band.hue_max_degrees,
            min_saturation: band.min_saturation,
            min_value: band.min_value,
        },
        rejection_criteria: RejectionReason::iter().map(|r| r.to_string()).collect(),
    })
}

async fn predict(state: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    let image_data = read_file_field(&mut payload, state.max_upload_bytes).await?;
    let response = run_prediction(&state, image_data, None).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn predict_url(
    state: web::Data<AppState>,
    request: web::Json<PredictUrlRequest>,
) -> Result<HttpResponse, ApiError> {
    let url = request.into_inner().url;
    info!("Fetching image from {}", url);
    let image_data = state.fetcher.fetch(&url).await?;
    let response = run_prediction(&state, image_data, Some(url)).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn read_file_field(payload: &mut Multipart, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| ApiError::Upload(e.to_string()))?;
            if image_data.len() + data.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge(max_bytes));
            }
            image_data.extend_from_slice(&data);
        }
        if image_data.is_empty() {
            return Err(ApiError::MissingFile);
        }
        return Ok(image_data);
    }
    Err(ApiError::MissingFile)
}

/// Classifies on the blocking pool, bounded by the inference semaphore and the
/// request timeout.
async fn run_prediction(
    state: &AppState,
    image_data: Vec<u8>,
    image_url: Option<String>,
) -> Result<PredictionResponse, ApiError> {
    let image_sha256 = calculate_image_hash(&image_data);
    let engine = state.engine.clone();
    let slots = state.inference_slots.clone();

    let job = async move {
        let permit = slots
            .acquire_owned()
            .await
            .map_err(|e| ApiError::Unavailable(e.to_string()))?;
        // The permit rides with the blocking closure, so a timed-out request
        // keeps its slot until the forward pass actually returns.
        let result = web::block(move || {
            let _permit = permit;
            engine.classify_bytes(&image_data)
        })
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
        Ok::<ClassificationResult, ApiError>(result?)
    };

    let result = actix_web::rt::time::timeout(state.request_timeout, job)
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout.as_secs()))??;

    if result.is_rejected {
        let reasons: Vec<String> = result.rejection_reasons.iter().map(|r| r.to_string()).collect();
        info!(
            "Rejected image {} (best guess {} at {:.3}): {}",
            &image_sha256[..12],
            result.predicted_class,
            result.confidence,
            reasons.join(", ")
        );
    } else {
        info!(
            "Classified image {} as {} ({:.1}%)",
            &image_sha256[..12],
            result.predicted_class,
            result.confidence * 100.0
        );
    }

    Ok(to_prediction_response(&result, image_sha256, image_url))
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

pub fn to_prediction_response(
    result: &ClassificationResult,
    image_sha256: String,
    image_url: Option<String>,
) -> PredictionResponse {
    let disease_info = if result.is_rejected {
        None
    } else {
        disease_info(&result.predicted_class)
    };

    PredictionResponse {
        success: true,
        request_id: Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        image_sha256,
        is_rejected: result.is_rejected,
        message: result.message.clone(),
        predicted_class: result.predicted_class.clone(),
        confidence_score: result.confidence,
        confidence: format!("{:.2}%", result.confidence * 100.0),
        entropy: result.entropy,
        certainty_score: result.certainty_score(),
        is_leaf_like: result.is_leaf_like,
        green_ratio: result.green_ratio,
        raw_probabilities: result
            .all_probabilities
            .iter()
            .map(|(label, probability)| LabelledProbability {
                label: label.clone(),
                probability: *probability,
            })
            .collect(),
        detailed_probabilities: result
            .all_probabilities
            .iter()
            .map(|(label, probability)| LabelledPercentage {
                label: label.clone(),
                percentage: format!("{:.2}%", probability * 100.0),
            })
            .collect(),
        rejection_reasons: result.rejection_reasons.iter().map(|r| r.to_string()).collect(),
        disease_info,
        image_url,
    }
}
