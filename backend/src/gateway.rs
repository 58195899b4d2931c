use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::ImageReader;
use shared::{ErrorResponse, ImageRequest, InferenceResponse};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::inference::InferenceError;
use crate::inference::category::FoodCategoryClassifier;
use crate::inference::food::FoodIdentifier;
use crate::storage::scratch::{ScratchError, ScratchStore};

/// Standard alphabet, padding optional.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Request body must be JSON with a non-empty baseString field")]
    MissingPayload,
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Could not decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Upload contained no image data")]
    EmptyUpload,
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error("Model inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Inference worker unavailable")]
    Blocking(#[from] BlockingError),
    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingPayload
            | GatewayError::InvalidBody(_)
            | GatewayError::InvalidBase64(_)
            | GatewayError::ImageDecode(_)
            | GatewayError::EmptyUpload => StatusCode::BAD_REQUEST,
            GatewayError::Scratch(ScratchError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Scratch(ScratchError::Io(_))
            | GatewayError::Inference(_)
            | GatewayError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Raw image bytes plus the MIME type named by a data-URI prefix or upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl ImagePayload {
    /// Decodes a base64 string, stripping everything up to the first comma
    /// when a data-URI prefix is present. Whitespace anywhere in the payload
    /// is ignored so line-wrapped encodings decode.
    pub fn from_base64(base_string: &str) -> Result<Self, GatewayError> {
        let trimmed = base_string.trim();
        let (mime_type, data) = match trimmed.split_once(',') {
            Some((prefix, data)) => (mime_from_data_uri(prefix), data),
            None => (None, trimmed),
        };
        let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64.decode(cleaned)?;
        Ok(Self { bytes, mime_type })
    }
}

fn mime_from_data_uri(prefix: &str) -> Option<String> {
    prefix
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .map(str::to_string)
}

/// Turns an uploaded image into `[[food, nutrition], [categories]]`.
pub struct InferenceGateway {
    food: FoodIdentifier,
    category: FoodCategoryClassifier,
    scratch: ScratchStore,
    inference_timeout: Duration,
}

impl InferenceGateway {
    pub fn new(
        food: FoodIdentifier,
        category: FoodCategoryClassifier,
        scratch: ScratchStore,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            food,
            category,
            scratch,
            inference_timeout,
        }
    }

    pub fn scratch(&self) -> &ScratchStore {
        &self.scratch
    }

    pub async fn handle(
        self: Arc<Self>,
        request: ImageRequest,
    ) -> Result<InferenceResponse, GatewayError> {
        let base_string = request
            .base_string
            .filter(|s| !s.is_empty())
            .ok_or(GatewayError::MissingPayload)?;
        let payload = ImagePayload::from_base64(&base_string)?;
        self.dispatch(payload).await
    }

    pub async fn handle_upload(
        self: Arc<Self>,
        payload: ImagePayload,
    ) -> Result<InferenceResponse, GatewayError> {
        if payload.bytes.is_empty() {
            return Err(GatewayError::EmptyUpload);
        }
        self.dispatch(payload).await
    }

    /// Runs the blocking pipeline off the async workers, bounded by the
    /// inference timeout. A timed-out job still finishes and cleans up.
    async fn dispatch(
        self: Arc<Self>,
        payload: ImagePayload,
    ) -> Result<InferenceResponse, GatewayError> {
        let request_id = Uuid::new_v4();
        let timeout = self.inference_timeout;
        log::info!("[{}] Received {} byte image", request_id, payload.bytes.len());

        let job = web::block(move || self.run(request_id, &payload));
        match tokio::time::timeout(timeout, job).await {
            Ok(result) => result?,
            Err(_) => {
                log::error!("[{}] Inference timed out after {:?}", request_id, timeout);
                Err(GatewayError::Timeout(timeout))
            }
        }
    }

    pub fn run(
        &self,
        request_id: Uuid,
        payload: &ImagePayload,
    ) -> Result<InferenceResponse, GatewayError> {
        let extension = ScratchStore::extension_for_mime(payload.mime_type.as_deref());
        let scratch = self.scratch.persist(request_id, &payload.bytes, extension)?;
        log::debug!("[{}] Wrote scratch file {}", request_id, scratch.path().display());

        let image = ImageReader::open(scratch.path())
            .map_err(ScratchError::Io)?
            .with_guessed_format()
            .map_err(ScratchError::Io)?
            .decode()?;

        let food = self.food.identify(&image)?;
        log::info!("[{}] Identified food: {}", request_id, food.0);
        let prediction = self.category.classify(&image)?;
        log::debug!("[{}] Category scores: {:?}", request_id, prediction.scores);
        if !prediction.rank_one_filled {
            log::warn!(
                "[{}] No category score above 0 in {} classes; rank 1 defaults to {:?}",
                request_id,
                prediction.scores.len(),
                prediction.labels.first()
            );
        }
        log::info!("[{}] Categories: {:?}", request_id, prediction.labels);

        Ok(InferenceResponse(food, prediction.labels))
    }
}
