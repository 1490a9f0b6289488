//! Direct image generation endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use mirage_common::ImageData;
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImagesRequest {
    /// Data URL or bare base64 of the captured portrait
    #[serde(default)]
    pub original_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateImagesResponse {
    pub images: Vec<ImageData>,
}

/// POST /api/generate-images
pub async fn generate_images(
    State(state): State<AppState>,
    payload: Result<Json<GenerateImagesRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateImagesResponse>> {
    let Json(request) = payload?;

    let raw = request
        .original_image
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Original image is required", "originalImage is missing"))?;

    let source = ImageData::parse(&raw).map_err(|e| ApiError::bad_request("Original image is required", e))?;
    let generator = state.generator()?;

    let images = generator.generate(&source).await?;

    Ok(Json(GenerateImagesResponse {
        images: images.into(),
    }))
}

pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/generate-images", post(generate_images))
}
