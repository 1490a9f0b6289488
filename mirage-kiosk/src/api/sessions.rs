//! Session persistence and statistics endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use mirage_common::{ImageData, Session, Statistics};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiResult, AppState};

/// Finished session as sent by the browser client
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSessionRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub generated_images: Option<Vec<ImageData>>,
    #[serde(default)]
    pub selected_image_index: Option<usize>,
    #[serde(default)]
    pub user_confirmed: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub revealed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSessionResponse {
    pub session_id: String,
}

/// POST /api/save-session
pub async fn save_session(
    State(state): State<AppState>,
    payload: Result<Json<SaveSessionRequest>, JsonRejection>,
) -> ApiResult<Json<SaveSessionResponse>> {
    let Json(request) = payload?;

    let generated_images = request
        .generated_images
        .ok_or_else(|| ApiError::bad_request("Generated images are required", "generatedImages is missing"))?;

    let timestamp = request
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let session = Session {
        id: request.id.unwrap_or_else(|| timestamp.to_string()),
        original_image: None,
        generated_images,
        selected_image_index: request.selected_image_index,
        user_confirmed: request.user_confirmed,
        timestamp,
        revealed: request.revealed,
    };

    let session_id = state
        .gateway
        .persist(&session)
        .await
        .map_err(|e| ApiError::from_common("Failed to save session", e))?;

    Ok(Json(SaveSessionResponse { session_id }))
}

/// GET /api/get-session/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    state
        .gateway
        .fetch_by_id(&id)
        .await
        .map_err(|e| ApiError::from_common("Failed to fetch session", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Session not found", id))
}

/// GET /api/get-statistics
pub async fn get_statistics(State(state): State<AppState>) -> ApiResult<Json<Statistics>> {
    let statistics = state
        .gateway
        .fetch_statistics()
        .await
        .map_err(|e| ApiError::from_common("Failed to fetch statistics", e))?;

    Ok(Json(statistics))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/save-session", post(save_session))
        .route("/api/get-session/:id", get(get_session))
        .route("/api/get-statistics", get(get_statistics))
}
