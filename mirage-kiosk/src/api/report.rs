//! Result page and decorative analysis report
//!
//! The result page is reachable from the visitor's own tab and from a second
//! device via the QR code. The tab's own session is preferred when it matches
//! the requested id; anything else is read from the store.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use mirage_common::{ImageData, Session};
use serde::Serialize;

use crate::api::TabId;
use crate::flow::VisitorFlow;
use crate::services::{generate_report, AnalysisReport};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub session_id: String,
    pub selected_image: ImageData,
    pub user_confirmed: Option<bool>,
    pub timestamp: i64,
    pub report: AnalysisReport,
}

async fn find_session(state: &AppState, tab: Option<TabId>, id: &str) -> ApiResult<Session> {
    if let Some(tab) = tab {
        let flow = VisitorFlow::new(state.tabs.tab(tab.into_inner()));
        if let Some(session) = flow.find(id).await {
            return Ok(session);
        }
    }

    state
        .gateway
        .fetch_by_id(id)
        .await
        .map_err(|e| ApiError::from_common("Failed to fetch session", e))?
        .ok_or_else(|| ApiError::not_found("Session not found", id))
}

/// GET /api/report/:id and GET /result/:id
pub async fn get_result(
    State(state): State<AppState>,
    tab: Option<TabId>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResultView>> {
    let session = find_session(&state, tab, &id).await?;

    let selected_image = session
        .selected_image()
        .cloned()
        .ok_or_else(|| ApiError::bad_request("Session has no selected image", &id))?;

    Ok(Json(ResultView {
        session_id: id,
        selected_image,
        user_confirmed: session.user_confirmed,
        timestamp: session.timestamp,
        report: generate_report(),
    }))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/report/:id", get(get_result))
        .route("/result/:id", get(get_result))
}
