//! Visitor flow endpoints
//!
//! Each browser tab identifies itself with the `x-tab-id` header. Responses
//! are either `{stage, session}` when the step went ahead or `{redirect}` when
//! the tab has to go back to an earlier stage.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap},
    routing::{delete, get, post},
    Json, Router,
};
use mirage_common::{ImageData, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::flow::{Receipt, Stage, Step, TabScope, View, VisitorFlow};
use crate::{ApiError, ApiResult, AppState};

/// Header carrying the browser tab id
pub const TAB_HEADER: &str = "x-tab-id";

/// Browser tab identity taken from [`TAB_HEADER`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabId(String);

impl TabId {
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TabId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TAB_HEADER)
            .ok_or_else(|| ApiError::bad_request("Tab id is required", format!("{} header is missing", TAB_HEADER)))?;

        let id = value
            .to_str()
            .map_err(|e| ApiError::bad_request("Tab id is required", e))?
            .trim();

        if id.is_empty() {
            return Err(ApiError::bad_request(
                "Tab id is required",
                format!("{} header is empty", TAB_HEADER),
            ));
        }

        Ok(TabId(id.to_string()))
    }
}

/// Flow step outcome on the wire
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FlowResponse {
    Progress {
        stage: Stage,
        session: Option<Session>,
        #[serde(rename = "revealDelayMs", skip_serializing_if = "Option::is_none")]
        reveal_delay_ms: Option<u64>,
    },
    Redirect {
        redirect: Stage,
    },
}

/// Persist outcome on the wire
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PersistResponse {
    Persisted {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "resultUrl")]
        result_url: String,
        durable: bool,
    },
    Redirect {
        redirect: Stage,
    },
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirmed: Option<bool>,
}

fn flow_for(state: &AppState, tab: TabId) -> VisitorFlow<TabScope> {
    VisitorFlow::new(state.tabs.tab(tab.into_inner()))
}

impl FlowResponse {
    fn progress(state: &AppState, stage: Stage, session: Option<Session>) -> Self {
        let reveal_delay_ms = (stage == Stage::Revealing).then_some(state.flow.reveal_delay_ms);
        FlowResponse::Progress {
            stage,
            session,
            reveal_delay_ms,
        }
    }

    /// Action outcome: on success the tab moves on to `next`
    fn after_action(state: &AppState, step: Step<Session>, next: Stage) -> Self {
        match step {
            Step::Ready(session) => Self::progress(state, next, Some(session)),
            Step::Redirect(redirect) => FlowResponse::Redirect { redirect },
        }
    }
}

/// Public link to a session's result page
fn result_url(state: &AppState, headers: &HeaderMap, session_id: &str) -> String {
    let base = state
        .flow
        .public_base_url
        .as_deref()
        .map(|url| url.trim_end_matches('/').to_string())
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|host| host.to_str().ok())
                .map(|host| format!("http://{}", host))
        })
        .unwrap_or_default();

    format!("{}/result/{}", base, session_id)
}

/// GET /flow/:stage
pub async fn enter_stage(
    State(state): State<AppState>,
    tab: TabId,
    Path(stage): Path<String>,
) -> ApiResult<Json<FlowResponse>> {
    let stage: Stage = stage.parse()?;

    let response = match flow_for(&state, tab).enter(stage).await {
        Step::Ready(View { stage, session }) => FlowResponse::progress(&state, stage, session),
        Step::Redirect(redirect) => FlowResponse::Redirect { redirect },
    };

    Ok(Json(response))
}

/// POST /flow/capture
pub async fn capture(
    State(state): State<AppState>,
    tab: TabId,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> ApiResult<Json<FlowResponse>> {
    let Json(request) = payload?;

    let raw = request
        .image
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Image is required", "image is missing"))?;
    let source = ImageData::parse(&raw).map_err(|e| ApiError::bad_request("Image is required", e))?;

    info!(tab = %tab, bytes = source.len(), "Capture received");
    let flow = flow_for(&state, tab);

    let generator = match state.generator() {
        Ok(generator) => generator,
        Err(e) => {
            flow.reset().await;
            return Err(e);
        }
    };

    let session = flow.capture(generator, source).await?;
    Ok(Json(FlowResponse::progress(&state, Stage::Selecting, Some(session))))
}

/// POST /flow/select
pub async fn select(
    State(state): State<AppState>,
    tab: TabId,
    payload: Result<Json<SelectRequest>, JsonRejection>,
) -> ApiResult<Json<FlowResponse>> {
    let Json(request) = payload?;
    let index = request
        .index
        .ok_or_else(|| ApiError::bad_request("Image index is required", "index is missing"))?;

    let step = flow_for(&state, tab).select(index).await?;
    Ok(Json(FlowResponse::after_action(&state, step, Stage::Confirming)))
}

/// POST /flow/confirm
pub async fn confirm(
    State(state): State<AppState>,
    tab: TabId,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult<Json<FlowResponse>> {
    let Json(request) = payload?;
    let confirmed = request
        .confirmed
        .ok_or_else(|| ApiError::bad_request("Answer is required", "confirmed is missing"))?;

    let step = flow_for(&state, tab).confirm(confirmed).await?;
    Ok(Json(FlowResponse::after_action(&state, step, Stage::Revealing)))
}

/// POST /flow/reveal
pub async fn reveal(State(state): State<AppState>, tab: TabId) -> ApiResult<Json<FlowResponse>> {
    let step = flow_for(&state, tab).reveal().await?;
    Ok(Json(FlowResponse::after_action(&state, step, Stage::Persisting)))
}

/// POST /flow/persist
pub async fn persist(
    State(state): State<AppState>,
    tab: TabId,
    headers: HeaderMap,
) -> Json<PersistResponse> {
    let response = match flow_for(&state, tab).persist(&state.gateway).await {
        Step::Ready(Receipt {
            session_id, durable, ..
        }) => PersistResponse::Persisted {
            result_url: result_url(&state, &headers, &session_id),
            session_id,
            durable,
        },
        Step::Redirect(redirect) => PersistResponse::Redirect { redirect },
    };

    Json(response)
}

/// DELETE /flow
pub async fn restart(State(state): State<AppState>, tab: TabId) -> Json<FlowResponse> {
    info!(tab = %tab, "Tab cleared");
    flow_for(&state, tab).reset().await;
    Json(FlowResponse::Redirect {
        redirect: Stage::Capturing,
    })
}

pub fn flow_routes() -> Router<AppState> {
    Router::new()
        .route("/flow", delete(restart))
        .route("/flow/:stage", get(enter_stage))
        .route("/flow/capture", post(capture))
        .route("/flow/select", post(select))
        .route("/flow/confirm", post(confirm))
        .route("/flow/reveal", post(reveal))
        .route("/flow/persist", post(persist))
}
