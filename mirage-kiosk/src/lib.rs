//! mirage-kiosk library - Photo installation kiosk service
//!
//! A visitor is photographed, shown three subtly altered versions of the
//! photo and asked to pick the real one. None of the three is real. The
//! service generates the variations, walks each visitor tab through the
//! flow, and persists finished sessions with global participation counters.

pub mod api;
pub mod config;
pub mod error;
pub mod flow;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use mirage_common::config::FlowConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::flow::TabStorage;
use crate::services::{GenerationError, PersistenceGateway, VariationGenerator};

/// Request body ceiling; captures and generated images travel inline as base64
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: PersistenceGateway,
    /// Absent when no API key is configured
    pub generator: Option<Arc<VariationGenerator>>,
    /// Per-tab transient storage
    pub tabs: TabStorage,
    pub flow: FlowConfig,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, generator: Option<Arc<VariationGenerator>>, flow: FlowConfig) -> Self {
        Self {
            gateway: PersistenceGateway::new(db),
            generator,
            tabs: TabStorage::new(),
            flow,
            startup_time: Utc::now(),
        }
    }

    /// The generator, or the not-configured failure callers report as a 500
    pub fn generator(&self) -> ApiResult<&VariationGenerator> {
        self.generator
            .as_deref()
            .ok_or(ApiError::Upstream(GenerationError::NotConfigured))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::flow_routes())
        .merge(api::session_routes())
        .merge(api::generate_routes())
        .merge(api::report_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
