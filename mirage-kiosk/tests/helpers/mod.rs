//! Shared fixtures for mirage-kiosk integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mirage_common::config::FlowConfig;
use mirage_common::db::init_memory_database;
use mirage_common::ImageData;
use mirage_kiosk::services::{GenerationError, ImageBackend, VariationGenerator};
use mirage_kiosk::{build_router, AppState};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Tiny JPEG-looking payload as a data URL
pub const CAPTURE: &str = "data:image/jpeg;base64,/9j/AAEC";

/// Backend that answers every call with a distinct PNG, or fails on a chosen call
pub struct StubBackend {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl StubBackend {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        })
    }

    /// Fail the `n`th call (zero-based) with a malformed response
    pub fn failing_on(n: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(n),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn request(&self, _image: &ImageData, _instruction: &str) -> Result<ImageData, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(call) {
            return Err(GenerationError::Malformed("response has no candidates".to_string()));
        }
        Ok(ImageData::new("image/png", vec![0x89, b'P', b'N', b'G', call as u8]))
    }
}

/// App state over an in-memory store; `None` backend means no API key
pub async fn test_state(backend: Option<Arc<StubBackend>>) -> AppState {
    let pool = init_memory_database().await.unwrap();
    let generator = backend.map(|backend| {
        let backend: Arc<dyn ImageBackend> = backend;
        Arc::new(VariationGenerator::new(backend, Duration::ZERO))
    });

    let flow = FlowConfig {
        reveal_delay_ms: 1000,
        public_base_url: Some("https://mirage.example".to_string()),
        ..FlowConfig::default()
    };

    AppState::new(pool, generator, flow)
}

pub async fn test_app(backend: Option<Arc<StubBackend>>) -> (Router, AppState) {
    let state = test_state(backend).await;
    (build_router(state.clone()), state)
}

/// Send a request and decode the JSON body (Null when empty)
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn get(uri: &str, tab: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(tab) = tab {
        builder = builder.header("x-tab-id", tab);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, tab: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(tab) = tab {
        builder = builder.header("x-tab-id", tab);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn post_empty(uri: &str, tab: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(tab) = tab {
        builder = builder.header("x-tab-id", tab);
    }
    builder.body(Body::empty()).unwrap()
}

/// Three distinct images as data URLs
pub fn three_images() -> Value {
    Value::Array(
        (0..3u8)
            .map(|i| Value::String(ImageData::new("image/png", vec![i, i + 1]).to_data_url()))
            .collect(),
    )
}
