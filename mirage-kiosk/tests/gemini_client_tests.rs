//! GeminiClient against a local mock of the generateContent endpoint

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use mirage_common::config::GenerationConfig;
use mirage_common::ImageData;
use mirage_kiosk::services::{GeminiClient, GenerationError, ImageBackend, VariationGenerator};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const API_KEY: &str = "test-key";

/// Mock behaviour is chosen by model name
async fn generate_content(
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": { "message": "bad key" } })));
    }

    let model = model_action.trim_end_matches(":generateContent");
    let parts = &body["contents"][0]["parts"];
    let instruction = parts[1]["text"].as_str().unwrap_or_default();

    match model {
        "echo" => {
            // Return the source bytes so tests can see what was sent
            let source = parts[0]["inlineData"]["data"].as_str().unwrap_or_default();
            let mut text = json!({ "text": instruction });
            if body["generationConfig"]["responseModalities"][0] != "IMAGE" {
                text = json!({ "text": "modalities missing" });
            }
            (
                StatusCode::OK,
                Json(json!({
                    "candidates": [{ "content": { "parts": [
                        text,
                        { "inlineData": { "mimeType": "image/png", "data": source } }
                    ]}}]
                })),
            )
        }
        "throttled" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": { "message": "quota exceeded" } })),
        ),
        "refuses" => (
            StatusCode::OK,
            Json(json!({ "candidates": [{ "content": { "parts": [{ "text": "I can't edit faces" }] } }] })),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "boom" } })),
        ),
    }
}

async fn start_mock() -> String {
    let app = Router::new().route("/v1beta/models/:model_action", post(generate_content));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, model: &str, key: &str) -> GeminiClient {
    let config = GenerationConfig {
        base_url: base_url.to_string(),
        model: model.to_string(),
        request_timeout_secs: 5,
        ..GenerationConfig::default()
    };
    GeminiClient::new(key.to_string(), &config).unwrap()
}

fn source() -> ImageData {
    ImageData::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0])
}

#[tokio::test]
async fn test_request_returns_inline_image() {
    let base = start_mock().await;
    let client = client(&base, "echo", API_KEY);

    let image = client.request(&source(), "smile slightly").await.unwrap();
    assert_eq!(image.mime_type(), "image/png");
    assert_eq!(image.bytes(), source().bytes());
}

#[tokio::test]
async fn test_generator_over_real_client() {
    let base = start_mock().await;
    let backend: Arc<dyn ImageBackend> = Arc::new(client(&base, "echo", API_KEY));
    let generator = VariationGenerator::new(backend, Duration::from_millis(10));

    let images = generator.generate(&source()).await.unwrap();
    assert_eq!(images.len(), 3);
    assert_eq!(generator.backend_name(), "gemini");
}

#[tokio::test]
async fn test_throttling_is_reported() {
    let base = start_mock().await;
    let client = client(&base, "throttled", API_KEY);

    let result = client.request(&source(), "smile").await;
    assert!(matches!(result, Err(GenerationError::Throttled(_))));
}

#[tokio::test]
async fn test_wrong_key_is_api_error() {
    let base = start_mock().await;
    let client = client(&base, "echo", "wrong-key");

    match client.request(&source(), "smile").await {
        Err(GenerationError::Api(status, body)) => {
            assert_eq!(status, 403);
            assert!(body.contains("bad key"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_text_only_answer_is_malformed() {
    let base = start_mock().await;
    let client = client(&base, "refuses", API_KEY);

    let result = client.request(&source(), "smile").await;
    assert!(matches!(result, Err(GenerationError::Malformed(_))));
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let base = start_mock().await;
    let client = client(&base, "explodes", API_KEY);

    let result = client.request(&source(), "smile").await;
    assert!(matches!(result, Err(GenerationError::Api(500, _))));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{}", addr), "echo", API_KEY);
    let result = client.request(&source(), "smile").await;
    assert!(matches!(result, Err(GenerationError::Network(_))));
}
