//! Direct API integration tests
//!
//! /api/* endpoints, result pages and health, driven through the router.

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::json;

fn finished_session(confirmed: bool) -> serde_json::Value {
    json!({
        "id": "1730000000000",
        "generatedImages": three_images(),
        "selectedImageIndex": 2,
        "userConfirmed": confirmed,
        "timestamp": 1730000000000i64,
        "revealed": true
    })
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app(None).await;

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mirage-kiosk");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
    assert_eq!(body["generation_configured"], false);
}

#[tokio::test]
async fn test_statistics_start_at_zero() {
    let (app, _) = test_app(None).await;

    let (status, body) = send(&app, get("/api/get-statistics", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "totalParticipants": 0, "selectedAI": 0, "confirmedAsReal": 0 }));
}

#[tokio::test]
async fn test_save_and_get_session() {
    let (app, _) = test_app(None).await;

    let (status, body) = send(&app, post_json("/api/save-session", None, finished_session(true))).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    assert_ne!(session_id, "1730000000000");

    let (status, stored) = send(&app, get(&format!("/api/get-session/{}", session_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["id"], session_id);
    assert_eq!(stored["selectedImageIndex"], 2);
    assert_eq!(stored["generatedImages"], three_images());
    assert_eq!(stored["timestamp"], 1730000000000i64);

    let (_, stats) = send(&app, get("/api/get-statistics", None)).await;
    assert_eq!(stats, json!({ "totalParticipants": 1, "selectedAI": 1, "confirmedAsReal": 1 }));
}

#[tokio::test]
async fn test_counters_track_answers() {
    let (app, _) = test_app(None).await;
    for confirmed in [true, false, false] {
        let (status, _) = send(&app, post_json("/api/save-session", None, finished_session(confirmed))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, stats) = send(&app, get("/api/get-statistics", None)).await;
    assert_eq!(stats["totalParticipants"], 3);
    assert_eq!(stats["selectedAI"], 3);
    assert_eq!(stats["confirmedAsReal"], 1);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (app, _) = test_app(None).await;

    let (status, body) = send(&app, get("/api/get-session/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
    assert_eq!(body["details"], "nope");
}

#[tokio::test]
async fn test_save_session_rejects_broken_records() {
    let (app, _) = test_app(None).await;

    let mut two_images = finished_session(true);
    two_images["generatedImages"].as_array_mut().unwrap().pop();

    let mut bad_index = finished_session(true);
    bad_index["selectedImageIndex"] = json!(5);

    let mut out_of_order = finished_session(true);
    out_of_order["selectedImageIndex"] = serde_json::Value::Null;

    let mut no_images = finished_session(true);
    no_images.as_object_mut().unwrap().remove("generatedImages");

    for body in [two_images, bad_index, out_of_order, no_images] {
        let (status, error) = send(&app, post_json("/api/save-session", None, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", error);
        assert!(error["error"].is_string());
        assert!(error["details"].is_string());
    }

    let (_, stats) = send(&app, get("/api/get-statistics", None)).await;
    assert_eq!(stats["totalParticipants"], 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, _) = test_app(None).await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/save-session")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn test_save_session_store_failure() {
    let (app, state) = test_app(None).await;
    state.gateway.pool().close().await;

    let (status, body) = send(&app, post_json("/api/save-session", None, finished_session(true))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to save session");
}

#[tokio::test]
async fn test_generate_images() {
    let backend = StubBackend::working();
    let (app, _) = test_app(Some(backend.clone())).await;

    let (status, body) = send(&app, post_json("/api/generate-images", None, json!({ "originalImage": CAPTURE }))).await;
    assert_eq!(status, StatusCode::OK);

    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 3);
    assert!(images.iter().all(|i| i.as_str().unwrap().starts_with("data:image/png;base64,")));
    assert_ne!(images[0], images[1]);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_generate_images_requires_original() {
    let (app, _) = test_app(Some(StubBackend::working())).await;

    let (status, body) = send(&app, post_json("/api/generate-images", None, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Original image is required");

    let (status, _) = send(
        &app,
        post_json("/api/generate-images", None, json!({ "originalImage": "data:image/jpeg;base64,%%%" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_images_all_or_nothing() {
    let backend = StubBackend::failing_on(2);
    let (app, _) = test_app(Some(backend)).await;

    let (status, body) = send(&app, post_json("/api/generate-images", None, json!({ "originalImage": CAPTURE }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate images");
    assert!(body.get("images").is_none());
}

#[tokio::test]
async fn test_generate_images_without_key() {
    let (app, _) = test_app(None).await;

    let (status, body) = send(&app, post_json("/api/generate-images", None, json!({ "originalImage": CAPTURE }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API key not configured");
}

#[tokio::test]
async fn test_result_page_from_store() {
    let (app, _) = test_app(None).await;
    let (_, saved) = send(&app, post_json("/api/save-session", None, finished_session(false))).await;
    let session_id = saved["sessionId"].as_str().unwrap();

    for uri in [format!("/result/{}", session_id), format!("/api/report/{}", session_id)] {
        let (status, body) = send(&app, get(&uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionId"], session_id);
        assert_eq!(body["selectedImage"], three_images()[2]);
        assert_eq!(body["userConfirmed"], false);
        assert_eq!(body["report"]["decorative"], true);
        assert_eq!(body["report"]["sections"].as_array().unwrap().len(), 4);
    }
}

#[tokio::test]
async fn test_result_page_unknown_id() {
    let (app, _) = test_app(None).await;

    let (status, body) = send(&app, get("/result/missing", Some("tab-1"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn test_result_page_requires_selection() {
    let (app, _) = test_app(Some(StubBackend::working())).await;

    let (_, captured) = send(&app, post_json("/flow/capture", Some("tab-1"), json!({ "image": CAPTURE }))).await;
    let local_id = captured["session"]["id"].as_str().unwrap();

    let (status, body) = send(&app, get(&format!("/api/report/{}", local_id), Some("tab-1"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session has no selected image");
}

#[tokio::test]
async fn test_sessions_survive_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("mirage.db");

    let session_id = {
        let pool = mirage_common::db::init_database(&db_path).await.unwrap();
        let app = mirage_kiosk::build_router(mirage_kiosk::AppState::new(pool.clone(), None, Default::default()));
        let (_, saved) = send(&app, post_json("/api/save-session", None, finished_session(true))).await;
        pool.close().await;
        saved["sessionId"].as_str().unwrap().to_string()
    };

    let pool = mirage_common::db::init_database(&db_path).await.unwrap();
    let app = mirage_kiosk::build_router(mirage_kiosk::AppState::new(pool, None, Default::default()));

    let (status, stored) = send(&app, get(&format!("/api/get-session/{}", session_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["userConfirmed"], true);

    let (_, stats) = send(&app, get("/api/get-statistics", None)).await;
    assert_eq!(stats["totalParticipants"], 1);
}
