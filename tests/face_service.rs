/// Integration tests for the face service HTTP surface
use base64::Engine;
use face_service::{
    api,
    config::{ExtractorKind, FaceServiceConfig},
    extract::mock::MockExtractor,
    transcode::UnwrapTranscoder,
    FaceServiceState,
};
use common::faces::{EnrollFaceResponse, FaceListResponse, IdentifyFaceResponse};
use image::{ImageBuffer, Rgb};
use std::io::Cursor;
use std::sync::Arc;

const EMBEDDING_DIM: usize = 128;

fn test_config() -> FaceServiceConfig {
    FaceServiceConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        node_id: "test-node".to_string(),
        match_threshold: 0.6,
        embedding_dim: EMBEDDING_DIM,
        max_image_bytes: 4 * 1024 * 1024,
        extractor: ExtractorKind::Mock,
        detection_model_path: String::new(),
        embedding_model_path: String::new(),
        ffmpeg_bin: "ffmpeg".to_string(),
    }
}

/// Helper function to create a test face service with mock collaborators
fn setup_test_service() -> (axum::Router, FaceServiceState) {
    let state = FaceServiceState::new(
        &test_config(),
        Arc::new(MockExtractor::new(EMBEDDING_DIM)),
        Arc::new(UnwrapTranscoder),
    );
    let app = api::router(state.clone());

    (app, state)
}

fn encode_png<F>(width: u32, height: u32, pixel: F) -> Vec<u8>
where
    F: Fn(u32, u32) -> [u8; 3],
{
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |x, y| Rgb(pixel(x, y)));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn portrait() -> Vec<u8> {
    encode_png(32, 32, |x, y| {
        [200u8.saturating_sub(x as u8 * 3), 80 + (y as u8), 40]
    })
}

fn portrait_with_noise() -> Vec<u8> {
    encode_png(32, 32, |x, y| {
        [
            198u8.saturating_sub(x as u8 * 3),
            82 + (y as u8),
            43,
        ]
    })
}

fn distant_portrait() -> Vec<u8> {
    encode_png(32, 32, |_, y| [10, 20, 200 + (y as u8 % 50)])
}

fn b64(bytes: &[u8]) -> String {
    base64::prelude::BASE64_STANDARD.encode(bytes)
}

fn enroll_body(label: &str, image: &[u8]) -> serde_json::Value {
    serde_json::json!({ "label": label, "image_data": b64(image) })
}

fn identify_body(image: &[u8]) -> serde_json::Value {
    serde_json::json!({ "image_data": b64(image) })
}

#[tokio::test]
async fn test_enroll_face() {
    let (app, state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await;

    assert_eq!(response.status_code(), 200);

    let enroll_response: EnrollFaceResponse = response.json();
    assert!(enroll_response.success);
    assert_eq!(enroll_response.label, "alice");
    assert_eq!(state.store_len(), 1);
}

#[tokio::test]
async fn test_enroll_and_identify_with_noise() {
    let (app, _state) = setup_test_service();
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await
        .assert_status_ok();
    server
        .post("/v1/faces")
        .json(&enroll_body("bob", &distant_portrait()))
        .await
        .assert_status_ok();

    // A slightly perturbed capture of the enrolled portrait still resolves
    let response = server
        .post("/v1/identify")
        .json(&identify_body(&portrait_with_noise()))
        .await;

    assert_eq!(response.status_code(), 200);
    let identify_response: IdentifyFaceResponse = response.json();
    assert!(identify_response.success);
    assert_eq!(identify_response.label, "alice");
    let distance = identify_response.distance.unwrap();
    assert!(distance <= 0.6, "distance {distance} beyond threshold");
}

#[tokio::test]
async fn test_identify_far_image_is_unknown() {
    let (app, _state) = setup_test_service();
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await
        .assert_status_ok();

    let response = server
        .post("/v1/identify")
        .json(&identify_body(&distant_portrait()))
        .await;

    assert_eq!(response.status_code(), 200);
    let identify_response: IdentifyFaceResponse = response.json();
    assert_eq!(identify_response.label, "unknown");
    assert!(identify_response.distance.is_none());
}

#[tokio::test]
async fn test_identify_on_empty_store() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/identify")
        .json(&identify_body(&portrait()))
        .await;

    assert_eq!(response.status_code(), 200);
    let identify_response: IdentifyFaceResponse = response.json();
    assert!(identify_response.success);
    assert_eq!(identify_response.label, "unknown");
}

#[tokio::test]
async fn test_identify_is_repeatable() {
    let (app, _state) = setup_test_service();
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await
        .assert_status_ok();

    let first: IdentifyFaceResponse = server
        .post("/v1/identify")
        .json(&identify_body(&portrait()))
        .await
        .json();
    let second: IdentifyFaceResponse = server
        .post("/v1/identify")
        .json(&identify_body(&portrait()))
        .await
        .json();

    assert_eq!(first.label, second.label);
    assert_eq!(first.distance, second.distance);
}

#[tokio::test]
async fn test_enroll_with_empty_label() {
    let (app, state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/faces")
        .json(&enroll_body("   ", &portrait()))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "invalid_input");
    assert_eq!(state.store_len(), 0);
}

#[tokio::test]
async fn test_enroll_with_missing_label_field() {
    let (app, _state) = setup_test_service();

    // Serde rejects the body before the pipeline runs
    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/faces")
        .json(&serde_json::json!({ "image_data": b64(&portrait()) }))
        .await;

    assert_eq!(response.status_code(), 422);
}

#[tokio::test]
async fn test_enroll_with_invalid_base64() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/faces")
        .json(&serde_json::json!({ "label": "alice", "image_data": "not base64!!" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_enroll_with_empty_payload() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/faces")
        .json(&enroll_body("alice", &[]))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_non_image_payload_is_unrecognized() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/identify")
        .json(&identify_body(b"this is not an image"))
        .await;

    assert_eq!(response.status_code(), 415);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "unrecognized_format");
}

#[tokio::test]
async fn test_corrupt_jpeg_is_decode_failure() {
    let (app, _state) = setup_test_service();

    // Valid JPEG signature, garbage body
    let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xAA, 0xBB, 0xCC];
    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/identify")
        .json(&identify_body(&bytes))
        .await;

    assert_eq!(response.status_code(), 422);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "decode_failure");
}

#[tokio::test]
async fn test_faceless_image_is_no_face_detected() {
    let (app, _state) = setup_test_service();

    let black = encode_png(16, 16, |_, _| [0, 0, 0]);
    let response = axum_test::TestServer::new(app)
        .unwrap()
        .post("/v1/faces")
        .json(&enroll_body("alice", &black))
        .await;

    assert_eq!(response.status_code(), 422);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "no_face_detected");
}

#[tokio::test]
async fn test_duplicate_enrollments_both_count() {
    let (app, state) = setup_test_service();
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await
        .assert_status_ok();
    server
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await
        .assert_status_ok();

    assert_eq!(state.store_len(), 2);
}

#[tokio::test]
async fn test_concurrent_enrollments_are_lossless() {
    let (_app, state) = setup_test_service();
    let n: usize = 24;

    let mut handles = Vec::new();
    for i in 0..n {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let image = encode_png(16, 16, |x, y| {
                [100 + i as u8, x as u8 * 10, y as u8 * 10]
            });
            state.enroll(&format!("person-{i}"), &image).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(state.store_len(), n);
}

#[tokio::test]
async fn test_list_faces() {
    let (app, _state) = setup_test_service();
    let server = axum_test::TestServer::new(app).unwrap();

    server
        .post("/v1/faces")
        .json(&enroll_body("alice", &portrait()))
        .await
        .assert_status_ok();
    server
        .post("/v1/faces")
        .json(&enroll_body("bob", &distant_portrait()))
        .await
        .assert_status_ok();

    let response = server.get("/v1/faces").await;
    assert_eq!(response.status_code(), 200);

    let list: FaceListResponse = response.json();
    assert_eq!(list.count, 2);
    assert_eq!(list.faces[0].label, "alice");
    assert_eq!(list.faces[1].label, "bob");
}

#[tokio::test]
async fn test_healthz() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .get("/healthz")
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readyz() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app).unwrap().get("/readyz").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_service();

    let response = axum_test::TestServer::new(app)
        .unwrap()
        .get("/metrics")
        .await;

    // Just verify the endpoint is accessible
    assert_eq!(response.status_code(), 200);
}
