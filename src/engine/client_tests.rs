use super::*;
use crate::model::{RawFileDescriptor, ScaleFactor};
use crate::validate::validate;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
struct ReceivedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Clone)]
struct ServerState {
    status: StatusCode,
    reply: Arc<String>,
    received: Arc<Mutex<Vec<ReceivedField>>>,
}

async fn handle_upload(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.received.lock().unwrap().push(ReceivedField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    (state.status, state.reply.as_ref().clone())
}

async fn handle_download() -> Vec<u8> {
    b"upscaled-bytes".to_vec()
}

async fn spawn_service(
    status: StatusCode,
    reply: impl Into<String>,
) -> (String, Arc<Mutex<Vec<ReceivedField>>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = ServerState {
        status,
        reply: Arc::new(reply.into()),
        received: received.clone(),
    };
    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/download/:name", get(handle_download))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), received)
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        scale_factor: ScaleFactor::X2,
        request_timeout: Duration::from_secs(5),
        progress_interval: Duration::from_millis(200),
        teardown_delay: Duration::from_millis(500),
        user_agent: "image-upscaler-tests".into(),
        download_dir: None,
    }
}

fn photo_request(scale_factor: ScaleFactor) -> UploadRequest {
    let raw = RawFileDescriptor::from_bytes(
        "photo.png",
        "image/png",
        Bytes::from_static(b"\x89PNG fake payload"),
    );
    UploadRequest {
        file: validate(raw).expect("valid file"),
        scale_factor,
    }
}

fn success_body() -> serde_json::Value {
    json!({
        "success": true,
        "original_url": "/o/1.png",
        "upscaled_url": "/u/1.png",
        "download_url": "/d/1.png",
        "original_dimensions": [800, 600],
        "upscaled_dimensions": [3200, 2400],
        "original_size": 2_000_000,
        "upscaled_size": 9_000_000,
        "scale_factor": 4
    })
}

#[test]
fn maps_success_and_resolves_relative_urls() {
    let success = map_response(&success_body(), "https://svc.example/").unwrap();
    assert_eq!(success.original_url, "https://svc.example/o/1.png");
    assert_eq!(success.upscaled_url, "https://svc.example/u/1.png");
    assert_eq!(success.download_url, "https://svc.example/d/1.png");
    assert_eq!(success.original_dimensions.to_string(), "800 × 600");
    assert_eq!(success.upscaled_dimensions.to_string(), "3200 × 2400");
    assert_eq!(success.original_size_bytes, 2_000_000);
    assert_eq!(success.upscaled_size_bytes, 9_000_000);
    assert_eq!(success.scale_factor, 4.0);
}

#[test]
fn absolute_media_urls_pass_through() {
    assert_eq!(
        resolve_media_url("https://svc.example", "https://cdn.example/u/1.png"),
        "https://cdn.example/u/1.png"
    );
    assert_eq!(
        resolve_media_url("https://svc.example/api/", "static/uploads/a.png"),
        "https://svc.example/api/static/uploads/a.png"
    );
}

#[test]
fn explicit_failure_uses_server_message() {
    let err = map_response(
        &json!({ "success": false, "error": "Invalid file type" }),
        "http://x",
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid file type");
    assert_eq!(err.kind(), crate::error::UploadErrorKind::Service);
}

#[test]
fn error_field_without_success_flag_is_a_failure() {
    let err = map_response(&json!({ "error": "File too large" }), "http://x").unwrap_err();
    assert_eq!(err.to_string(), "File too large");
}

#[test]
fn failure_without_message_uses_generic_fallback() {
    for body in [json!({ "success": false }), json!({}), json!([1, 2])] {
        let err = map_response(&body, "http://x").unwrap_err();
        assert_eq!(err.to_string(), GENERIC_SERVICE_ERROR);
    }
}

#[test]
fn missing_required_field_is_a_service_error() {
    for field in [
        "original_url",
        "upscaled_url",
        "download_url",
        "original_dimensions",
        "upscaled_dimensions",
        "original_size",
        "upscaled_size",
        "scale_factor",
    ] {
        let mut body = success_body();
        body.as_object_mut().unwrap().remove(field);
        let err = map_response(&body, "http://x").unwrap_err();
        assert!(
            matches!(err, UploadError::MalformedResponse { field: f } if f == field),
            "field {field}: {err:?}"
        );
    }
}

#[test]
fn mistyped_dimensions_are_rejected() {
    let mut body = success_body();
    body["upscaled_dimensions"] = json!([3200]);
    assert!(map_response(&body, "http://x").is_err());
}

#[test]
fn fractional_scale_factor_is_kept() {
    let mut body = success_body();
    body["scale_factor"] = json!(2.5);
    assert_eq!(map_response(&body, "http://x").unwrap().scale_factor, 2.5);
}

#[tokio::test]
async fn submit_sends_exactly_two_multipart_fields() {
    let (base, received) = spawn_service(StatusCode::OK, success_body().to_string()).await;
    let client = UploadClient::new(&config(&base)).unwrap();

    let outcome = client.submit(photo_request(ScaleFactor::X4)).await;
    let UploadOutcome::Success(success) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(success.download_url, format!("{base}/d/1.png"));

    let fields = received.lock().unwrap().clone();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "file");
    assert_eq!(fields[0].file_name.as_deref(), Some("photo.png"));
    assert_eq!(fields[0].content_type.as_deref(), Some("image/png"));
    assert_eq!(fields[0].data, b"\x89PNG fake payload");
    assert_eq!(fields[1].name, "scale_factor");
    assert_eq!(fields[1].data, b"4");
}

#[tokio::test]
async fn error_status_with_json_body_surfaces_server_message() {
    let (base, _) = spawn_service(
        StatusCode::PAYLOAD_TOO_LARGE,
        json!({ "error": "File too large", "max_bytes": 16_777_216 }).to_string(),
    )
    .await;
    let client = UploadClient::new(&config(&base)).unwrap();

    let outcome = client.submit(photo_request(ScaleFactor::X2)).await;
    assert_eq!(outcome, UploadOutcome::failure("File too large"));
}

#[tokio::test]
async fn unparseable_body_is_a_network_error() {
    let (base, _) = spawn_service(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").await;
    let client = UploadClient::new(&config(&base)).unwrap();

    let outcome = client.submit(photo_request(ScaleFactor::X2)).await;
    assert_eq!(outcome, UploadOutcome::failure("network error"));
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    // Bind and drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let client = UploadClient::new(&config(&format!("http://{addr}"))).unwrap();

    let outcome = client.submit(photo_request(ScaleFactor::X2)).await;
    assert_eq!(outcome, UploadOutcome::failure("network error"));
}

#[tokio::test]
async fn unreadable_payload_is_reported_locally() {
    let (base, received) = spawn_service(StatusCode::OK, success_body().to_string()).await;
    let client = UploadClient::new(&config(&base)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.png");
    std::fs::write(&path, b"x").unwrap();
    let file = validate(RawFileDescriptor::from_path(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    let err = client
        .try_submit(&UploadRequest {
            file,
            scale_factor: ScaleFactor::X2,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::UploadErrorKind::Local);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn file_grown_past_limit_after_selection_is_not_sent() {
    let (base, received) = spawn_service(StatusCode::OK, success_body().to_string()).await;
    let client = UploadClient::new(&config(&base)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grow.png");
    std::fs::write(&path, b"small").unwrap();
    let file = validate(RawFileDescriptor::from_path(&path).unwrap()).unwrap();
    std::fs::write(&path, vec![0u8; (MAX_UPLOAD_BYTES + 1024) as usize]).unwrap();

    let err = client
        .try_submit(&UploadRequest {
            file,
            scale_factor: ScaleFactor::X2,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::GrewTooLarge { ref name } if name == "grow.png"));
    assert_eq!(err.kind(), crate::error::UploadErrorKind::Local);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn download_writes_file() {
    let (base, _) = spawn_service(StatusCode::OK, "{}").await;
    let client = UploadClient::new(&config(&base)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.png");

    let written = client
        .download(&format!("{base}/download/x_upscaled.png"), &dest)
        .await
        .unwrap();
    assert_eq!(written, 14);
    assert_eq!(std::fs::read(&dest).unwrap(), b"upscaled-bytes");
}
