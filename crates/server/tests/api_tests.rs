use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use image::{ImageFormat, Rgb, RgbImage};
use tower::ServiceExt;

use stowage_content_memory::MemoryContentStore;
use stowage_lifecycle::{AttachmentService, ServiceConfig};
use stowage_metadata::MetadataIndex;
use stowage_metadata_memory::MemoryMetadataBackend;
use stowage_server::api::schemas::{HealthResponse, UploadResponse};
use stowage_server::api::{AppState, router};
use stowage_thumbnail::{ImageResizer, ThumbnailCache, ThumbnailConfig};

// -- Helpers --------------------------------------------------------------

const BOUNDARY: &str = "stowage-test-boundary";

fn build_app() -> axum::Router {
    let content = Arc::new(MemoryContentStore::new());
    let index = Arc::new(MetadataIndex::new(
        Arc::new(MemoryMetadataBackend::new()),
        "attachments_",
        "attachments_datetime",
    ));
    let thumbnails = Arc::new(ThumbnailCache::new(
        ThumbnailConfig::default(),
        content.clone(),
        Arc::new(ImageResizer::new()),
    ));
    let service = AttachmentService::builder()
        .content(content)
        .index(index)
        .thumbnails(thumbnails)
        .service_config(ServiceConfig {
            max_upload_bytes: 1024,
            ..ServiceConfig::default()
        })
        .build()
        .expect("service should build");

    router(AppState {
        service: Arc::new(service),
        cache_duration_seconds: 3600,
    })
}

fn multipart_body(field: &str, filename: &str, mime: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
    )
    .into_bytes();
    if let Some(mime) = mime {
        body.extend_from_slice(format!("Content-Type: {mime}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn upload(app: &axum::Router, filename: &str, mime: Option<&str>, data: &[u8]) -> UploadResponse {
    let response = app
        .clone()
        .oneshot(upload_request(multipart_body("file", filename, mime, data)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn small_png() -> Vec<u8> {
    let img = RgbImage::from_fn(12, 12, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = build_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.status, "ok");
    assert_eq!(body.metrics.uploads, 0);
}

#[tokio::test]
async fn upload_then_download() {
    let app = build_app();
    let uploaded = upload(&app, "notes.txt", Some("text/plain"), b"hello attachments").await;
    assert_eq!(uploaded.filename, "notes.txt");
    assert_eq!(uploaded.mime, "text/plain");

    let response = app
        .clone()
        .oneshot(get(&format!("/{}/notes.txt", uploaded.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "private, max-age=3600"
    );
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_bytes(response).await, b"hello attachments");
}

#[tokio::test]
async fn filename_in_download_path_is_ignored() {
    let app = build_app();
    let uploaded = upload(&app, "a.bin", None, b"opaque bytes").await;
    assert_eq!(uploaded.mime, "application/octet-stream");

    let response = app
        .oneshot(get(&format!("/{}/renamed.dat", uploaded.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"opaque bytes");
}

#[tokio::test]
async fn identical_uploads_share_an_id() {
    let app = build_app();
    let first = upload(&app, "one.txt", Some("text/plain"), b"same").await;
    let second = upload(&app, "two.txt", Some("text/plain"), b"same").await;
    assert_eq!(first.id, second.id);
    assert_eq!(second.filename, "two.txt");
}

#[tokio::test]
async fn unknown_id_is_404() {
    let app = build_app();
    let response = app.oneshot(get("/deadbeefcafe/x.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_400() {
    let app = build_app();
    let response = app.oneshot(get("/not-an-id!/x.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn if_modified_since_short_circuits_to_304() {
    let app = build_app();
    let request = Request::builder()
        .uri("/deadbeefcafe/x.txt")
        .header(header::IF_MODIFIED_SINCE, "Wed, 21 Oct 2015 07:28:00 GMT")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(
        response.headers()[header::LAST_MODIFIED],
        "Wed, 21 Oct 2015 07:28:00 GMT"
    );
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let app = build_app();
    let response = app
        .oneshot(upload_request(multipart_body(
            "file",
            "big.bin",
            None,
            &[7u8; 2048],
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn upload_without_file_field_is_400() {
    let app = build_app();
    let response = app
        .oneshot(upload_request(multipart_body(
            "attachment",
            "x.txt",
            Some("text/plain"),
            b"x",
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn thumbnail_of_image_is_jpeg() {
    let app = build_app();
    let uploaded = upload(&app, "pic.png", Some("image/png"), &small_png()).await;

    let response = app
        .oneshot(get(&format!("/thumb/64/{}", uploaded.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = body_bytes(response).await;
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn thumbnail_of_non_image_serves_original() {
    let app = build_app();
    let uploaded = upload(&app, "doc.txt", Some("text/plain"), b"plain text").await;

    let response = app
        .oneshot(get(&format!("/thumb/128/{}", uploaded.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_bytes(response).await, b"plain text");
}

#[tokio::test]
async fn thumbnail_of_unknown_id_is_404() {
    let app = build_app();
    let response = app.oneshot(get("/thumb/64/deadbeefcafe")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_attachment() {
    let app = build_app();
    let uploaded = upload(&app, "gone.txt", Some("text/plain"), b"short lived").await;

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/{}", uploaded.id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/{}/gone.txt", uploaded.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/health")).await.unwrap();
    let body: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.metrics.uploads, 1);
    assert_eq!(body.metrics.deletes, 1);
}
