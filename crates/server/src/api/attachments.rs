use axum::Json;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tracing::debug;

use stowage_content::ByteStream;
use stowage_core::{AttachmentError, ContentId};
use stowage_thumbnail::ThumbnailKind;

use super::AppState;
use super::schemas::UploadResponse;
use crate::error::ServerError;

const JPEG: &str = "image/jpeg";
const OCTET_STREAM: &str = "application/octet-stream";

/// `POST /upload` -- store the multipart field `file`.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let limit = state.service.config().max_upload_bytes;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_owned();
        let mime = field.content_type().unwrap_or_default().to_owned();
        let data = read_limited(&mut field, limit).await?;

        let record = state.service.upload(data, &mime).await?;
        return Ok(Json(UploadResponse {
            id: record.id.to_string(),
            filename,
            mime: record.mime_type,
        }));
    }

    Err(ServerError::BadRequest("missing multipart field `file`".into()))
}

/// `GET /{id}/{filename}` -- stream the original. The filename is cosmetic.
pub async fn download(
    State(state): State<AppState>,
    Path((id, _filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    if let Some(response) = not_modified(&headers) {
        return Ok(response);
    }
    let id = parse_id(id)?;
    let attachment = state.service.fetch(&id).await?;
    Ok(stream_response(
        &state,
        &attachment.record.mime_type,
        attachment.stream,
    ))
}

/// `GET /thumb/{size}/{id}` -- stream a square thumbnail.
pub async fn thumbnail(
    State(state): State<AppState>,
    Path((size, id)): Path<(u32, String)>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    if let Some(response) = not_modified(&headers) {
        return Ok(response);
    }
    let id = parse_id(id)?;
    let (record, thumbnail) = state.service.fetch_thumbnail(&id, size).await?;
    let content_type = match thumbnail.kind {
        ThumbnailKind::Resized => JPEG,
        ThumbnailKind::Original => record.mime_type.as_str(),
    };
    Ok(stream_response(&state, content_type, thumbnail.stream))
}

/// `DELETE /{id}` -- remove an attachment. Deleting an unknown id succeeds.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let id = parse_id(id)?;
    state.service.delete(&id).await?;
    Ok(StatusCode::OK)
}

fn parse_id(raw: String) -> Result<ContentId, ServerError> {
    ContentId::parse(raw).map_err(|e| ServerError::from(AttachmentError::from(e)))
}

/// Attachments never change once stored, so any conditional request is
/// answered with 304 without touching the backends.
fn not_modified(headers: &HeaderMap) -> Option<Response> {
    let since = headers.get(header::IF_MODIFIED_SINCE)?;
    debug!("answering conditional request with 304");
    Some((StatusCode::NOT_MODIFIED, [(header::LAST_MODIFIED, since.clone())]).into_response())
}

fn stream_response(state: &AppState, content_type: &str, stream: ByteStream) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
    let cache_control = format!("private, max-age={}", state.cache_duration_seconds);
    let last_modified = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    response
}

async fn read_limited(field: &mut Field<'_>, limit: u64) -> Result<Bytes, ServerError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(ServerError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn multipart_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge
    } else {
        ServerError::BadRequest(err.body_text())
    }
}
