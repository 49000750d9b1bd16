use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::content::ContentType;
use crate::ingest;
use crate::models::{Document, DocumentSource, UploadUrlRequest};
use crate::state::AppState;

/// POST /api/upload - multipart upload of one file in the `file` field.
/// Returns the document in `processing` state; analysis runs in the background.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), (StatusCode, String)> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(base_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let mime = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {e}")))?;
        upload = Some((filename, mime, data));
        break;
    }

    let (filename, mime, data) = upload.ok_or((
        StatusCode::BAD_REQUEST,
        "Missing file in multipart form".to_string(),
    ))?;
    if data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Uploaded file is empty".to_string()));
    }
    if data.len() > state.config.max_upload_bytes() {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("File exceeds {} MB", state.config.max_upload_mb),
        ));
    }

    let source = DocumentSource::Upload {
        content_type: mime
            .clone()
            .unwrap_or_else(|| ContentType::detect(None, &filename).mime().to_string()),
    };
    let doc = ingest::ingest_bytes(&state, data, filename, mime, source)
        .await
        .map_err(unprocessable)?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// POST /api/upload/url - fetch a web page or PDF and ingest it
pub async fn upload_url(
    State(state): State<AppState>,
    Json(req): Json<UploadUrlRequest>,
) -> Result<(StatusCode, Json<Document>), (StatusCode, String)> {
    let url = ingest::validate_url(&req.url)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e:#}")))?;

    let fetched = ingest::fetch_url(&state.http_client, &url, state.config.max_upload_bytes())
        .await
        .map_err(|e| {
            tracing::warn!("Fetching {url} failed: {e:#}");
            (StatusCode::BAD_GATEWAY, format!("{e:#}"))
        })?;

    let source = DocumentSource::Url {
        url: url.to_string(),
    };
    let doc = ingest::ingest_bytes(&state, fetched.bytes, fetched.filename, fetched.mime, source)
        .await
        .map_err(unprocessable)?;
    Ok((StatusCode::CREATED, Json(doc)))
}

fn unprocessable(e: anyhow::Error) -> (StatusCode, String) {
    tracing::warn!("Ingest rejected: {e:#}");
    (StatusCode::UNPROCESSABLE_ENTITY, format!("{e:#}"))
}

/// Strip any client-supplied directory components.
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim().to_string()
}
