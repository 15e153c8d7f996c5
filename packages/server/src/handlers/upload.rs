use axum::{
    Json,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use common::storage::upload_ref;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::upload::UploadResponse;
use crate::state::AppState;
use crate::utils::filename::validate_proof_filename;

/// Multipart overhead allowed on top of the configured file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_upload_size as usize + MULTIPART_OVERHEAD)
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Uploads",
    operation_id = "uploadProof",
    summary = "Upload a proof file",
    description = "Stores the `file` multipart field and returns its `/uploads/<filename>` reference. \
        Accepted types: PNG, JPEG, GIF, WebP and PDF.",
    request_body(content_type = "multipart/form-data", description = "Proof file in the `file` field"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(uploader = auth_user.id))]
pub async fn upload_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
        let proof = validate_proof_filename(&original)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let content_type = proof.content_type.to_string();
        let original = proof.name.to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
        if data.is_empty() {
            return Err(AppError::Validation("File is empty".into()));
        }

        let stored = state.uploads.put(&original, &data).await?;
        tracing::info!(filename = %stored.filename, size = stored.size, "Stored upload");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                path: upload_ref(&stored.filename),
                filename: stored.filename,
                size: stored.size,
                content_type,
            }),
        ));
    }

    Err(AppError::Validation("Missing 'file' field".into()))
}

#[utoipa::path(
    get,
    path = "/{filename}",
    tag = "Uploads",
    operation_id = "downloadProof",
    summary = "Download a proof file",
    params(("filename" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "File contents"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(filename = %filename))]
pub async fn download_file(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    if !state.uploads.exists(&filename).await? {
        return Err(AppError::NotFound(format!("File '{filename}' not found")));
    }

    let size = state.uploads.size(&filename).await?;
    let reader = state.uploads.get_stream(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CONTENT_DISPOSITION, content_disposition_value(&filename))
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// Build a `Content-Disposition` header value with an ASCII fallback name.
pub(crate) fn content_disposition_value(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii = if ascii.is_empty() {
        "download".to_string()
    } else {
        ascii
    };
    format!("inline; filename=\"{ascii}\"")
}
