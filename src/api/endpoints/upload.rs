//! Direct-upload endpoints: `POST /upload` and `POST /upload_file`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;

use crate::api::error::{ApiError, EMPTY_FILENAME, NO_FILE_SENT};
use crate::api::types::{ApiContext, FieldsResponse, IngestResponse};
use crate::pipeline::import::stage_bytes;

/// `POST /upload`: extract the two fields without touching the store.
pub async fn upload(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FieldsResponse>, ApiError> {
    let (filename, bytes) = receive_file(multipart).await?;

    let core = ctx.core.clone();
    let fields = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let staged = stage_bytes(core.upload_dir(), &filename, &bytes)?;
        Ok(core.processor().read_fields(staged.path()))
    })
    .await??;

    Ok(Json(FieldsResponse::from(&fields)))
}

/// `POST /upload_file`: extract, persist and report any earlier match.
pub async fn upload_file(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let (filename, bytes) = receive_file(multipart).await?;

    let core = ctx.core.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let staged = stage_bytes(core.upload_dir(), &filename, &bytes)?;
        let conn = core.open_db()?;
        Ok(core.processor().ingest(&conn, staged.path())?)
    })
    .await??;

    Ok(Json(IngestResponse::from(outcome)))
}

/// Pull the `file` part out of the form as `(filename, bytes)`.
///
/// A request that is not multipart at all counts as "no file sent".
async fn receive_file(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, Vec<u8>), ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "Upload without a multipart body");
        ApiError::BadRequest(NO_FILE_SENT.into())
    })?;

    loop {
        let Some(field) = multipart.next_field().await? else {
            return Err(ApiError::BadRequest(NO_FILE_SENT.into()));
        };

        if field.name() != Some("file") {
            continue;
        }
        // A plain text part named "file" is not an upload.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.trim().is_empty() {
            return Err(ApiError::BadRequest(EMPTY_FILENAME.into()));
        }

        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }
}
