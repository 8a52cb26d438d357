//! Image upload and retrieval handlers.
//!
//! - POST /upload - Store a multipart `file` field, answer with its public URL
//! - GET /{hexcode}.{ext} - Serve a stored image
//! - GET / - Redirect to the API docs

use std::net::{IpAddr, SocketAddr};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{ConnectInfo, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use jiff::Timestamp;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use pti::{Hexcode, content_type_for_name, extension_for_content_type, sanitize_file_name};

use crate::api::{ApiError, AppState, ErrorResponse};
use crate::config::NamingStrategy;
use crate::db::{DbError, ImageDb, ImageRecord, NewImage};
use crate::storage::StorageError;

/// Response for a successful upload.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Public URL of the image
    #[schema(example = "http://localhost:29911/1a2b3c4d.png")]
    pub url: String,
    /// Eight-character public identifier
    #[schema(value_type = String, example = "1a2b3c4d")]
    pub hexcode: Hexcode,
    /// Name of the file on disk
    pub stored_name: String,
}

/// Multipart body of an upload.
#[derive(ToSchema)]
#[allow(dead_code)]
pub(crate) struct UploadForm {
    /// The image (PNG, JPEG or GIF by default)
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload_image))
        .route("/{file}", get(get_image))
}

/// An upload read out of the multipart body.
struct IncomingFile {
    original_name: String,
    content_type: String,
    data: Bytes,
}

/// Upload an image
#[utoipa::path(
    post,
    path = "/upload",
    tag = "images",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Invalid file type or malformed upload", body = ErrorResponse),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Persistence or filesystem failure", body = ErrorResponse),
    )
)]
pub(crate) async fn upload_image(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = read_file_field(&state, &mut multipart).await?;
    let size = upload.data.len();

    let record = match state.config.naming {
        NamingStrategy::Original => {
            store_under_original_name(&state, &upload, peer.ip()).await?
        }
        NamingStrategy::Hexcode => {
            store_under_hexcode(&state, &upload, peer.ip(), Hexcode::generate).await?
        }
    };

    let ext = extension_for(&record.stored_name, &upload.content_type);
    let url = state.config.image_url(&record.hexcode, &ext);

    info!(
        hexcode = %record.hexcode,
        stored_name = %record.stored_name,
        original_name = %record.original_name,
        upload_ip = %record.upload_ip,
        size,
        "Image uploaded"
    );

    Ok(Json(UploadResponse {
        url,
        hexcode: record.hexcode,
        stored_name: record.stored_name,
    }))
}

/// Find the `file` field, checking its content type before reading the body.
async fn read_file_field(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<IncomingFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            debug!(name = ?field.name(), "Skipping multipart field");
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !state.config.accepts(&content_type) {
            return Err(ApiError::InvalidContentType(content_type));
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;

        return Ok(IncomingFile {
            original_name,
            content_type,
            data,
        });
    }

    Err(ApiError::MissingFile)
}

/// Store under the sanitised client name, numbered if taken. The hexcode is
/// only chosen at insert time, so a collision never touches the file.
async fn store_under_original_name(
    state: &AppState,
    upload: &IncomingFile,
    upload_ip: IpAddr,
) -> Result<ImageRecord, ApiError> {
    let candidate = sanitize_file_name(&upload.original_name);
    let stored_name = state.storage.free_name(&candidate).await?;
    state.storage.put(&stored_name, upload.data.clone()).await?;
    debug!(%stored_name, size = upload.data.len(), "Wrote image file");

    let new_image = NewImage {
        original_name: &upload.original_name,
        stored_name: &stored_name,
        upload_time: Timestamp::now(),
        upload_ip,
        hexcode: Hexcode::generate(),
    };
    let record = insert_with_retry(
        &state.db(),
        new_image,
        state.config.hexcode_attempts,
        Hexcode::generate,
    )
    .inspect_err(|e| {
        warn!(%stored_name, %e, "Record insert failed, file left on disk without a record");
    })?;

    Ok(record)
}

/// Store as `<hexcode>.<ext>`. Every attempt draws a hexcode, derives the
/// name from it, writes and inserts, so the file name and the record always
/// carry the same hexcode. A hexcode whose record or file already exists is
/// skipped before anything is written.
async fn store_under_hexcode(
    state: &AppState,
    upload: &IncomingFile,
    upload_ip: IpAddr,
    mut next_hexcode: impl FnMut() -> Hexcode,
) -> Result<ImageRecord, ApiError> {
    let ext = extension_for(
        &sanitize_file_name(&upload.original_name),
        &upload.content_type,
    );
    let attempts = state.config.hexcode_attempts.max(1);
    let mut attempt = 1;

    loop {
        let hexcode = next_hexcode();
        let stored_name = format!("{hexcode}.{ext}");

        let record_taken = state.db().find_by_hexcode(&hexcode)?.is_some();
        let file_taken = state.storage.free_name(&stored_name).await? != stored_name;

        if !record_taken && !file_taken {
            state.storage.put(&stored_name, upload.data.clone()).await?;
            debug!(%stored_name, size = upload.data.len(), "Wrote image file");

            let new_image = NewImage {
                original_name: &upload.original_name,
                stored_name: &stored_name,
                upload_time: Timestamp::now(),
                upload_ip,
                hexcode: hexcode.clone(),
            };
            let inserted = state.db().insert_image(&new_image);
            match inserted {
                Ok(record) => return Ok(record),
                Err(DbError::DuplicateHexcode(_)) if attempt < attempts => {
                    warn!(%stored_name, "Hexcode taken concurrently, file left on disk without a record");
                }
                Err(e) => {
                    warn!(%stored_name, %e, "Record insert failed, file left on disk without a record");
                    return Err(e.into());
                }
            }
        } else if attempt >= attempts {
            return Err(DbError::DuplicateHexcode(hexcode).into());
        }

        warn!(%hexcode, attempt, "Hexcode collision, drawing another");
        attempt += 1;
    }
}

/// Extension for the public URL: the stored name's own extension, else one
/// implied by the content type.
fn extension_for(name: &str, content_type: &str) -> String {
    match pti::split_extension(name) {
        (_, Some(ext)) if !ext.is_empty() => ext.to_string(),
        _ => extension_for_content_type(content_type)
            .unwrap_or("bin")
            .to_string(),
    }
}

/// Insert a record, drawing a fresh hexcode whenever the current one is
/// already taken, at most `attempts` times in total.
fn insert_with_retry(
    db: &ImageDb,
    mut image: NewImage<'_>,
    attempts: u32,
    mut next_hexcode: impl FnMut() -> Hexcode,
) -> Result<ImageRecord, DbError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match db.insert_image(&image) {
            Err(DbError::DuplicateHexcode(taken)) if attempt < attempts => {
                warn!(%taken, attempt, "Hexcode collision, drawing another");
                image.hexcode = next_hexcode();
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Fetch an image
///
/// The extension is not checked: any extension serves the stored file.
#[utoipa::path(
    get,
    path = "/{file}",
    tag = "images",
    params(("file" = String, Path, description = "`<hexcode>.<ext>`, e.g. `1a2b3c4d.png`")),
    responses(
        (status = 200, description = "Image bytes, content type inferred from the stored file"),
        (status = 404, description = "Image not found, or its file is missing", body = ErrorResponse),
    )
)]
pub(crate) async fn get_image(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let (hexcode, _ext) = file.split_once('.').ok_or(ApiError::NotFound)?;
    if hexcode.parse::<Hexcode>().is_err() {
        return Err(ApiError::NotFound);
    }

    let record = state
        .db()
        .find_by_hexcode(hexcode)?
        .ok_or(ApiError::NotFound)?;

    let missing = |e: StorageError| match e {
        StorageError::NotFound => {
            warn!(hexcode = %record.hexcode, stored_name = %record.stored_name, "Record has no file on disk");
            ApiError::FileMissing
        }
        other => ApiError::Filesystem(other),
    };

    // Get metadata first for Content-Length
    let meta = state
        .storage
        .meta(&record.stored_name)
        .await
        .map_err(missing)?;
    let stream = state
        .storage
        .get(&record.stored_name)
        .await
        .map_err(missing)?;

    let content_type = content_type_for_name(&record.stored_name);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, meta.size.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Redirect to the API docs
#[utoipa::path(
    get,
    path = "/",
    tag = "images",
    responses((status = 302, description = "Redirect to /docs"))
)]
pub(crate) async fn root() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/docs")])
}
