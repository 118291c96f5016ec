//! File handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use attache_core::traits::Id;
use attache_files::{
    generate_path, ContentResponder, DiskSet, FileLifecycle, FileRecord, FileRepository,
    FileRepresentation, OwnerRef, RepositoryError,
};

use crate::error::{ApiError, ApiResult};
use crate::respond::{parse_accept, Negotiated};

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => ApiError::not_found("File", id),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Shared handler state. Hooks are registered on the lifecycle before it
/// is wrapped here.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn FileRepository>,
    pub lifecycle: Arc<FileLifecycle>,
    pub responder: Arc<ContentResponder>,
    pub default_disk: String,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn FileRepository>,
        lifecycle: Arc<FileLifecycle>,
        responder: Arc<ContentResponder>,
        default_disk: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            lifecycle,
            responder,
            default_disk: default_disk.into(),
        }
    }

    /// Convenience constructor for hosts without custom hooks.
    pub fn from_disks(
        repo: Arc<dyn FileRepository>,
        disks: DiskSet,
        default_disk: impl Into<String>,
    ) -> Self {
        Self::new(
            repo,
            Arc::new(FileLifecycle::new(disks.clone())),
            Arc::new(ContentResponder::new(disks)),
            default_disk,
        )
    }
}

#[derive(Debug, Serialize)]
struct FileCollection {
    total: usize,
    elements: Vec<FileRepresentation>,
}

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    /// `format=json` forces the structured representation.
    pub format: Option<String>,
}

/// Upload a file for an owner.
///
/// POST /owners/:kind/:owner_id/files
///
/// Store-then-persist sequencing: the blob is written first and the record
/// row only created when the write succeeded, so a veto or backend failure
/// leaves no row behind.
pub async fn upload_file(
    State(state): State<AppState>,
    Path((kind, owner_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let owner = OwnerRef::new(kind, owner_id);

    let mut uploaded: Option<(String, Option<String>, bytes::Bytes)> = None;
    let mut display_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("multipart error: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ApiError::bad_request("file field must carry a filename"))?;
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("upload read error: {}", e)))?;
                uploaded = Some((filename, content_type, data));
            }
            Some("displayName") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("upload read error: {}", e)))?;
                display_name = Some(text);
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        uploaded.ok_or_else(|| ApiError::bad_request("missing 'file' field"))?;

    let mut record = FileRecord::new(owner, &filename)
        .on_disk(&state.default_disk, generate_path(&filename));
    if let Some(ct) = content_type {
        record = record.with_mimetype(ct);
    }
    if let Some(name) = display_name {
        record = record.with_display_name(name);
    }

    if !state.lifecycle.store(&mut record, data).await {
        return Err(ApiError::bad_request("file was not stored"));
    }

    state.repo.create(&mut record).await?;
    info!(id = ?record.id, filename = %record.filename, "file uploaded");

    let rep = state.responder.represent(&record).await?;
    Ok((StatusCode::CREATED, Json(rep)))
}

/// List files belonging to an owner.
///
/// GET /owners/:kind/:owner_id/files
pub async fn list_files(
    State(state): State<AppState>,
    Path((kind, owner_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let owner = OwnerRef::new(kind, owner_id);
    let records = state.repo.find_by_owner(&owner).await?;

    let mut elements = Vec::with_capacity(records.len());
    for record in &records {
        elements.push(state.responder.represent(record).await?);
    }

    Ok(Json(FileCollection {
        total: elements.len(),
        elements,
    }))
}

/// Fetch a file's structured representation.
///
/// GET /files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    let record = find_record(&state, id).await?;
    let rep = state.responder.represent(&record).await?;
    Ok(Json(rep))
}

/// Fetch a file's content, negotiated against the Accept header.
///
/// GET /files/:id/content
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Query(query): Query<ContentQuery>,
    headers: HeaderMap,
) -> ApiResult<Negotiated> {
    let record = find_record(&state, id).await?;

    // Logical existence is "row persisted AND blob present".
    if !state.lifecycle.exists(&record).await {
        return Err(ApiError::not_found("File", id));
    }

    let accept = parse_accept(
        headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok()),
    );
    let prefer_json = query.format.as_deref() == Some("json");

    let response = state
        .responder
        .respond_to(&record, &accept, prefer_json)
        .await?;
    Ok(Negotiated(response))
}

/// Delete a file record and its blob.
///
/// DELETE /files/:id
///
/// Fail-closed: when the blob delete fails the row is retained and the
/// request answers 409, so no record is left pointing at an undeletable
/// blob and no blob is orphaned by a vanished record.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    let record = find_record(&state, id).await?;

    if !state.lifecycle.delete(&record).await {
        return Err(ApiError::conflict("blob deletion failed; record retained"));
    }

    state.repo.delete(id).await?;
    info!(id, filename = %record.filename, "file deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn find_record(state: &AppState, id: Id) -> ApiResult<FileRecord> {
    state
        .repo
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("File", id))
}
