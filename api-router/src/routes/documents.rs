use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::types::policy_document::{DocumentMetadata, DocumentStatus, FileType, PolicyDocument},
};
use ingestion_pipeline::{utils::content_type_for, DocumentUpload};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadDocumentParams {
    #[form_data(limit = "unlimited")]
    pub file: FieldData<Bytes>,
    pub title: String,
    pub category: String,
    pub version: String,
}

/// Client-facing view of a stored document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: String,
    pub title: String,
    pub category: String,
    pub version: String,
    pub file_name: String,
    pub file_type: FileType,
    pub file_size: String,
    pub blob_uri: String,
    pub blob_name: String,
    pub status: DocumentStatus,
    pub gemini_document_id: Option<String>,
    pub gemini_store_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PolicyDocument> for DocumentView {
    fn from(document: PolicyDocument) -> Self {
        Self {
            id: document.id,
            title: document.title,
            category: document.category,
            version: document.version,
            file_name: document.file_name,
            file_type: document.file_type,
            file_size: document.file_size,
            blob_uri: document.blob_uri,
            blob_name: document.blob_name,
            status: document.status,
            gemini_document_id: document.gemini_document_id,
            gemini_store_id: document.gemini_store_id,
            error_message: document.error_message,
            created_at: document.created_at,
        }
    }
}

/// Blocks until indexing settles, so a slow index can hold the request for
/// the whole poll window.
pub async fn upload_document(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadDocumentParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .file
        .metadata
        .file_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("uploaded file must have a file name".into()))?;

    info!(
        %file_name,
        file_bytes = input.file.contents.len(),
        title = %input.title,
        category = %input.category,
        "Received document upload"
    );

    let document = state
        .pipeline
        .ingest(DocumentUpload {
            bytes: input.file.contents,
            file_name,
            metadata: DocumentMetadata {
                title: input.title.trim().to_string(),
                category: input.category.trim().to_string(),
                version: input.version.trim().to_string(),
            },
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentView::from(document))))
}

pub async fn list_documents(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = PolicyDocument::list_all(&state.db).await?;
    let views: Vec<DocumentView> = documents.into_iter().map(DocumentView::from).collect();
    Ok(Json(views))
}

pub async fn get_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = find_document(&state, &id).await?;
    Ok(Json(DocumentView::from(document)))
}

pub async fn delete_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.pipeline.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Time-limited download link; only available on signing-capable storage.
pub async fn document_url(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = find_document(&state, &id).await?;
    let ttl_minutes = state.config.signed_url_ttl_minutes;
    let url = state
        .storage
        .signed_url(&document.blob_name, ttl_minutes)
        .await?;

    Ok(Json(json!({
        "url": url.as_str(),
        "expiresInMinutes": ttl_minutes,
    })))
}

pub async fn download_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let document = find_document(&state, &id).await?;
    let stream = state.storage.get_stream(&document.blob_name).await?;
    let content_type = content_type_for(&document.file_name);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name.replace(['"', '\\'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn find_document(state: &ApiState, id: &str) -> Result<PolicyDocument, AppError> {
    PolicyDocument::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document {id}")))
}
