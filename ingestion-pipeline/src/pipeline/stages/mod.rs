use chrono::Utc;
use common::{
    error::AppError,
    file_search::{OperationStatus, UploadRequest},
    storage::types::policy_document::PolicyDocument,
};
use state_machines::core::GuardError;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::{
    context::PipelineContext,
    state::{BlobStored, IndexingMachine, Indexed, Received, Registered, Submitted},
};
use crate::utils::{blob_name_for, content_type_for};

#[instrument(level = "trace", skip_all, fields(file_name = %ctx.file_name))]
pub async fn store_blob(
    machine: IndexingMachine<(), Received>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IndexingMachine<(), BlobStored>, AppError> {
    let blob_name = blob_name_for(&ctx.file_name, Utc::now());
    let content_type = content_type_for(&ctx.file_name);
    let blob = ctx
        .storage
        .put(
            &blob_name,
            ctx.bytes.clone(),
            content_type.essence_str(),
            &[
                ("title", ctx.metadata.title.as_str()),
                ("category", ctx.metadata.category.as_str()),
                ("version", ctx.metadata.version.as_str()),
            ],
        )
        .await
        .map_err(|err| err.context(format!("store blob {blob_name}")))?;

    debug!(blob_name = %blob.blob_name, uri = %blob.uri, bytes = ctx.bytes.len(), "stored document blob");
    ctx.blob = Some(blob);

    machine
        .store_blob()
        .map_err(|(_, guard)| map_guard_error("store_blob", &guard))
}

#[instrument(level = "trace", skip_all, fields(file_name = %ctx.file_name))]
pub async fn register(
    machine: IndexingMachine<(), BlobStored>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IndexingMachine<(), Registered>, AppError> {
    let blob = ctx.blob()?.clone();
    let document = PolicyDocument::new(
        ctx.metadata.clone(),
        ctx.file_name.clone(),
        ctx.file_type,
        u64::try_from(ctx.bytes.len()).unwrap_or(u64::MAX),
        blob.uri,
        blob.blob_name,
    )
    .create(ctx.db)
    .await?;

    info!(
        document_id = %document.id,
        title = %document.title,
        file_size = %document.file_size,
        "registered document as processing"
    );
    ctx.document = Some(document);

    machine
        .register()
        .map_err(|(_, guard)| map_guard_error("register", &guard))
}

#[instrument(level = "trace", skip_all, fields(document_id = ctx.document_id().unwrap_or_default()))]
pub async fn submit(
    machine: IndexingMachine<(), Registered>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IndexingMachine<(), Submitted>, AppError> {
    let store_handle = ctx.registry.get_or_create_store().await?;
    let document = ctx.document()?;
    let request = UploadRequest {
        bytes: ctx.bytes.clone(),
        content_type: content_type_for(&ctx.file_name).essence_str().to_string(),
        display_name: document.title.clone(),
        metadata: vec![
            ("title".into(), document.title.clone()),
            ("category".into(), document.category.clone()),
            ("version".into(), document.version.clone()),
        ],
        store_handle: store_handle.clone(),
    };

    let operation = ctx
        .services
        .upload_document(request)
        .await
        .map_err(|err| err.context("submit document for indexing"))?;

    debug!(operation = %operation.name, store_handle = %store_handle, "submitted document for indexing");
    ctx.store_handle = Some(store_handle);
    ctx.operation = Some(operation);

    machine
        .submit()
        .map_err(|(_, guard)| map_guard_error("submit", &guard))
}

/// Polls the indexing operation until it settles or the attempt ceiling is
/// reached. No polling continues after this returns.
#[instrument(level = "trace", skip_all, fields(document_id = ctx.document_id().unwrap_or_default()))]
pub async fn await_indexing(
    machine: IndexingMachine<(), Submitted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IndexingMachine<(), Indexed>, AppError> {
    let operation = ctx.operation()?.clone();
    let max_attempts = ctx.tuning.max_poll_attempts;

    let mut document_handle = None;
    for attempt in 1..=max_attempts {
        sleep(ctx.tuning.poll_interval).await;
        match ctx
            .services
            .poll_operation(&operation)
            .await
            .map_err(|err| err.context(format!("poll attempt {attempt}")))?
        {
            OperationStatus::Pending => {
                debug!(attempt, max_attempts, operation = %operation.name, "indexing still running");
            }
            OperationStatus::Succeeded {
                document_handle: handle,
            } => {
                info!(attempt, document_handle = %handle, "indexing finished");
                document_handle = Some(handle);
                break;
            }
            OperationStatus::Failed { message } => {
                return Err(AppError::FileSearch(format!(
                    "indexing failed after {attempt} poll attempts: {message}"
                )));
            }
        }
    }

    let Some(document_handle) = document_handle else {
        return Err(AppError::IndexingTimeout {
            attempts: max_attempts,
            waited_secs: ctx.tuning.max_wait().as_secs(),
        });
    };

    let document_id = ctx.document()?.id.clone();
    let store_handle = ctx.store_handle.clone().ok_or_else(|| {
        AppError::InternalError("store handle expected to be available".into())
    })?;
    let document =
        PolicyDocument::mark_ready(ctx.db, &document_id, &document_handle, &store_handle).await?;
    ctx.document_handle = Some(document_handle);
    ctx.document = Some(document);

    machine
        .index()
        .map_err(|(_, guard)| map_guard_error("index", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid indexing pipeline transition during {event}: {guard:?}"
    ))
}
