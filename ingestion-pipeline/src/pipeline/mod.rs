mod config;
mod context;
mod stages;
mod state;

pub use config::IndexingTuning;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use common::{
    error::AppError,
    file_search::FileSearchService,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::policy_document::{DocumentMetadata, FileType, PolicyDocument},
    },
};
use retrieval_pipeline::StoreRegistry;
use tracing::{error, info, warn};

use self::{
    context::PipelineContext,
    stages::{await_indexing, register, store_blob, submit},
    state::received,
};

/// A document as it arrives from the caller.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub metadata: DocumentMetadata,
}

/// Drives uploads to a terminal `ready`/`failed` state and removes documents.
#[allow(clippy::module_name_repetitions)]
pub struct IndexingPipeline {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    services: Arc<dyn FileSearchService>,
    registry: Arc<StoreRegistry>,
    tuning: IndexingTuning,
}

impl IndexingPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        services: Arc<dyn FileSearchService>,
        registry: Arc<StoreRegistry>,
        tuning: IndexingTuning,
    ) -> Self {
        Self {
            db,
            storage,
            services,
            registry,
            tuning,
        }
    }

    /// Stores, registers and indexes one upload, waiting for indexing to
    /// settle.
    ///
    /// Once the metadata record exists every failure marks it `failed`; the
    /// blob and the record are kept either way.
    #[tracing::instrument(
        skip_all,
        fields(file_name = %upload.file_name, bytes = upload.bytes.len())
    )]
    pub async fn ingest(&self, upload: DocumentUpload) -> Result<PolicyDocument, AppError> {
        let DocumentUpload {
            bytes,
            file_name,
            metadata,
        } = upload;

        metadata.validate()?;
        let file_type = FileType::from_file_name(&file_name).ok_or_else(|| {
            AppError::Validation(format!(
                "unsupported file type for {file_name}; expected pdf, docx, doc or txt"
            ))
        })?;
        if bytes.is_empty() {
            return Err(AppError::Validation(format!("{file_name} is empty")));
        }

        let mut ctx = PipelineContext::new(
            file_name,
            file_type,
            metadata,
            bytes,
            self.db.as_ref(),
            &self.storage,
            self.services.as_ref(),
            self.registry.as_ref(),
            &self.tuning,
        );

        match self.drive_pipeline(&mut ctx).await {
            Ok(document) => Ok(document),
            Err(err) => Err(self.record_failure(&ctx, err).await),
        }
    }

    async fn drive_pipeline(
        &self,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<PolicyDocument, AppError> {
        let machine = received();
        let pipeline_started = Instant::now();

        let machine = store_blob(machine, ctx).await.map_err(|err| ctx.abort(err))?;
        let machine = register(machine, ctx).await.map_err(|err| ctx.abort(err))?;

        let stage_start = Instant::now();
        let machine = submit(machine, ctx).await.map_err(|err| ctx.abort(err))?;
        let submit_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = await_indexing(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let indexing_duration = stage_start.elapsed();

        let document = ctx.document()?.clone();
        info!(
            document_id = %document.id,
            document_handle = document.gemini_document_id.as_deref().unwrap_or_default(),
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            submit_ms = Self::duration_millis(submit_duration),
            indexing_ms = Self::duration_millis(indexing_duration),
            "indexing pipeline finished"
        );

        Ok(document)
    }

    /// Marks the registered record `failed` and shapes the error returned to
    /// the caller. Failures before registration leave nothing to mark.
    async fn record_failure(&self, ctx: &PipelineContext<'_>, err: AppError) -> AppError {
        let Some(document_id) = ctx.document_id() else {
            return err;
        };

        let message = err.to_string();
        if let Err(mark_err) = PolicyDocument::mark_failed(&self.db, document_id, &message).await
        {
            error!(
                %document_id,
                error = %mark_err,
                original_error = %message,
                "failed to mark document as failed"
            );
        } else {
            warn!(%document_id, error = %message, "document indexing failed; blob retained");
        }

        match err {
            AppError::IndexingTimeout { .. } => err,
            _ => AppError::Processing(format!("document {document_id}: {message}")),
        }
    }

    /// Deletes the blob, the indexed copy and the metadata record, in that
    /// order. Only the indexed copy may fail without aborting the removal.
    #[tracing::instrument(skip_all, fields(document_id = %id))]
    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let document = PolicyDocument::get(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document {id}")))?;

        self.storage
            .delete(&document.blob_name)
            .await
            .map_err(|err| err.context(format!("delete blob for document {id}")))?;

        if let Some(document_handle) = document.gemini_document_id.as_deref() {
            if let Err(err) = self.services.delete_document(document_handle).await {
                warn!(
                    document_id = %id,
                    %document_handle,
                    error = %err,
                    "failed to delete indexed document; continuing"
                );
            }
        }

        PolicyDocument::delete(&self.db, id).await?;
        info!(document_id = %id, blob_name = %document.blob_name, "removed document");
        Ok(())
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}
