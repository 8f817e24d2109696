use bytes::Bytes;
use common::{
    error::AppError,
    file_search::{FileSearchService, UploadOperation},
    storage::{
        db::SurrealDbClient,
        store::{StorageManager, StoredBlob},
        types::policy_document::{DocumentMetadata, FileType, PolicyDocument},
    },
};
use retrieval_pipeline::StoreRegistry;
use tracing::error;

use super::config::IndexingTuning;

/// Per-upload state threaded through the indexing stages.
pub struct PipelineContext<'a> {
    pub file_name: String,
    pub file_type: FileType,
    pub metadata: DocumentMetadata,
    pub bytes: Bytes,
    pub db: &'a SurrealDbClient,
    pub storage: &'a StorageManager,
    pub services: &'a dyn FileSearchService,
    pub registry: &'a StoreRegistry,
    pub tuning: &'a IndexingTuning,
    pub blob: Option<StoredBlob>,
    pub document: Option<PolicyDocument>,
    pub store_handle: Option<String>,
    pub operation: Option<UploadOperation>,
    pub document_handle: Option<String>,
}

impl<'a> PipelineContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_name: String,
        file_type: FileType,
        metadata: DocumentMetadata,
        bytes: Bytes,
        db: &'a SurrealDbClient,
        storage: &'a StorageManager,
        services: &'a dyn FileSearchService,
        registry: &'a StoreRegistry,
        tuning: &'a IndexingTuning,
    ) -> Self {
        Self {
            file_name,
            file_type,
            metadata,
            bytes,
            db,
            storage,
            services,
            registry,
            tuning,
            blob: None,
            document: None,
            store_handle: None,
            operation: None,
            document_handle: None,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document.as_ref().map(|document| document.id.as_str())
    }

    pub fn blob(&self) -> Result<&StoredBlob, AppError> {
        self.blob
            .as_ref()
            .ok_or_else(|| AppError::InternalError("stored blob expected to be available".into()))
    }

    pub fn document(&self) -> Result<&PolicyDocument, AppError> {
        self.document.as_ref().ok_or_else(|| {
            AppError::InternalError("metadata record expected to be available".into())
        })
    }

    pub fn operation(&self) -> Result<&UploadOperation, AppError> {
        self.operation.as_ref().ok_or_else(|| {
            AppError::InternalError("indexing operation expected to be available".into())
        })
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            file_name = %self.file_name,
            document_id = self.document_id().unwrap_or("unregistered"),
            blob_name = self.blob.as_ref().map_or("none", |blob| blob.blob_name.as_str()),
            error = %err,
            "indexing pipeline aborted"
        );
        err
    }
}
