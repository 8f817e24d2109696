//! Contract of the external semantic search service that indexes uploaded
//! documents and answers questions grounded in them.

pub mod gemini;
mod types;

use async_trait::async_trait;

use crate::error::AppError;

pub use gemini::GeminiFileSearch;
pub use types::{
    GroundedAnswer, GroundingFragment, GroundingSupport, OperationStatus, UploadOperation,
    UploadRequest,
};

#[async_trait]
pub trait FileSearchService: Send + Sync {
    /// Creates a new store and returns its handle.
    async fn create_store(&self, display_name: &str) -> Result<String, AppError>;

    /// Starts indexing a document into a store.
    async fn upload_document(&self, request: UploadRequest) -> Result<UploadOperation, AppError>;

    async fn poll_operation(
        &self,
        operation: &UploadOperation,
    ) -> Result<OperationStatus, AppError>;

    /// Removes an indexed document. Removing an unknown handle succeeds.
    async fn delete_document(&self, document_handle: &str) -> Result<(), AppError>;

    async fn generate_answer(
        &self,
        query: &str,
        store_handle: &str,
    ) -> Result<GroundedAnswer, AppError>;
}
