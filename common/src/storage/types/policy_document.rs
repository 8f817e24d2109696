use tracing::debug;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Lifecycle of an uploaded document.
///
/// A document starts in `Processing` and is moved exactly once to either
/// `Ready` or `Failed`.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::Failed)
    }

    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (
                DocumentStatus::Processing,
                DocumentStatus::Ready | DocumentStatus::Failed
            )
        )
    }
}

/// File types accepted for upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Doc,
    Txt,
}

impl FileType {
    /// Resolves the file type from the extension of `file_name`, ignoring case.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "doc" => Some(FileType::Doc),
            "txt" => Some(FileType::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Doc => "doc",
            FileType::Txt => "txt",
        }
    }
}

/// User-supplied descriptive fields of an upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub category: String,
    pub version: String,
}

impl DocumentMetadata {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("title", &self.title),
            ("category", &self.category),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

stored_object!(PolicyDocument, "policy_document", {
    title: String,
    category: String,
    version: String,
    file_name: String,
    file_type: FileType,
    file_size: String,
    file_size_bytes: u64,
    blob_uri: String,
    blob_name: String,
    status: DocumentStatus,
    gemini_document_id: Option<String>,
    gemini_store_id: Option<String>,
    error_message: Option<String>
});

impl PolicyDocument {
    /// Builds a new record in the `processing` state.
    ///
    /// Ids are UUIDv7, so lexical id order follows upload order.
    pub fn new(
        metadata: DocumentMetadata,
        file_name: String,
        file_type: FileType,
        file_size_bytes: u64,
        blob_uri: String,
        blob_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            created_at: now,
            updated_at: now,
            title: metadata.title,
            category: metadata.category,
            version: metadata.version,
            file_name,
            file_type,
            file_size: format_file_size(file_size_bytes),
            file_size_bytes,
            blob_uri,
            blob_name,
            status: DocumentStatus::Processing,
            gemini_document_id: None,
            gemini_store_id: None,
            error_message: None,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        let id = self.id.clone();
        let created = db.store_item(self).await?;
        created.ok_or_else(|| {
            AppError::InternalError(format!("metadata record {id} was not returned on create"))
        })
    }

    pub async fn get(db: &SurrealDbClient, id: &str) -> Result<Option<Self>, AppError> {
        Ok(db.get_item::<Self>(id).await?)
    }

    /// Returns every document, newest first.
    pub async fn list_all(db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let mut documents = db.get_all_stored_items::<Self>().await?;
        documents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(documents)
    }

    /// Records a successful indexing run.
    pub async fn mark_ready(
        db: &SurrealDbClient,
        id: &str,
        document_handle: &str,
        store_handle: &str,
    ) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('policy_document', $id) SET
                    status = 'ready',
                    gemini_document_id = $document_handle,
                    gemini_store_id = $store_handle,
                    error_message = NONE,
                    updated_at = time::now()
                WHERE status = 'processing'
                RETURN AFTER",
            )
            .bind(("id", id.to_owned()))
            .bind(("document_handle", document_handle.to_owned()))
            .bind(("store_handle", store_handle.to_owned()))
            .await?
            .take(0)?;

        match updated {
            Some(document) => Ok(document),
            None => Err(Self::rejected_transition(db, id, DocumentStatus::Ready).await),
        }
    }

    /// Records a terminal indexing failure. The stored blob is left in place.
    pub async fn mark_failed(
        db: &SurrealDbClient,
        id: &str,
        error_message: &str,
    ) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('policy_document', $id) SET
                    status = 'failed',
                    error_message = $error_message,
                    updated_at = time::now()
                WHERE status = 'processing'
                RETURN AFTER",
            )
            .bind(("id", id.to_owned()))
            .bind(("error_message", error_message.to_owned()))
            .await?
            .take(0)?;

        match updated {
            Some(document) => Ok(document),
            None => Err(Self::rejected_transition(db, id, DocumentStatus::Failed).await),
        }
    }

    pub async fn delete(db: &SurrealDbClient, id: &str) -> Result<(), AppError> {
        let deleted = db.delete_item::<Self>(id).await?;
        if deleted.is_none() {
            return Err(AppError::NotFound(format!("document {id}")));
        }
        debug!(document_id = %id, "deleted metadata record");
        Ok(())
    }

    async fn rejected_transition(
        db: &SurrealDbClient,
        id: &str,
        next: DocumentStatus,
    ) -> AppError {
        match Self::get(db, id).await {
            Ok(Some(current)) => AppError::Validation(format!(
                "invalid status transition for document {id}: {} -> {}",
                current.status.as_str(),
                next.as_str()
            )),
            Ok(None) => AppError::NotFound(format!("document {id}")),
            Err(err) => err,
        }
    }
}

/// Formats a byte count for display, e.g. `1.5 MB`.
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = "KB";
    for next in UNITS.iter().skip(1) {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized().await.expect("init schema");
        db
    }

    fn sample(title: &str) -> PolicyDocument {
        PolicyDocument::new(
            DocumentMetadata {
                title: title.into(),
                category: "HR".into(),
                version: "1.0".into(),
            },
            "handbook.pdf".into(),
            FileType::Pdf,
            2048,
            "memory:///documents/handbook.pdf".into(),
            "documents/handbook.pdf".into(),
        )
    }

    #[test]
    fn file_type_from_name_is_case_insensitive() {
        assert_eq!(FileType::from_file_name("a.PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_file_name("a.b.docx"), Some(FileType::Docx));
        assert_eq!(FileType::from_file_name("notes.txt"), Some(FileType::Txt));
        assert_eq!(FileType::from_file_name("image.png"), None);
        assert_eq!(FileType::from_file_name("README"), None);
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use DocumentStatus::*;
        assert!(Processing.can_transition_to(Ready));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Ready.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Processing));
        assert!(Ready.is_terminal() && Failed.is_terminal() && !Processing.is_terminal());
    }

    #[test]
    fn formats_file_sizes() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(1_572_864), "1.5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn metadata_validation_rejects_blank_fields() {
        let metadata = DocumentMetadata {
            title: "Leave Policy".into(),
            category: " ".into(),
            version: "2".into(),
        };
        let err = metadata.validate().expect_err("blank category");
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("category")));
    }

    #[test]
    fn new_documents_start_processing_with_time_ordered_ids() {
        let first = sample("A");
        let second = sample("B");
        assert_eq!(first.status, DocumentStatus::Processing);
        assert_eq!(first.file_size, "2.0 KB");
        assert!(first.id < second.id);
    }

    #[tokio::test]
    async fn mark_ready_then_failed_is_rejected() {
        let db = memory_db().await;
        let doc = sample("Employee Handbook").create(&db).await.expect("create");

        let ready = PolicyDocument::mark_ready(&db, &doc.id, "files/abc", "fileSearchStores/s1")
            .await
            .expect("mark ready");
        assert_eq!(ready.status, DocumentStatus::Ready);
        assert_eq!(ready.gemini_document_id.as_deref(), Some("files/abc"));
        assert_eq!(ready.gemini_store_id.as_deref(), Some("fileSearchStores/s1"));
        assert!(ready.error_message.is_none());

        let err = PolicyDocument::mark_failed(&db, &doc.id, "late failure")
            .await
            .expect_err("ready documents cannot fail");
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("ready -> failed")));

        let stored = PolicyDocument::get(&db, &doc.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(stored.status, DocumentStatus::Ready);
    }

    #[tokio::test]
    async fn mark_failed_keeps_message_and_blocks_ready() {
        let db = memory_db().await;
        let doc = sample("Leave Policy").create(&db).await.expect("create");

        let failed = PolicyDocument::mark_failed(&db, &doc.id, "quota exceeded")
            .await
            .expect("mark failed");
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("quota exceeded"));
        assert_eq!(failed.blob_name, "documents/handbook.pdf");

        let err = PolicyDocument::mark_ready(&db, &doc.id, "files/x", "stores/y")
            .await
            .expect_err("failed documents cannot become ready");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn transitions_on_missing_document_are_not_found() {
        let db = memory_db().await;
        let err = PolicyDocument::mark_failed(&db, "missing", "boom")
            .await
            .expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));

        let err = PolicyDocument::delete(&db, "missing")
            .await
            .expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_all_returns_newest_first() {
        let db = memory_db().await;
        let older = sample("Older").create(&db).await.expect("create older");
        let newer = sample("Newer").create(&db).await.expect("create newer");

        let listed = PolicyDocument::list_all(&db).await.expect("list");
        let ids: Vec<_> = listed.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

        PolicyDocument::delete(&db, &older.id).await.expect("delete");
        assert_eq!(PolicyDocument::list_all(&db).await.expect("list").len(), 1);
    }
}
