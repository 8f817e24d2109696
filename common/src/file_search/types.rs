use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Everything needed to start indexing one document.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub content_type: String,
    pub display_name: String,
    /// Key/value pairs attached to the indexed document for later filtering.
    pub metadata: Vec<(String, String)>,
    pub store_handle: String,
}

/// Handle of a long-running indexing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded { document_handle: String },
    Failed { message: String },
}

/// A retrieved snippet and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingFragment {
    /// URI or handle of the originating file.
    pub reference: String,
    pub title: Option<String>,
    pub text: Option<String>,
}

/// A span of the generated answer backed by one or more fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSupport {
    /// Byte offset in the answer text where the supported segment ends.
    pub end_index: usize,
    /// Zero-based positions into [`GroundedAnswer::fragments`].
    pub fragment_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundedAnswer {
    pub text: String,
    pub fragments: Vec<GroundingFragment>,
    pub supports: Vec<GroundingSupport>,
}
