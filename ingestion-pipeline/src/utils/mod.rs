use chrono::{DateTime, Utc};
use common::storage::types::policy_document::FileType;
use mime::Mime;
use uuid::Uuid;

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOC_CONTENT_TYPE: &str = "application/msword";

/// Content type sent along with the document bytes, derived from the file
/// name suffix.
pub fn content_type_for(file_name: &str) -> Mime {
    let essence = match FileType::from_file_name(file_name) {
        Some(FileType::Pdf) => return mime::APPLICATION_PDF,
        Some(FileType::Txt) => return mime::TEXT_PLAIN,
        Some(FileType::Docx) => DOCX_CONTENT_TYPE,
        Some(FileType::Doc) => DOC_CONTENT_TYPE,
        None => return mime::APPLICATION_OCTET_STREAM,
    };
    essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// Object store key for an upload:
/// `documents/{upload millis}-{random prefix}-{sanitized file name}`.
pub fn blob_name_for(file_name: &str, uploaded_at: DateTime<Utc>) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "documents/{}-{}-{}",
        uploaded_at.timestamp_millis(),
        nonce.get(..8).unwrap_or(&nonce),
        sanitize_file_name(file_name)
    )
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "document".to_string()
    } else {
        sanitized.to_string()
    }
}
