use common::{file_search::GroundingFragment, storage::types::policy_document::PolicyDocument};

const KNOWN_EXTENSIONS: [&str; 4] = [".pdf", ".docx", ".doc", ".txt"];

/// How a fragment was tied to a stored document, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    DocumentHandle,
    ExactTitle,
    CaseInsensitiveTitle,
    ExtensionlessTitle,
}

/// Finds the stored document a fragment refers to, trying each strategy in
/// order and stopping at the first hit.
pub fn match_document<'a>(
    fragment: &GroundingFragment,
    documents: &'a [PolicyDocument],
) -> Option<(&'a PolicyDocument, MatchStrategy)> {
    if let Some(document) = documents
        .iter()
        .find(|doc| doc.gemini_document_id.as_deref() == Some(fragment.reference.as_str()))
    {
        return Some((document, MatchStrategy::DocumentHandle));
    }

    let title = fragment.title.as_deref()?;

    if let Some(document) = documents.iter().find(|doc| doc.title == title) {
        return Some((document, MatchStrategy::ExactTitle));
    }

    let lowered = title.to_lowercase();
    if let Some(document) = documents
        .iter()
        .find(|doc| doc.title.to_lowercase() == lowered)
    {
        return Some((document, MatchStrategy::CaseInsensitiveTitle));
    }

    let stripped = strip_known_extension(title).trim().to_lowercase();
    documents
        .iter()
        .find(|doc| strip_known_extension(&doc.title).trim().to_lowercase() == stripped)
        .map(|document| (document, MatchStrategy::ExtensionlessTitle))
}

/// Removes one trailing `.pdf`, `.docx`, `.doc` or `.txt`, ignoring case.
pub fn strip_known_extension(title: &str) -> &str {
    for extension in KNOWN_EXTENSIONS {
        let Some(split_at) = title.len().checked_sub(extension.len()) else {
            continue;
        };
        if let (Some(stem), Some(suffix)) = (title.get(..split_at), title.get(split_at..)) {
            if suffix.eq_ignore_ascii_case(extension) {
                return stem;
            }
        }
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::policy_document::{DocumentMetadata, FileType};

    fn document(title: &str, handle: Option<&str>) -> PolicyDocument {
        let mut doc = PolicyDocument::new(
            DocumentMetadata {
                title: title.into(),
                category: "HR".into(),
                version: "1".into(),
            },
            format!("{title}.pdf"),
            FileType::Pdf,
            10,
            "memory:///x".into(),
            "x".into(),
        );
        doc.gemini_document_id = handle.map(str::to_owned);
        doc
    }

    fn fragment(reference: &str, title: Option<&str>) -> GroundingFragment {
        GroundingFragment {
            reference: reference.into(),
            title: title.map(str::to_owned),
            text: None,
        }
    }

    #[test]
    fn strips_known_extensions_case_insensitively() {
        assert_eq!(strip_known_extension("Leave Policy.DOCX"), "Leave Policy");
        assert_eq!(strip_known_extension("Leave Policy.doc"), "Leave Policy");
        assert_eq!(strip_known_extension("notes.Txt"), "notes");
        assert_eq!(strip_known_extension("archive.zip"), "archive.zip");
        assert_eq!(strip_known_extension("pdf"), "pdf");
        assert_eq!(strip_known_extension("Überblick.pdf"), "Überblick");
    }

    #[test]
    fn document_handle_wins_over_title() {
        let docs = vec![
            document("Handbook", None),
            document("Other", Some("fileSearchStores/s/documents/h")),
        ];
        let (doc, strategy) = match_document(
            &fragment("fileSearchStores/s/documents/h", Some("Handbook")),
            &docs,
        )
        .expect("match");
        assert_eq!(doc.title, "Other");
        assert_eq!(strategy, MatchStrategy::DocumentHandle);
    }

    #[test]
    fn exact_title_precedes_case_insensitive() {
        let docs = vec![document("handbook", None), document("Handbook", None)];
        let (doc, strategy) =
            match_document(&fragment("ref", Some("Handbook")), &docs).expect("match");
        assert_eq!(doc.title, "Handbook");
        assert_eq!(strategy, MatchStrategy::ExactTitle);

        let (doc, strategy) =
            match_document(&fragment("ref", Some("HANDBOOK")), &docs).expect("match");
        assert_eq!(doc.title, "handbook");
        assert_eq!(strategy, MatchStrategy::CaseInsensitiveTitle);
    }

    #[test]
    fn extension_insensitive_title_match() {
        let docs = vec![document("Leave Policy", None)];
        let (doc, strategy) =
            match_document(&fragment("ref", Some("Leave Policy.DOCX")), &docs).expect("match");
        assert_eq!(doc.title, "Leave Policy");
        assert_eq!(strategy, MatchStrategy::ExtensionlessTitle);

        let docs = vec![document("Travel Policy.pdf", None)];
        let (_, strategy) =
            match_document(&fragment("ref", Some("travel policy")), &docs).expect("match");
        assert_eq!(strategy, MatchStrategy::ExtensionlessTitle);
    }

    #[test]
    fn untitled_unknown_fragment_does_not_match() {
        let docs = vec![document("Handbook", Some("files/a"))];
        assert!(match_document(&fragment("files/zzz", None), &docs).is_none());
        assert!(match_document(&fragment("files/zzz", Some("Security")), &docs).is_none());
    }
}
