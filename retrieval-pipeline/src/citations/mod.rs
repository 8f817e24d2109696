//! Turns grounding fragments into a deduplicated, renumbered citation list.
//!
//! Generated prose refers to fragments positionally, so besides the citation
//! list the resolution carries a map from every fragment position to the
//! citation number its document ended up with.

mod markers;
mod matching;

use std::collections::{BTreeMap, HashMap};

use common::{file_search::GroundingFragment, storage::types::policy_document::PolicyDocument};
use serde::Serialize;
use tracing::debug;

pub use markers::{insert_citation_markers, renumber_citation_markers};
pub use matching::{match_document, strip_known_extension, MatchStrategy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// 1-based, in order of first appearance among the fragments.
    pub index: usize,
    /// Stored document id, or the raw fragment reference when unresolved.
    pub document_id: String,
    pub title: String,
    pub snippet: Option<String>,
    /// Zero-based positions of every fragment folded into this citation.
    pub fragment_positions: Vec<usize>,
    pub resolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationResolution {
    pub citations: Vec<Citation>,
    /// Fragment position (zero-based) to citation index (1-based).
    pub fragment_map: BTreeMap<usize, usize>,
}

impl CitationResolution {
    pub fn citation_for_fragment(&self, position: usize) -> Option<usize> {
        self.fragment_map.get(&position).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CitationKey {
    Document(String),
    Unresolved(String),
}

pub fn resolve_citations(
    fragments: &[GroundingFragment],
    documents: &[PolicyDocument],
) -> CitationResolution {
    let mut resolution = CitationResolution::default();
    let mut slots: HashMap<CitationKey, usize> = HashMap::new();

    for (position, fragment) in fragments.iter().enumerate() {
        let (key, title, resolved) = match match_document(fragment, documents) {
            Some((document, strategy)) => {
                debug!(
                    position,
                    document_id = %document.id,
                    ?strategy,
                    "resolved grounding fragment"
                );
                (
                    CitationKey::Document(document.id.clone()),
                    document.title.clone(),
                    true,
                )
            }
            None => {
                debug!(position, reference = %fragment.reference, "unresolved grounding fragment");
                (
                    CitationKey::Unresolved(fragment.reference.clone()),
                    fragment
                        .title
                        .clone()
                        .unwrap_or_else(|| fragment.reference.clone()),
                    false,
                )
            }
        };

        let slot = match slots.get(&key) {
            Some(slot) => *slot,
            None => {
                let slot = resolution.citations.len();
                let document_id = match &key {
                    CitationKey::Document(id) | CitationKey::Unresolved(id) => id.clone(),
                };
                resolution.citations.push(Citation {
                    index: slot.saturating_add(1),
                    document_id,
                    title,
                    snippet: None,
                    fragment_positions: Vec::new(),
                    resolved,
                });
                slots.insert(key, slot);
                slot
            }
        };

        if let Some(citation) = resolution.citations.get_mut(slot) {
            if citation.snippet.is_none() {
                citation.snippet.clone_from(&fragment.text);
            }
            citation.fragment_positions.push(position);
            resolution.fragment_map.insert(position, citation.index);
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::policy_document::{DocumentMetadata, FileType};

    fn document(title: &str, handle: &str) -> PolicyDocument {
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
        doc.gemini_document_id = Some(handle.into());
        doc
    }

    fn fragment(reference: &str, title: Option<&str>, text: Option<&str>) -> GroundingFragment {
        GroundingFragment {
            reference: reference.into(),
            title: title.map(str::to_owned),
            text: text.map(str::to_owned),
        }
    }

    #[test]
    fn interleaved_fragments_collapse_per_document() {
        let a = document("Handbook", "files/a");
        let b = document("Leave Policy", "files/b");
        let docs = vec![b.clone(), a.clone()];
        let fragments = vec![
            fragment("files/a", None, Some("a0")),
            fragment("files/b", None, Some("b1")),
            fragment("files/a", None, Some("a2")),
            fragment("files/b", None, Some("b3")),
            fragment("files/a", None, Some("a4")),
        ];

        let resolution = resolve_citations(&fragments, &docs);

        assert_eq!(resolution.citations.len(), 2);
        let expected: BTreeMap<usize, usize> =
            [(0, 1), (2, 1), (4, 1), (1, 2), (3, 2)].into_iter().collect();
        assert_eq!(resolution.fragment_map, expected);

        let first = &resolution.citations[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.document_id, a.id);
        assert_eq!(first.snippet.as_deref(), Some("a0"));
        assert_eq!(first.fragment_positions, vec![0, 2, 4]);
        assert!(first.resolved);

        let second = &resolution.citations[1];
        assert_eq!(second.index, 2);
        assert_eq!(second.document_id, b.id);
        assert_eq!(second.title, "Leave Policy");
        assert_eq!(second.fragment_positions, vec![1, 3]);
    }

    #[test]
    fn unresolved_fragment_keeps_its_own_citation() {
        let docs = vec![document("Handbook", "files/a")];
        let fragments = vec![
            fragment("files/a", None, Some("known")),
            fragment("files/unknown", Some("Security Policy"), Some("mystery")),
        ];

        let resolution = resolve_citations(&fragments, &docs);

        assert_eq!(resolution.citations.len(), 2);
        let orphan = &resolution.citations[1];
        assert_eq!(orphan.document_id, "files/unknown");
        assert_eq!(orphan.title, "Security Policy");
        assert_eq!(orphan.snippet.as_deref(), Some("mystery"));
        assert!(!orphan.resolved);
        assert_eq!(resolution.citation_for_fragment(1), Some(2));
    }

    #[test]
    fn title_match_groups_with_handle_match() {
        let docs = vec![document("Leave Policy", "files/b")];
        let fragments = vec![
            fragment("Leave Policy.DOCX", Some("Leave Policy.DOCX"), None),
            fragment("files/b", None, Some("later text")),
        ];

        let resolution = resolve_citations(&fragments, &docs);

        assert_eq!(resolution.citations.len(), 1);
        let citation = &resolution.citations[0];
        assert_eq!(citation.fragment_positions, vec![0, 1]);
        assert_eq!(citation.snippet.as_deref(), Some("later text"));
    }

    #[test]
    fn first_snippet_is_not_overwritten() {
        let docs = vec![document("Handbook", "files/a")];
        let fragments = vec![
            fragment("files/a", None, Some("first")),
            fragment("files/a", None, Some("second")),
        ];
        let resolution = resolve_citations(&fragments, &docs);
        assert_eq!(resolution.citations[0].snippet.as_deref(), Some("first"));
    }

    #[test]
    fn documents_without_fragments_are_absent() {
        let docs = vec![document("Handbook", "files/a"), document("Unused", "files/u")];
        let resolution = resolve_citations(&[fragment("files/a", None, None)], &docs);
        assert_eq!(resolution.citations.len(), 1);
        assert_eq!(resolution.fragment_map.len(), 1);

        let empty = resolve_citations(&[], &docs);
        assert!(empty.citations.is_empty());
        assert!(empty.fragment_map.is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let docs = vec![document("Handbook", "files/a"), document("Leave", "files/b")];
        let fragments = vec![
            fragment("files/b", None, None),
            fragment("x", Some("nothing"), None),
            fragment("files/a", None, None),
        ];
        assert_eq!(
            resolve_citations(&fragments, &docs),
            resolve_citations(&fragments, &docs)
        );
    }
}
