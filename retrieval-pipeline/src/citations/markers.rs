use std::collections::BTreeMap;
use std::fmt::Write;

use common::file_search::GroundingSupport;

use super::CitationResolution;

/// Inserts `[n]` citation markers after every supported segment of `text`.
///
/// Numbers come from the resolution's fragment map, so several fragments of
/// the same document produce a single marker.
pub fn insert_citation_markers(
    text: &str,
    supports: &[GroundingSupport],
    resolution: &CitationResolution,
) -> String {
    let mut insertions: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for support in supports {
        let offset = next_char_boundary(text, support.end_index);
        let numbers = insertions.entry(offset).or_default();
        for position in &support.fragment_indices {
            if let Some(number) = resolution.citation_for_fragment(*position) {
                if !numbers.contains(&number) {
                    numbers.push(number);
                }
            }
        }
    }

    let mut annotated = String::with_capacity(text.len().saturating_add(insertions.len() * 4));
    let mut cursor = 0;
    for (offset, mut numbers) in insertions {
        if numbers.is_empty() {
            continue;
        }
        numbers.sort_unstable();
        annotated.push_str(text.get(cursor..offset).unwrap_or_default());
        for number in numbers {
            let _ = write!(annotated, "[{number}]");
        }
        cursor = offset;
    }
    annotated.push_str(text.get(cursor..).unwrap_or_default());
    annotated
}

/// Rewrites positional `[k]` markers (1-based fragment positions) into
/// citation numbers.
///
/// Markers with no mapping are left as they are. Adjacent markers that land on
/// the same citation collapse into one.
pub fn renumber_citation_markers(text: &str, resolution: &CitationResolution) -> String {
    let mut renumbered = String::with_capacity(text.len());
    let mut rest = text;
    let mut previous: Option<usize> = None;

    while let Some(start) = rest.find('[') {
        let (before, tail) = rest.split_at(start);
        if !before.is_empty() {
            renumbered.push_str(before);
            previous = None;
        }
        let after_bracket = tail.get(1..).unwrap_or_default();
        let digits = after_bracket
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();

        let closed = digits > 0 && after_bracket.as_bytes().get(digits) == Some(&b']');
        if !closed {
            renumbered.push('[');
            previous = None;
            rest = after_bracket;
            continue;
        }

        let marker = after_bracket.get(..digits).unwrap_or_default();
        let mapped = marker
            .parse::<usize>()
            .ok()
            .and_then(|k| k.checked_sub(1))
            .and_then(|position| resolution.citation_for_fragment(position));
        match mapped {
            Some(number) => {
                if previous != Some(number) {
                    let _ = write!(renumbered, "[{number}]");
                }
                previous = Some(number);
            }
            None => {
                let _ = write!(renumbered, "[{marker}]");
                previous = None;
            }
        }
        rest = after_bracket.get(digits.saturating_add(1)..).unwrap_or_default();
    }

    renumbered.push_str(rest);
    renumbered
}

fn next_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index = index.saturating_add(1);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::Citation;

    fn resolution(map: &[(usize, usize)]) -> CitationResolution {
        let citation_count = map.iter().map(|(_, n)| *n).max().unwrap_or(0);
        CitationResolution {
            citations: (1..=citation_count)
                .map(|index| Citation {
                    index,
                    document_id: format!("doc-{index}"),
                    title: format!("Doc {index}"),
                    snippet: None,
                    fragment_positions: Vec::new(),
                    resolved: true,
                })
                .collect(),
            fragment_map: map.iter().copied().collect(),
        }
    }

    #[test]
    fn renumbers_positional_markers() {
        let resolution = resolution(&[(0, 1), (1, 2), (2, 1), (3, 2), (4, 1)]);
        let text = "Leave accrues monthly [1]. Carry-over is capped [2][4]. See also [3].";
        assert_eq!(
            renumber_citation_markers(text, &resolution),
            "Leave accrues monthly [1]. Carry-over is capped [2]. See also [1]."
        );
    }

    #[test]
    fn leaves_unknown_and_malformed_markers_alone() {
        let resolution = resolution(&[(0, 1)]);
        let text = "a[0] b[9] c[x] d[ e[1]";
        assert_eq!(
            renumber_citation_markers(text, &resolution),
            "a[0] b[9] c[x] d[ e[1]"
        );
    }

    #[test]
    fn inserts_deduplicated_markers_after_segments() {
        let resolution = resolution(&[(0, 1), (1, 2), (2, 1)]);
        let text = "First claim. Second claim.";
        let supports = vec![
            GroundingSupport {
                end_index: 12,
                fragment_indices: vec![2, 0],
            },
            GroundingSupport {
                end_index: 26,
                fragment_indices: vec![1, 0],
            },
        ];
        assert_eq!(
            insert_citation_markers(text, &supports, &resolution),
            "First claim.[1] Second claim.[1][2]"
        );
    }

    #[test]
    fn clamps_offsets_to_char_boundaries() {
        let resolution = resolution(&[(0, 1)]);
        let text = "Résumé";
        let supports = vec![
            GroundingSupport {
                end_index: 2,
                fragment_indices: vec![0],
            },
            GroundingSupport {
                end_index: 99,
                fragment_indices: vec![0],
            },
        ];
        assert_eq!(
            insert_citation_markers(text, &supports, &resolution),
            "Ré[1]sumé[1]"
        );
    }

    #[test]
    fn supports_without_mapped_fragments_add_nothing() {
        let resolution = resolution(&[]);
        let supports = vec![GroundingSupport {
            end_index: 3,
            fragment_indices: vec![5],
        }];
        assert_eq!(insert_citation_markers("abc", &supports, &resolution), "abc");
    }
}
