// Section Segmenter
// Carves the normalized text into contiguous sections: each section spans
// from its heading's start offset to the next heading's start (exclusive),
// or to end of document for the last one.

use crate::models::{SectionRecord, Span};
use crate::services::extraction::classifier::TypeMatch;
use crate::services::extraction::heading_detector::HeadingCandidate;
use crate::services::extraction::ExtractError;
use crate::services::taxonomy::UNCLASSIFIED;

/// A heading candidate together with its classification outcome. An empty
/// `matches` list means no type cleared the threshold.
#[derive(Debug)]
pub struct ClassifiedHeading {
    pub candidate: HeadingCandidate,
    pub matches: Vec<TypeMatch>,
}

/// Build section records from ordered classified headings. Each qualifying
/// type yields its own record over the same span; unclassified headings are
/// emitted only when `include_unclassified` is set.
///
/// Duplicate heading start offsets violate the detector's strictly-increasing
/// contract and abort this document's processing.
pub fn segment(
    text: &str,
    headings: &[ClassifiedHeading],
    include_unclassified: bool,
) -> Result<Vec<SectionRecord>, ExtractError> {
    let mut records = Vec::new();

    for (i, heading) in headings.iter().enumerate() {
        let start = heading.candidate.span.start;
        let end = headings
            .get(i + 1)
            .map(|next| next.candidate.span.start)
            .unwrap_or(text.len());

        if let Some(next) = headings.get(i + 1) {
            if next.candidate.span.start == start {
                return Err(ExtractError::StructuralInconsistency { offset: start });
            }
        }

        let span = Span::new(start, end);
        if span.is_empty() {
            return Err(ExtractError::StructuralInconsistency { offset: start });
        }
        let content = text[start..end].to_string();
        let title = heading.candidate.text.clone();

        if heading.matches.is_empty() {
            if include_unclassified {
                records.push(SectionRecord {
                    section_type: UNCLASSIFIED.to_string(),
                    title,
                    content,
                    confidence: 0.0,
                    key_terms: Vec::new(),
                    reasoning: None,
                    span,
                });
            }
            continue;
        }

        for m in &heading.matches {
            records.push(SectionRecord {
                section_type: m.type_id.clone(),
                title: title.clone(),
                content: content.clone(),
                confidence: m.confidence,
                key_terms: m.matched_keywords.clone(),
                reasoning: None,
                span,
            });
        }
    }

    Ok(records)
}
