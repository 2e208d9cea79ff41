// Rule-based extraction pipeline
// normalize -> detect headings -> classify -> segment -> assemble.

pub mod assembler;
pub mod classifier;
pub mod heading_detector;
pub mod segmenter;

use crate::models::SectionRecord;
use crate::services::extraction::segmenter::ClassifiedHeading;
use crate::services::taxonomy::Taxonomy;
use crate::services::text_normalizer;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Heading candidates violated the strictly-increasing offset contract.
    /// Indicates corrupt input or a detector defect; the document is skipped.
    #[error("structurally inconsistent headings at offset {offset}")]
    StructuralInconsistency { offset: usize },
    #[error("unknown covenant target: {0}")]
    UnknownTarget(String),
}

/// Tuning knobs for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Minimum classifier confidence for a type to qualify.
    pub min_confidence: f64,
    /// Emit zero-confidence records for headings no type claimed.
    pub include_unclassified: bool,
    /// Covenant type ids to look for; `None` means the whole taxonomy.
    pub targets: Option<Vec<String>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            include_unclassified: false,
            targets: None,
        }
    }
}

/// Output of one rule-based extraction run over one document's text.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub sections: Vec<SectionRecord>,
    pub warnings: Vec<String>,
    /// The normalized text the section spans index into.
    pub text: String,
}

/// Run the full rule-based pipeline over raw extracted text.
pub fn extract_sections(
    raw_text: &str,
    taxonomy: &Taxonomy,
    options: &ExtractOptions,
) -> Result<ExtractionOutcome, ExtractError> {
    let specs = taxonomy
        .resolve_targets(options.targets.as_deref())
        .map_err(ExtractError::UnknownTarget)?;

    let normalized = text_normalizer::normalize(raw_text);
    let mut warnings = normalized.warnings;

    if normalized.text.is_empty() {
        return Ok(ExtractionOutcome {
            sections: Vec::new(),
            warnings,
            text: normalized.text,
        });
    }

    let candidates = heading_detector::detect_headings(&normalized.text);
    debug!(count = candidates.len(), "heading candidates accepted");

    let mut classified = Vec::with_capacity(candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        let window_end = candidates
            .get(i + 1)
            .map(|next| next.span.start)
            .unwrap_or(normalized.text.len());
        let window = &normalized.text[candidate.span.start..window_end];
        let matches = classifier::classify(candidate, window, &specs, options.min_confidence);
        classified.push(ClassifiedHeading {
            candidate: candidate.clone(),
            matches,
        });
    }

    if !classified.is_empty() && classified.iter().all(|h| h.matches.is_empty()) {
        warnings.push("no heading matched any covenant type".to_string());
    }

    let records = segmenter::segment(&normalized.text, &classified, options.include_unclassified)?;
    let sections = assembler::assemble(records);

    info!(
        headings = classified.len(),
        sections = sections.len(),
        "rule-based extraction complete"
    );

    Ok(ExtractionOutcome {
        sections,
        warnings,
        text: normalized.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::taxonomy::taxonomy;

    const AGREEMENT: &str = "SECTION 4.1 Restricted Payments\n\
The Company shall not declare or pay any dividend or make any distribution on account of its Equity Interests.\n\
SECTION 4.2 Liens\n\
No Lien shall be created, incurred or assumed on any asset of the Company or any Restricted Subsidiary.\n\
SECTION 9.1 Notices\n\
All notices shall be in writing and delivered to the addresses set forth below.";

    #[test]
    fn test_end_to_end_extraction() {
        let outcome =
            extract_sections(AGREEMENT, taxonomy(), &ExtractOptions::default()).unwrap();
        let ids: Vec<&str> = outcome
            .sections
            .iter()
            .map(|s| s.section_type.as_str())
            .collect();
        assert!(ids.contains(&"restricted_payments"));
        assert!(ids.contains(&"liens"));
        assert!(!ids.contains(&"unclassified"));
    }

    #[test]
    fn test_sections_reconstruct_covered_text() {
        // With every heading emitted, concatenated section contents cover the
        // document from the first heading onward with no gaps.
        let options = ExtractOptions {
            include_unclassified: true,
            ..ExtractOptions::default()
        };
        let outcome = extract_sections(AGREEMENT, taxonomy(), &options).unwrap();

        let mut spans: Vec<_> = outcome.sections.iter().map(|s| s.span).collect();
        spans.dedup();
        let mut cursor = spans[0].start;
        for span in &spans {
            assert_eq!(span.start, cursor, "gap before offset {}", span.start);
            cursor = span.end;
        }
        assert_eq!(cursor, outcome.text.len());

        let rebuilt: String = spans
            .iter()
            .map(|s| &outcome.text[s.start..s.end])
            .collect();
        assert_eq!(rebuilt, outcome.text[spans[0].start..]);
    }

    #[test]
    fn test_target_filtering() {
        let options = ExtractOptions {
            targets: Some(vec!["liens".to_string()]),
            ..ExtractOptions::default()
        };
        let outcome = extract_sections(AGREEMENT, taxonomy(), &options).unwrap();
        assert!(outcome.sections.iter().all(|s| s.section_type == "liens"));
        assert!(!outcome.sections.is_empty());
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let options = ExtractOptions {
            targets: Some(vec!["financial_ratios".to_string()]),
            ..ExtractOptions::default()
        };
        assert!(matches!(
            extract_sections(AGREEMENT, taxonomy(), &options),
            Err(ExtractError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_empty_input_yields_empty_result_with_warning() {
        let outcome = extract_sections("   ", taxonomy(), &ExtractOptions::default()).unwrap();
        assert!(outcome.sections.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let a = extract_sections(AGREEMENT, taxonomy(), &ExtractOptions::default()).unwrap();
        let b = extract_sections(AGREEMENT, taxonomy(), &ExtractOptions::default()).unwrap();
        let ids_a: Vec<_> = a.sections.iter().map(|s| (s.section_type.clone(), s.span)).collect();
        let ids_b: Vec<_> = b.sections.iter().map(|s| (s.section_type.clone(), s.span)).collect();
        assert_eq!(ids_a, ids_b);
    }
}
