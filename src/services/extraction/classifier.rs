// Covenant Classifier
// Scores a heading candidate and its section window against the covenant
// taxonomy. Scoring is a single pure function over structured inputs so it
// can be unit-tested away from the text-scanning code.

use crate::services::extraction::heading_detector::HeadingCandidate;
use crate::services::taxonomy::CovenantTypeSpec;

const HEADING_WEIGHT: f64 = 0.5;
const KEYWORD_WEIGHT: f64 = 0.3;
const INDICATOR_WEIGHT: f64 = 0.2;

/// One covenant type scored at or above the confidence threshold for a
/// heading candidate.
#[derive(Debug, Clone)]
pub struct TypeMatch {
    pub type_id: String,
    pub confidence: f64,
    /// Keyword cues that actually matched in the section window, ordered by
    /// first occurrence.
    pub matched_keywords: Vec<String>,
}

/// Take the first `count` sentences of a window (sentence-ending punctuation
/// delimited), returned as a prefix slice. A dot between two digits is a
/// numbering token ("4.1"), not a sentence end.
fn leading_sentences(window: &str, count: usize) -> &str {
    let bytes = window.as_bytes();
    let mut seen = 0usize;
    let mut prev: Option<char> = None;
    for (idx, c) in window.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let numbering_dot = c == '.'
                && prev.map_or(false, |p| p.is_ascii_digit())
                && bytes.get(idx + 1).map_or(false, |b| b.is_ascii_digit());
            if !numbering_dot {
                seen += 1;
                if seen >= count {
                    return &window[..idx + c.len_utf8()];
                }
            }
        }
        prev = Some(c);
    }
    window
}

fn keywords_by_first_occurrence(window_lower: &str, keywords: &[String]) -> Vec<(usize, String)> {
    let mut found: Vec<(usize, String)> = keywords
        .iter()
        .filter_map(|k| window_lower.find(k.as_str()).map(|pos| (pos, k.clone())))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found
}

/// Confidence for one covenant type:
///   0.5 * fraction of heading patterns matching the heading text
/// + 0.3 * fraction of keyword cues found in the section window
/// + 0.2 * any section-indicator phrase in the first two sentences.
pub fn score_spec(
    spec: &CovenantTypeSpec,
    heading_text: &str,
    window: &str,
) -> (f64, Vec<String>) {
    let heading_hits = spec
        .heading_patterns
        .iter()
        .filter(|p| p.is_match(heading_text))
        .count();
    let heading_score = heading_hits as f64 / spec.heading_patterns.len().max(1) as f64;

    let window_lower = window.to_lowercase();
    let matched = keywords_by_first_occurrence(&window_lower, &spec.keywords);
    let keyword_score = matched.len() as f64 / spec.keywords.len().max(1) as f64;

    let opening = leading_sentences(&window_lower, 2);
    let indicator_score = if spec
        .section_indicators
        .iter()
        .any(|ind| opening.contains(ind.as_str()))
    {
        1.0
    } else {
        0.0
    };

    let confidence = HEADING_WEIGHT * heading_score
        + KEYWORD_WEIGHT * keyword_score
        + INDICATOR_WEIGHT * indicator_score;

    (
        confidence.clamp(0.0, 1.0),
        matched.into_iter().map(|(_, k)| k).collect(),
    )
}

/// Classify a heading candidate against the supplied specs. Every type at or
/// above `min_confidence` is returned, ranked by descending confidence; an
/// empty result means the candidate is unclassified.
pub fn classify(
    candidate: &HeadingCandidate,
    window: &str,
    specs: &[&CovenantTypeSpec],
    min_confidence: f64,
) -> Vec<TypeMatch> {
    let mut matches: Vec<TypeMatch> = specs
        .iter()
        .filter_map(|spec| {
            let (confidence, matched_keywords) = score_spec(spec, &candidate.text, window);
            if confidence >= min_confidence {
                Some(TypeMatch {
                    type_id: spec.id.clone(),
                    confidence,
                    matched_keywords,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Span;
    use crate::services::taxonomy::taxonomy;

    fn candidate(text: &str) -> HeadingCandidate {
        HeadingCandidate {
            span: Span::new(0, text.len()),
            text: text.to_string(),
            numbering: None,
            numbered: true,
            line_end: text.len(),
        }
    }

    #[test]
    fn test_restricted_payments_scores_above_threshold() {
        let spec = taxonomy().get("restricted_payments").unwrap();
        let window = "SECTION 4.1 Restricted Payments\nThe Company shall not declare or pay any dividend or make any distribution.";
        let (confidence, keywords) = score_spec(spec, "SECTION 4.1 Restricted Payments", window);
        assert!(confidence > 0.3, "confidence was {}", confidence);
        assert!(keywords.contains(&"dividend".to_string()));
    }

    #[test]
    fn test_unrelated_heading_scores_low() {
        let spec = taxonomy().get("change_of_control").unwrap();
        let window = "SECTION 4.2 Liens\nNo Lien shall be created on any asset.";
        let (confidence, _) = score_spec(spec, "SECTION 4.2 Liens", window);
        assert!(confidence < 0.3, "confidence was {}", confidence);
    }

    #[test]
    fn test_keywords_ordered_by_first_occurrence() {
        let spec = taxonomy().get("transactions_with_affiliates").unwrap();
        let window =
            "Affiliate Transactions\nAll intercompany dealings with any Affiliate must be on arm's length terms.";
        let (_, keywords) = score_spec(spec, "Affiliate Transactions", window);
        let inter = keywords.iter().position(|k| k == "intercompany").unwrap();
        let affil = keywords.iter().position(|k| k == "affiliate").unwrap();
        assert!(affil < inter);
    }

    #[test]
    fn test_classify_returns_multiple_types() {
        let tax = taxonomy();
        let specs: Vec<_> = tax.specs().iter().collect();
        let heading = "SECTION 4.7 Restricted Payments and Affiliate Transactions";
        let window = "SECTION 4.7 Restricted Payments and Affiliate Transactions\nThe Company shall not declare or pay any dividend to any Affiliate except on arm's length terms.";
        let matches = classify(&candidate(heading), window, &specs, 0.3);
        let ids: Vec<&str> = matches.iter().map(|m| m.type_id.as_str()).collect();
        assert!(ids.contains(&"restricted_payments"));
        assert!(ids.contains(&"transactions_with_affiliates"));
        // Ranked by descending confidence.
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_threshold_is_explicit_not_global() {
        let tax = taxonomy();
        let specs: Vec<_> = tax.specs().iter().collect();
        let heading = "SECTION 4.2 Liens";
        let window = "SECTION 4.2 Liens\nNo Lien shall be created on any asset.";
        let strict = classify(&candidate(heading), window, &specs, 0.95);
        assert!(strict.is_empty());
        let lax = classify(&candidate(heading), window, &specs, 0.3);
        assert!(lax.iter().any(|m| m.type_id == "liens"));
    }

    #[test]
    fn test_leading_sentences() {
        let text = "First one. Second one! Third one.";
        assert_eq!(leading_sentences(text, 2), "First one. Second one!");
        assert_eq!(leading_sentences("no punctuation here", 2), "no punctuation here");
    }

    #[test]
    fn test_leading_sentences_skips_numbering_dots() {
        let text = "SECTION 4.1 Liens\nNo Lien shall be created. A pledge is prohibited. More text.";
        assert_eq!(
            leading_sentences(text, 2),
            "SECTION 4.1 Liens\nNo Lien shall be created. A pledge is prohibited."
        );
    }

    #[test]
    fn test_indicator_window_spans_two_body_sentences_after_numbering() {
        // The indicator phrase sits in the second body sentence; the heading's
        // numbering dot must not eat one of the two counted sentences.
        let spec = taxonomy().get("liens").unwrap();
        let window = "SECTION 4.2 Security\nDefined terms apply here. No Lien shall be created on any asset.";
        let (confidence, _) = score_spec(spec, "SECTION 4.2 Security", window);
        // 0.2 indicator weight is present even though the phrase is in the
        // second sentence.
        assert!(confidence >= 0.2, "confidence was {}", confidence);
    }
}
