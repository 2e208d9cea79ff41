// Method Comparison
// Side-by-side report of the rule-based and LLM extraction results for one
// document: per-type counts, content overlap, and average confidence.

use crate::models::{ComparisonReport, ConfidenceComparison, SectionRecord, TypeComparison};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Two sections describe the same text when their word sets agree this much.
const OVERLAP_THRESHOLD: f64 = 0.6;

/// Jaccard similarity over lowercase word sets.
pub fn jaccard_words(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let set_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn average_confidence(records: &[&SectionRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.confidence).sum::<f64>() / records.len() as f64
}

/// Compare the two methods' outputs. Overlap counting is greedy: each LLM
/// section pairs with at most one rule-based section of the same type.
pub fn compare(regex_sections: &[SectionRecord], llm_sections: &[SectionRecord]) -> ComparisonReport {
    let mut all_types: BTreeSet<String> = BTreeSet::new();
    for r in regex_sections.iter().chain(llm_sections) {
        all_types.insert(r.section_type.clone());
    }

    let mut type_comparison: BTreeMap<String, TypeComparison> = BTreeMap::new();
    let mut total_overlap = 0usize;
    for type_id in &all_types {
        let from_regex: Vec<&SectionRecord> = regex_sections
            .iter()
            .filter(|r| &r.section_type == type_id)
            .collect();
        let from_llm: Vec<&SectionRecord> = llm_sections
            .iter()
            .filter(|r| &r.section_type == type_id)
            .collect();

        let mut matched: HashSet<usize> = HashSet::new();
        let mut overlap = 0usize;
        for llm in &from_llm {
            let hit = from_regex.iter().enumerate().find(|(i, regex)| {
                !matched.contains(i) && jaccard_words(&regex.content, &llm.content) > OVERLAP_THRESHOLD
            });
            if let Some((i, _)) = hit {
                matched.insert(i);
                overlap += 1;
            }
        }
        total_overlap += overlap;

        type_comparison.insert(
            type_id.clone(),
            TypeComparison {
                regex_count: from_regex.len(),
                llm_count: from_llm.len(),
                overlap,
                regex_only: from_regex.len() - overlap,
                llm_only: from_llm.len() - overlap,
            },
        );
    }

    let regex_refs: Vec<&SectionRecord> = regex_sections.iter().collect();
    let llm_refs: Vec<&SectionRecord> = llm_sections.iter().collect();

    ComparisonReport {
        total_regex: regex_sections.len(),
        total_llm: llm_sections.len(),
        overlapping: total_overlap,
        regex_only: regex_sections.len() - total_overlap,
        llm_only: llm_sections.len() - total_overlap,
        type_comparison,
        confidence: ConfidenceComparison {
            regex_avg: average_confidence(&regex_refs),
            llm_avg: average_confidence(&llm_refs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Span;

    fn record(section_type: &str, content: &str, confidence: f64) -> SectionRecord {
        SectionRecord {
            section_type: section_type.to_string(),
            title: section_type.to_string(),
            content: content.to_string(),
            confidence,
            key_terms: vec![],
            reasoning: None,
            span: Span::new(0, 0),
        }
    }

    #[test]
    fn test_jaccard_words() {
        assert_eq!(jaccard_words("the company shall not", "the company shall not"), 1.0);
        assert_eq!(jaccard_words("alpha beta", "gamma delta"), 0.0);
        assert!(jaccard_words("the company shall not pay", "the company shall not") > 0.6);
    }

    #[test]
    fn test_overlap_counted_per_type() {
        let body = "The Company shall not declare or pay any dividend or distribution.";
        let regex = vec![record("restricted_payments", body, 0.6)];
        let llm = vec![
            record("restricted_payments", body, 0.9),
            record("liens", "No Lien shall be created on any asset.", 0.8),
        ];

        let report = compare(&regex, &llm);
        assert_eq!(report.total_regex, 1);
        assert_eq!(report.total_llm, 2);
        assert_eq!(report.overlapping, 1);
        assert_eq!(report.llm_only, 1);

        let rp = &report.type_comparison["restricted_payments"];
        assert_eq!(rp.overlap, 1);
        let liens = &report.type_comparison["liens"];
        assert_eq!(liens.regex_count, 0);
        assert_eq!(liens.llm_count, 1);
        assert_eq!(liens.overlap, 0);
        assert_eq!(liens.llm_only, 1);
    }

    #[test]
    fn test_greedy_matching_pairs_each_section_once() {
        let body = "The Company shall not declare or pay any dividend or distribution.";
        let regex = vec![record("restricted_payments", body, 0.6)];
        let llm = vec![
            record("restricted_payments", body, 0.9),
            record("restricted_payments", body, 0.85),
        ];
        let report = compare(&regex, &llm);
        assert_eq!(report.type_comparison["restricted_payments"].overlap, 1);
        assert_eq!(report.type_comparison["restricted_payments"].llm_only, 1);
    }

    #[test]
    fn test_average_confidence() {
        let regex = vec![record("liens", "a", 0.4), record("liens", "b", 0.6)];
        let report = compare(&regex, &[]);
        assert!((report.confidence.regex_avg - 0.5).abs() < 1e-9);
        assert_eq!(report.confidence.llm_avg, 0.0);
    }
}
