// Covex Data Models
// Shared record shapes for the regex and LLM extraction paths

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Byte offsets into the normalized document text (0-based, end-exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One extracted covenant section.
///
/// Serializes exactly the contracted output fields in declaration order;
/// `reasoning` is present only for LLM-sourced records and offsets are
/// in-memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    pub section_type: String,
    pub title: String,
    pub content: String,
    pub confidence: f64,
    pub key_terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(skip)]
    pub span: Span,
}

/// Per-document output record written by the batch driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub method: String,
    pub file: String,
    pub page_count: usize,
    pub text_length: usize,
    pub warnings: Vec<String>,
    pub sections: Vec<SectionRecord>,
}

/// Per-covenant-type counts when comparing the two extraction methods.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypeComparison {
    pub regex_count: usize,
    pub llm_count: usize,
    pub overlap: usize,
    pub regex_only: usize,
    pub llm_only: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfidenceComparison {
    pub regex_avg: f64,
    pub llm_avg: f64,
}

/// Comparison of regex and LLM extraction output for one document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComparisonReport {
    pub total_regex: usize,
    pub total_llm: usize,
    pub overlapping: usize,
    pub regex_only: usize,
    pub llm_only: usize,
    pub type_comparison: BTreeMap<String, TypeComparison>,
    pub confidence: ConfidenceComparison,
}
