// LLM Covenant Extractor
// Chunks the document, asks a chat model for covenant sections as strict
// JSON, validates each returned record against the taxonomy, and merges
// near-duplicate sections produced by overlapping chunks.

use crate::models::{SectionRecord, Span};
use crate::services::comparison::jaccard_words;
use crate::services::providers::{ChatResult, ProviderClient, ProviderError, ProviderSpec};
use crate::services::taxonomy::{CovenantTypeSpec, Taxonomy, UNCLASSIFIED};
use serde::Deserialize;
use tracing::{debug, warn};

const MAX_RESPONSE_TOKENS: i32 = 4000;

/// Chunks overlapping by this much reproduce sections cut at a boundary;
/// the duplicate-merge pass removes the copies.
const DUPLICATE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct LlmExtractionResponse {
    covenants: Vec<LlmCovenant>,
}

#[derive(Debug, Deserialize)]
struct LlmCovenant {
    section_type: String,
    title: String,
    content: String,
    confidence: f64,
    #[serde(default)]
    key_terms: Vec<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Instructions plus the covenant catalog the model may label with. The
/// response must be a single json object, no prose around it.
pub fn system_prompt(targets: &[&CovenantTypeSpec]) -> String {
    let mut catalog = String::new();
    for spec in targets {
        catalog.push_str(&format!("- {}: {}\n", spec.id, spec.description));
    }
    format!(
        "You are a covenant analyst reviewing legal agreement text.\n\
Find every covenant section of the following types:\n{catalog}\n\
Respond with strict json only, shaped as:\n\
{{\"covenants\": [{{\"section_type\": \"<type id>\", \"title\": \"<heading as written>\", \
\"content\": \"<full section text>\", \"confidence\": <0.0-1.0>, \
\"key_terms\": [\"<term>\"], \"reasoning\": \"<one sentence>\"}}]}}\n\
Use only the type ids listed above. Return {{\"covenants\": []}} when the text \
contains none of them."
    )
}

/// Split text into chunks of roughly `size` bytes overlapping by `overlap`,
/// cutting at a paragraph or sentence break near the target when one exists.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<&str> {
    if text.len() <= size {
        return if text.is_empty() { vec![] } else { vec![text] };
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        let mut end = (start + size).min(text.len());
        if end < text.len() {
            end = snap_to_break(text, start, end);
        }
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(&text[start..end]);
        if end >= text.len() {
            break;
        }
        let mut next = end.saturating_sub(overlap).max(start + 1);
        while !text.is_char_boundary(next) {
            next += 1;
        }
        start = next;
    }
    chunks
}

/// Look back from `end` for a paragraph break, then a sentence break, within
/// the last quarter of the chunk.
fn snap_to_break(text: &str, start: usize, end: usize) -> usize {
    let window_start = start + (end - start) * 3 / 4;
    let window = &text[window_start..end];
    if let Some(pos) = window.rfind("\n\n") {
        return window_start + pos + 2;
    }
    if let Some(pos) = window.rfind(". ") {
        return window_start + pos + 2;
    }
    end
}

/// Pull the JSON object out of a model reply, tolerating code fences or
/// stray prose around it.
pub fn extract_json(content: &str) -> Option<&str> {
    let first = content.find('{')?;
    let last = content.rfind('}')?;
    if last < first {
        return None;
    }
    Some(&content[first..=last])
}

fn parse_covenants(
    content: &str,
    taxonomy: &Taxonomy,
    targets: &[&CovenantTypeSpec],
) -> Result<Vec<SectionRecord>, ProviderError> {
    let json = extract_json(content)
        .ok_or_else(|| ProviderError::JsonError("no JSON object in response".to_string()))?;
    let parsed: LlmExtractionResponse =
        serde_json::from_str(json).map_err(|e| ProviderError::JsonError(e.to_string()))?;

    let mut records = Vec::with_capacity(parsed.covenants.len());
    for covenant in parsed.covenants {
        let section_type = if targets.iter().any(|t| t.id == covenant.section_type) {
            covenant.section_type
        } else if taxonomy.contains(&covenant.section_type) {
            // Known type outside the requested targets.
            debug!(section_type = %covenant.section_type, "dropping off-target llm section");
            continue;
        } else {
            warn!(section_type = %covenant.section_type, "llm invented a covenant type");
            UNCLASSIFIED.to_string()
        };

        if covenant.content.trim().is_empty() {
            continue;
        }

        records.push(SectionRecord {
            section_type,
            title: covenant.title,
            content: covenant.content,
            confidence: covenant.confidence.clamp(0.0, 1.0),
            key_terms: covenant.key_terms,
            reasoning: covenant.reasoning,
            span: Span::default(),
        });
    }
    Ok(records)
}

/// Merge near-duplicate sections of the same type from overlapping chunks,
/// keeping the higher-confidence copy.
fn merge_duplicates(records: Vec<SectionRecord>) -> Vec<SectionRecord> {
    let mut kept: Vec<SectionRecord> = Vec::with_capacity(records.len());
    for record in records {
        let duplicate = kept.iter_mut().find(|k| {
            k.section_type == record.section_type
                && jaccard_words(&k.content, &record.content) > DUPLICATE_THRESHOLD
        });
        match duplicate {
            Some(existing) => {
                if record.confidence > existing.confidence {
                    *existing = record;
                }
            }
            None => kept.push(record),
        }
    }
    kept
}

pub struct LlmExtractor {
    client: ProviderClient,
    spec: ProviderSpec,
    api_key: String,
    pub chunk_size_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl LlmExtractor {
    pub fn new(client: ProviderClient, spec: ProviderSpec, api_key: String) -> Self {
        Self {
            client,
            spec,
            api_key,
            chunk_size_chars: 4000,
            chunk_overlap_chars: 500,
        }
    }

    /// Extract covenant sections from the whole document. Failed chunks are
    /// reported as warnings and skipped; the call errors only when no chunk
    /// produced a usable response.
    pub async fn extract(
        &self,
        text: &str,
        taxonomy: &Taxonomy,
        targets: &[&CovenantTypeSpec],
    ) -> Result<(Vec<SectionRecord>, Vec<String>), ProviderError> {
        let system = system_prompt(targets);
        let chunks = chunk_text(text, self.chunk_size_chars, self.chunk_overlap_chars);
        debug!(chunks = chunks.len(), "llm extraction over chunked document");

        let mut records = Vec::new();
        let mut warnings = Vec::new();
        let mut first_error: Option<ProviderError> = None;
        let mut any_ok = false;

        for (i, chunk) in chunks.iter().enumerate() {
            let result: Result<ChatResult, ProviderError> = self
                .client
                .chat_json(&self.spec, &self.api_key, &system, chunk, MAX_RESPONSE_TOKENS)
                .await;

            match result.and_then(|r| parse_covenants(&r.content, taxonomy, targets)) {
                Ok(mut chunk_records) => {
                    any_ok = true;
                    records.append(&mut chunk_records);
                }
                Err(e) => {
                    warn!(chunk = i, error = %e, "llm chunk failed");
                    warnings.push(format!("chunk {} failed: {}", i, e));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if !any_ok {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok((merge_duplicates(records), warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::taxonomy::taxonomy;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("short text", 4000, 500);
        assert_eq!(chunks, vec!["short text"]);
        assert!(chunk_text("", 4000, 500).is_empty());
    }

    #[test]
    fn test_chunks_overlap_and_cover_the_text() {
        let text = "The Company shall not pay. ".repeat(400);
        let chunks = chunk_text(&text, 4000, 500);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 4000);
        }
        // Consecutive chunks share text.
        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len().saturating_sub(100)..];
            assert!(pair[1].contains(tail));
        }
        assert!(text.ends_with(chunks.last().unwrap()));
    }

    #[test]
    fn test_extract_json_tolerates_fences() {
        let reply = "Here you go:\n```json\n{\"covenants\": []}\n```";
        assert_eq!(extract_json(reply), Some("{\"covenants\": []}"));
        assert_eq!(extract_json("no json at all"), None);
    }

    #[test]
    fn test_parse_canned_response() {
        let tax = taxonomy();
        let targets: Vec<_> = tax.specs().iter().collect();
        let reply = r#"{"covenants": [
            {"section_type": "liens", "title": "SECTION 4.2 Liens", "content": "No Lien shall be created.", "confidence": 0.9, "key_terms": ["lien"], "reasoning": "negative pledge language"},
            {"section_type": "financial_ratios", "title": "Ratios", "content": "Leverage shall not exceed 3.0x.", "confidence": 1.7}
        ]}"#;

        let records = parse_covenants(reply, tax, &targets).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].section_type, "liens");
        assert_eq!(records[0].reasoning.as_deref(), Some("negative pledge language"));
        // Unknown type is relabeled, out-of-range confidence clamped.
        assert_eq!(records[1].section_type, "unclassified");
        assert_eq!(records[1].confidence, 1.0);
    }

    #[test]
    fn test_parse_drops_off_target_types() {
        let tax = taxonomy();
        let targets: Vec<_> = tax
            .specs()
            .iter()
            .filter(|s| s.id == "liens")
            .collect();
        let reply = r#"{"covenants": [
            {"section_type": "restricted_payments", "title": "RP", "content": "No dividends.", "confidence": 0.8}
        ]}"#;
        let records = parse_covenants(reply, tax, &targets).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_merge_duplicates_keeps_higher_confidence() {
        let body = "The Company shall not create any Lien on any asset of the Company.";
        let make = |confidence: f64| SectionRecord {
            section_type: "liens".to_string(),
            title: "Liens".to_string(),
            content: body.to_string(),
            confidence,
            key_terms: vec![],
            reasoning: None,
            span: Span::default(),
        };
        let merged = merge_duplicates(vec![make(0.7), make(0.9)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 0.9);
    }

    #[test]
    fn test_system_prompt_lists_targets_and_demands_json() {
        let tax = taxonomy();
        let targets: Vec<_> = tax.specs().iter().collect();
        let prompt = system_prompt(&targets);
        assert!(prompt.contains("restricted_payments:"));
        assert!(prompt.contains("json"));
    }
}
