// Heading Detector
// Scans normalized text for candidate section-heading lines using structural
// cues only (numbering prefixes, ALL-CAPS short lines). Covenant semantics
// are applied later by the classifier.

use crate::models::Span;
use regex::Regex;
use std::sync::OnceLock;

/// A heading-shaped line found in the normalized text. Not persisted;
/// consumed by the classifier and segmenter within one extraction call.
#[derive(Debug, Clone)]
pub struct HeadingCandidate {
    /// Span of the matched heading text in the normalized document.
    pub span: Span,
    /// The literal matched heading (numbering plus title fragment).
    pub text: String,
    /// Numbering token when the line carries one, e.g. "4.1".
    pub numbering: Option<String>,
    /// True for numbering-prefix matches, false for the ALL-CAPS heuristic.
    pub numbered: bool,
    /// Byte offset just past this heading's line, where body content starts.
    pub line_end: usize,
}

/// Longest line the ALL-CAPS heuristic will consider.
const MAX_CAPS_HEADING_LEN: usize = 80;
const MIN_CAPS_HEADING_LEN: usize = 8;

fn numbered_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // A numbering prefix must be followed by a capitalized title fragment
        // before any sentence-ending punctuation.
        Regex::new(
            r"^(?:SECTION\s+(\d+(?:\.\d+)*)|Section\s+(\d+(?:\.\d+)+)|(\d+\.\d+))\s*[-–—:.]?\s*([A-Z][^\n.!?]*)",
        )
        .unwrap()
    })
}

fn caps_charset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9 &/\-_,\.\(\)']+$").unwrap())
}

fn is_all_caps_heading(line: &str) -> bool {
    let len = line.chars().count();
    if len < MIN_CAPS_HEADING_LEN || len > MAX_CAPS_HEADING_LEN {
        return false;
    }
    if !caps_charset_re().is_match(line) {
        return false;
    }
    let upper = line.chars().filter(|c| c.is_ascii_uppercase()).count();
    let alnum = line.chars().filter(|c| c.is_ascii_alphanumeric()).count();
    upper >= 2 && upper * 10 >= alnum * 6
}

/// A heading is only real if body text follows it: at least one sentence of
/// content before the next candidate or end of document. This drops table
/// of contents fragments and stray capitalized lines.
fn has_body_sentence(window: &str) -> bool {
    window.chars().any(|c| c.is_alphabetic()) && window.contains(['.', '!', '?'])
}

fn candidate_for_line(line: &str, line_start: usize, line_end: usize) -> Option<HeadingCandidate> {
    let numbered = numbered_heading_re().captures(line).map(|caps| {
        let m = caps.get(0).unwrap();
        let numbering = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|g| g.as_str().to_string());
        HeadingCandidate {
            span: Span::new(line_start, line_start + m.end()),
            text: m.as_str().trim_end().to_string(),
            numbering,
            numbered: true,
            line_end,
        }
    });

    let caps_line = if is_all_caps_heading(line) {
        Some(HeadingCandidate {
            span: Span::new(line_start, line_start + line.len()),
            text: line.to_string(),
            numbering: None,
            numbered: false,
            line_end,
        })
    } else {
        None
    };

    // Tie-break at identical start offsets: longer match wins, then the
    // numbered pattern over the ALL-CAPS heuristic.
    match (numbered, caps_line) {
        (Some(n), Some(c)) => {
            if c.span.len() > n.span.len() {
                Some(c)
            } else {
                Some(n)
            }
        }
        (n, c) => n.or(c),
    }
}

/// Detect heading candidates in normalized text, ordered by strictly
/// increasing start offset. The document is scanned once, top to bottom.
pub fn detect_headings(text: &str) -> Vec<HeadingCandidate> {
    let mut raw: Vec<HeadingCandidate> = Vec::new();
    let mut offset = 0usize;

    for line in text.split('\n') {
        let line_start = offset;
        let line_end = (offset + line.len() + 1).min(text.len());
        offset += line.len() + 1;

        if line.is_empty() {
            continue;
        }
        if let Some(candidate) = candidate_for_line(line, line_start, line_end) {
            raw.push(candidate);
        }
    }

    // Acceptance gate: require a body sentence between this heading's line
    // and the next candidate (or end of document).
    let mut accepted = Vec::with_capacity(raw.len());
    for i in 0..raw.len() {
        let window_end = raw
            .get(i + 1)
            .map(|next| next.span.start)
            .unwrap_or(text.len());
        let window_start = raw[i].line_end.min(window_end);
        if has_body_sentence(&text[window_start..window_end]) {
            accepted.push(raw[i].clone());
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SECTIONS: &str = "SECTION 4.1 Restricted Payments\nThe Company shall not declare or pay any dividend or make any distribution.\nSECTION 4.2 Liens\nNo Lien shall be created on any asset of the Company.";

    #[test]
    fn test_detects_numbered_sections() {
        let found = detect_headings(TWO_SECTIONS);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "SECTION 4.1 Restricted Payments");
        assert_eq!(found[0].numbering.as_deref(), Some("4.1"));
        assert!(found[0].numbered);
        assert_eq!(found[1].span.start, TWO_SECTIONS.find("SECTION 4.2").unwrap());
    }

    #[test]
    fn test_detects_dotted_and_bare_numbering() {
        let text = "Section 7.2 - Change of Control\nUpon a Change of Control each Holder may act.\n8.1 Asset Sales\nThe Company shall not sell assets.";
        let found = detect_headings(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].numbering.as_deref(), Some("7.2"));
        assert_eq!(found[1].numbering.as_deref(), Some("8.1"));
    }

    #[test]
    fn test_detects_all_caps_heading() {
        let text = "RESTRICTED PAYMENTS\nThe Company shall not pay dividends to holders.";
        let found = detect_headings(text);
        assert_eq!(found.len(), 1);
        assert!(!found[0].numbered);
        assert!(found[0].numbering.is_none());
    }

    #[test]
    fn test_plain_prose_yields_no_candidates() {
        let text = "This agreement is made between the parties. It contains terms.\nNothing here is shaped like a heading.";
        assert!(detect_headings(text).is_empty());
    }

    #[test]
    fn test_toc_fragments_are_rejected() {
        // Contents lines stack without body sentences between them.
        let text = "4.1 Restricted Payments 12\n4.2 Liens 13\nSECTION 4.1 Restricted Payments\nThe Company shall not pay any dividend.";
        let found = detect_headings(text);
        assert_eq!(found.len(), 1);
        assert!(found[0].span.start >= text.find("SECTION").unwrap());
    }

    #[test]
    fn test_heading_without_following_body_is_rejected() {
        let text = "SECTION 9.9 Miscellaneous Heading\n";
        assert!(detect_headings(text).is_empty());
    }

    #[test]
    fn test_tie_break_prefers_numbered_match() {
        let text = "SECTION 4.1 RESTRICTED PAYMENTS\nThe Company shall not pay any dividend.";
        let found = detect_headings(text);
        assert_eq!(found.len(), 1);
        assert!(found[0].numbered);
    }

    #[test]
    fn test_starts_strictly_increase() {
        let found = detect_headings(TWO_SECTIONS);
        for pair in found.windows(2) {
            assert!(pair[0].span.start < pair[1].span.start);
        }
    }
}
