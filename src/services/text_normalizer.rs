// Text Normalizer
// Cleans raw extracted PDF text ahead of heading detection: line endings are
// unified, horizontal whitespace runs collapse to one space, line edges are
// trimmed, and words split by a hyphen at a line break are re-joined.
// Normalization is idempotent and never fails; unusable input yields empty
// text plus a warning.

use crate::models::Span;

/// Maps byte offsets in the normalized text back to the original input.
/// Required because de-hyphenation and whitespace collapse are not
/// length-preserving.
#[derive(Debug, Clone)]
pub struct OffsetMap {
    map: Vec<usize>,
    orig_len: usize,
}

impl OffsetMap {
    pub fn to_original(&self, normalized_pos: usize) -> usize {
        if normalized_pos >= self.map.len() {
            return self.orig_len;
        }
        self.map[normalized_pos]
    }

    pub fn span_to_original(&self, span: Span) -> Span {
        Span::new(self.to_original(span.start), self.to_original(span.end))
    }
}

#[derive(Debug)]
pub struct Normalized {
    pub text: String,
    pub warnings: Vec<String>,
    pub offsets: OffsetMap,
}

fn is_horizontal_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0B' | '\x0C' | '\u{00A0}' | '\u{3000}')
}

/// Line-ending unification, line-edge trim, and horizontal whitespace
/// collapse, tracking source offsets per emitted byte.
fn clean(raw: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(raw.len());
    let mut map = Vec::with_capacity(raw.len());
    let mut pending_ws: Option<usize> = None;
    let mut line_has_content = false;

    let mut chars = raw.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '\r' {
            // CRLF collapses to the LF; a lone CR becomes a line break.
            if matches!(chars.peek(), Some((_, '\n'))) {
                continue;
            }
            pending_ws = None;
            out.push('\n');
            map.push(idx);
            line_has_content = false;
        } else if c == '\n' {
            pending_ws = None;
            out.push('\n');
            map.push(idx);
            line_has_content = false;
        } else if is_horizontal_ws(c) {
            if line_has_content && pending_ws.is_none() {
                pending_ws = Some(idx);
            }
        } else {
            if let Some(ws_idx) = pending_ws.take() {
                out.push(' ');
                map.push(ws_idx);
            }
            out.push(c);
            for _ in 0..c.len_utf8() {
                map.push(idx);
            }
            line_has_content = true;
        }
    }

    (out, map)
}

/// Re-join words split by a hyphen immediately followed by a line break
/// (`contract-\nual` becomes `contractual`). Runs on cleaned text so the
/// hyphen is always the last byte of its line.
fn dehyphenate(cleaned: &str) -> (String, Vec<usize>) {
    let bytes = cleaned.as_bytes();
    let mut out = String::with_capacity(cleaned.len());
    let mut map = Vec::with_capacity(cleaned.len());
    let mut prev_alpha = false;

    let mut chars = cleaned.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '-' && prev_alpha {
            if let Some(&(nl_idx, '\n')) = chars.peek() {
                let resumes_word = bytes
                    .get(nl_idx + 1)
                    .map_or(false, |b| b.is_ascii_lowercase());
                if resumes_word {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
        for _ in 0..c.len_utf8() {
            map.push(idx);
        }
        prev_alpha = c.is_ascii_alphabetic();
    }

    (out, map)
}

fn is_unusable(raw: &str) -> bool {
    let mut non_ws = 0usize;
    let mut replacement = 0usize;
    for c in raw.chars() {
        if c.is_whitespace() {
            continue;
        }
        non_ws += 1;
        if c == '\u{FFFD}' {
            replacement += 1;
        }
    }
    non_ws == 0 || replacement * 2 > non_ws
}

/// Normalize raw extracted text. Never raises: empty or mostly undecodable
/// input yields empty text and a single warning, and the pipeline proceeds
/// to an empty result.
pub fn normalize(raw: &str) -> Normalized {
    if is_unusable(raw) {
        return Normalized {
            text: String::new(),
            warnings: vec!["input text is empty or undecodable; no sections extracted".to_string()],
            offsets: OffsetMap {
                map: Vec::new(),
                orig_len: raw.len(),
            },
        };
    }

    let (cleaned, clean_map) = clean(raw);
    let (text, dehyph_map) = dehyphenate(&cleaned);

    // Compose the two maps so final offsets point into the raw input.
    let map = dehyph_map.into_iter().map(|i| clean_map[i]).collect();

    Normalized {
        text,
        warnings: Vec::new(),
        offsets: OffsetMap {
            map,
            orig_len: raw.len(),
        },
    }
}
