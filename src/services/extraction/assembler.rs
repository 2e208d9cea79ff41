// Result Assembler
// Final ordering and overlap resolution over the segmenter's records.
// Identical spans are a deliberate multi-label outcome and all survive;
// distinct spans that overlap indicate a segmentation fault upstream, so the
// earlier section wins and the later one is dropped with a warning.

use crate::models::SectionRecord;
use tracing::warn;

/// Order records by span start, then descending confidence within an
/// identical span, and resolve overlaps. Deterministic for a given input.
pub fn assemble(mut records: Vec<SectionRecord>) -> Vec<SectionRecord> {
    records.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.section_type.cmp(&b.section_type))
    });

    let mut kept: Vec<SectionRecord> = Vec::with_capacity(records.len());
    for record in records {
        let conflict = kept
            .iter()
            .rev()
            .take_while(|prev| prev.span.end > record.span.start)
            .any(|prev| prev.span != record.span && prev.span.overlaps(&record.span));
        if conflict {
            warn!(
                section_type = %record.section_type,
                start = record.span.start,
                end = record.span.end,
                "discarding section overlapping an earlier one"
            );
            continue;
        }
        kept.push(record);
    }

    kept
}
