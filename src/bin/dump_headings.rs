// Debug dump of heading detection and classification for one document.

use covex::services::extraction::classifier::score_spec;
use covex::services::extraction::heading_detector::detect_headings;
use covex::services::pdf_text::read_document_text;
use covex::services::taxonomy::taxonomy;
use covex::services::text_normalizer;
use std::path::Path;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin dump_headings -- <path.pdf|path.txt> [--min-confidence <f>]"
        );
        return Ok(());
    }

    let path = args[1].clone();
    let min_confidence: f64 = parse_arg_value(&args, "--min-confidence")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.3);

    let doc = read_document_text(Path::new(&path)).map_err(|e| e.to_string())?;
    let normalized = text_normalizer::normalize(&doc.text);
    for w in &normalized.warnings {
        eprintln!("warning: {}", w);
    }

    let tax = taxonomy();
    println!("File: {}", path);
    println!("Pages: {}", doc.page_count);
    println!(
        "Text: {} chars ({} bytes)",
        normalized.text.chars().count(),
        normalized.text.len()
    );
    println!("Taxonomy: v{} ({} types)", tax.version(), tax.specs().len());
    println!();

    let candidates = detect_headings(&normalized.text);
    println!("Heading candidates: {}", candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        let window_end = candidates
            .get(i + 1)
            .map(|next| next.span.start)
            .unwrap_or(normalized.text.len());
        let window = &normalized.text[candidate.span.start..window_end];

        let raw_span = normalized.offsets.span_to_original(candidate.span);
        println!(
            "[H{:03}] bytes=[{},{}] raw=[{},{}] numbering={} {}",
            i,
            candidate.span.start,
            candidate.span.end,
            raw_span.start,
            raw_span.end,
            candidate.numbering.as_deref().unwrap_or("-"),
            preview(&candidate.text, 100)
        );

        let mut scored: Vec<(f64, &str)> = tax
            .specs()
            .iter()
            .map(|spec| (score_spec(spec, &candidate.text, window).0, spec.id.as_str()))
            .filter(|(confidence, _)| *confidence > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (confidence, type_id) in scored {
            let marker = if confidence >= min_confidence { "*" } else { " " };
            println!("      {} {:<30} {:.3}", marker, type_id, confidence);
        }
    }

    Ok(())
}
