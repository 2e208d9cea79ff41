// Covex Core Services

pub mod comparison;
pub mod config_store;
pub mod extraction;
pub mod llm_extractor;
pub mod pdf_text;
pub mod providers;
pub mod taxonomy;
pub mod text_normalizer;

pub use config_store::*;
pub use providers::*;

pub use comparison::compare;
pub use extraction::{extract_sections, ExtractError, ExtractOptions, ExtractionOutcome};
pub use llm_extractor::LlmExtractor;
pub use pdf_text::{extract_pdf_text, read_document_text, PdfError, PdfText};
pub use taxonomy::{taxonomy, Taxonomy, UNCLASSIFIED};
pub use text_normalizer::normalize;
