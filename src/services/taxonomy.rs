// Covenant taxonomy
// Fixed catalog of recognized covenant types and their matching specs,
// embedded at build time and parsed once at startup. Never mutated mid-run.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    version: i32,
    #[allow(dead_code)]
    source: String,
    types: Vec<TypeEntry>,
}

#[derive(Debug, Deserialize)]
struct TypeEntry {
    id: String,
    description: String,
    heading_patterns: Vec<String>,
    keywords: Vec<String>,
    section_indicators: Vec<String>,
}

/// Matching spec for one covenant type. Heading patterns are compiled
/// case-insensitive; keyword and indicator cues are matched as lowercase
/// substrings.
#[derive(Debug)]
pub struct CovenantTypeSpec {
    pub id: String,
    pub description: String,
    pub heading_patterns: Vec<Regex>,
    pub keywords: Vec<String>,
    pub section_indicators: Vec<String>,
}

#[derive(Debug)]
pub struct Taxonomy {
    version: i32,
    specs: Vec<CovenantTypeSpec>,
}

/// Label used when no covenant type clears the confidence threshold.
pub const UNCLASSIFIED: &str = "unclassified";

static TAXONOMY: OnceLock<Taxonomy> = OnceLock::new();

/// The built-in covenant taxonomy. Parse and regex-compile failures here are
/// build defects in the embedded data, so this panics at startup.
pub fn taxonomy() -> &'static Taxonomy {
    TAXONOMY.get_or_init(|| {
        let raw = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/covenant_taxonomy.json"
        ));
        let parsed: TaxonomyFile =
            serde_json::from_str(raw).expect("covenant_taxonomy.json parse failed");

        let mut specs = Vec::with_capacity(parsed.types.len());
        for entry in parsed.types {
            let heading_patterns = entry
                .heading_patterns
                .iter()
                .map(|p| {
                    Regex::new(&format!("(?i){}", p))
                        .unwrap_or_else(|e| panic!("bad heading pattern for {}: {}", entry.id, e))
                })
                .collect();
            specs.push(CovenantTypeSpec {
                id: entry.id,
                description: entry.description,
                heading_patterns,
                keywords: entry.keywords.iter().map(|k| k.to_lowercase()).collect(),
                section_indicators: entry
                    .section_indicators
                    .iter()
                    .map(|s| s.to_lowercase())
                    .collect(),
            });
        }

        Taxonomy {
            version: parsed.version,
            specs,
        }
    })
}

impl Taxonomy {
    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn specs(&self) -> &[CovenantTypeSpec] {
        &self.specs
    }

    pub fn get(&self, type_id: &str) -> Option<&CovenantTypeSpec> {
        self.specs.iter().find(|s| s.id == type_id)
    }

    pub fn type_ids(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.get(type_id).is_some()
    }

    /// Resolve a user-supplied target list. `None` or a lone "all" selects
    /// the whole taxonomy; unknown names are reported back to the caller.
    pub fn resolve_targets<'a>(
        &'a self,
        targets: Option<&[String]>,
    ) -> Result<Vec<&'a CovenantTypeSpec>, String> {
        match targets {
            None => Ok(self.specs.iter().collect()),
            Some(list) if list.len() == 1 && list[0].eq_ignore_ascii_case("all") => {
                Ok(self.specs.iter().collect())
            }
            Some(list) => {
                let mut selected = Vec::new();
                for name in list {
                    let id = name.trim().to_lowercase().replace([' ', '-'], "_");
                    match self.get(&id) {
                        Some(spec) => selected.push(spec),
                        None => return Err(format!("unknown covenant type: {}", name)),
                    }
                }
                Ok(selected)
            }
        }
    }
}
