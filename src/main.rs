// covex batch driver
// Walks the input PDFs, runs the requested extraction method(s), and writes
// one JSON result file per document per method.

use anyhow::{anyhow, bail, Context, Result};
use covex::models::{ComparisonReport, DocumentResult, SectionRecord};
use covex::services::comparison::compare;
use covex::services::config_store::ConfigStore;
use covex::services::extraction::{extract_sections, ExtractOptions};
use covex::services::llm_extractor::LlmExtractor;
use covex::services::pdf_text::read_document_text;
use covex::services::providers::{get_api_key, parse_provider, ProviderClient, ProviderError};
use covex::services::taxonomy::taxonomy;
use covex::services::text_normalizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Regex,
    Llm,
    Both,
}

impl Mode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "regex" => Ok(Mode::Regex),
            "llm" => Ok(Mode::Llm),
            "both" => Ok(Mode::Both),
            other => bail!("unknown mode: {} (expected regex|llm|both)", other),
        }
    }
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn usage() {
    eprintln!(
        "Usage:\n  covex --inputs <file|dir> [--out <dir>] [--mode regex|llm|both] \
[--targets <type,type|all>] [--provider <name[:model]>] [--min-confidence <f>] \
[--include-unclassified] [--parallel <n>] [--timeout <secs>]\n  \
covex --list-targets\n  \
covex --set-api-key <provider=key> | --delete-api-key <provider>\n\nNotes:\n  \
- Directories are scanned for *.pdf; a single input may also be a .txt file.\n  \
- llm/both modes need an API key (OPENAI_API_KEY, DEEPSEEK_API_KEY, GLM_API_KEY\n    \
or the config file)."
    );
}

fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("input path not found: {}", path.display());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("reading input dir {}", path.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

struct RunPlan {
    out_dir: PathBuf,
    mode: Mode,
    options: ExtractOptions,
    llm: Option<Arc<LlmExtractor>>,
    timeout_secs: u64,
}

fn output_path(out_dir: &Path, input: &Path, method: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    out_dir.join(format!("{}_{}_{}.json", stem, method, timestamp))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Enforce the per-document wall-clock budget around one processing run.
async fn with_budget<F>(budget: std::time::Duration, work: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    match tokio::time::timeout(budget, work).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {:?}", budget)),
    }
}

async fn process_document(input: PathBuf, plan: Arc<RunPlan>) -> Result<()> {
    // PDF parsing and the regex pipeline are CPU-bound with no await points
    // of their own; run them off the async workers so the wall-clock budget
    // has a poll boundary to fire at and `--parallel` slots stay responsive.
    let doc = {
        let input = input.clone();
        tokio::task::spawn_blocking(move || read_document_text(&input)).await??
    };
    let file_name = input
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| input.display().to_string());

    let mut regex_sections: Option<Vec<SectionRecord>> = None;
    let mut llm_sections: Option<Vec<SectionRecord>> = None;

    if plan.mode != Mode::Llm {
        let outcome = {
            let text = doc.text.clone();
            let options = plan.options.clone();
            tokio::task::spawn_blocking(move || extract_sections(&text, taxonomy(), &options))
                .await??
        };
        let mut warnings = doc.warnings.clone();
        warnings.extend(outcome.warnings.iter().cloned());

        let result = DocumentResult {
            method: "regex".to_string(),
            file: file_name.clone(),
            page_count: doc.page_count,
            text_length: outcome.text.len(),
            warnings,
            sections: outcome.sections.clone(),
        };
        let path = output_path(&plan.out_dir, &input, "regex");
        write_json(&path, &result)?;
        info!(file = %file_name, sections = result.sections.len(), out = %path.display(), "regex extraction written");
        regex_sections = Some(outcome.sections);
    }

    if plan.mode != Mode::Regex {
        let extractor = plan
            .llm
            .as_ref()
            .ok_or_else(|| anyhow!("llm extractor not configured"))?;
        let normalized = text_normalizer::normalize(&doc.text);
        let targets = taxonomy()
            .resolve_targets(plan.options.targets.as_deref())
            .map_err(|e| anyhow!(e))?;

        let (sections, llm_warnings) = extractor
            .extract(&normalized.text, taxonomy(), &targets)
            .await?;
        let mut warnings = doc.warnings.clone();
        warnings.extend(normalized.warnings);
        warnings.extend(llm_warnings);

        let result = DocumentResult {
            method: "llm".to_string(),
            file: file_name.clone(),
            page_count: doc.page_count,
            text_length: normalized.text.len(),
            warnings,
            sections: sections.clone(),
        };
        let path = output_path(&plan.out_dir, &input, "llm");
        write_json(&path, &result)?;
        info!(file = %file_name, sections = result.sections.len(), out = %path.display(), "llm extraction written");
        llm_sections = Some(sections);
    }

    if let (Some(regex), Some(llm)) = (regex_sections, llm_sections) {
        let report: ComparisonReport = compare(&regex, &llm);
        let path = output_path(&plan.out_dir, &input, "comparison");
        write_json(&path, &report)?;
        info!(file = %file_name, overlapping = report.overlapping, out = %path.display(), "comparison written");
    }

    Ok(())
}

fn config_store() -> Result<ConfigStore> {
    ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .ok_or_else(|| anyhow!("no config directory available on this platform"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if has_flag(&args, "--list-targets") {
        for id in taxonomy().type_ids() {
            println!("{}", id);
        }
        return Ok(());
    }
    if let Some(kv) = parse_arg_value(&args, "--set-api-key") {
        let (provider, key) = kv
            .split_once('=')
            .ok_or_else(|| anyhow!("--set-api-key expects <provider=key>"))?;
        config_store()?
            .set_api_key(provider, key)
            .map_err(|e| anyhow!(e))?;
        println!("Stored API key for {}", provider);
        return Ok(());
    }
    if let Some(provider) = parse_arg_value(&args, "--delete-api-key") {
        config_store()?
            .delete_api_key(&provider)
            .map_err(|e| anyhow!(e))?;
        println!("Deleted API key for {}", provider);
        return Ok(());
    }

    let Some(inputs_arg) = parse_arg_value(&args, "--inputs") else {
        usage();
        bail!("--inputs is required");
    };

    covex::init_logging();

    let config = ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .map(|s| s.load())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or_default();

    let mode = match parse_arg_value(&args, "--mode") {
        Some(m) => Mode::parse(&m)?,
        None => Mode::Regex,
    };

    let targets = parse_arg_value(&args, "--targets").map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });

    let options = ExtractOptions {
        min_confidence: parse_arg_value(&args, "--min-confidence")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.extraction.min_confidence),
        include_unclassified: has_flag(&args, "--include-unclassified")
            || config.extraction.include_unclassified,
        targets,
    };
    // Fail on bad target names before any document work starts.
    taxonomy()
        .resolve_targets(options.targets.as_deref())
        .map_err(|e| anyhow!(e))?;

    let llm = if mode != Mode::Regex {
        let provider_arg = parse_arg_value(&args, "--provider")
            .or_else(|| config.default_provider.clone())
            .unwrap_or_else(|| "deepseek".to_string());
        let mut spec = parse_provider(&provider_arg);
        if let Some(provider_config) = config.providers.get(&spec.name) {
            if !provider_config.enabled {
                bail!("provider {} is disabled in the config file", spec.name);
            }
            // A model given on the command line wins over the config one.
            if !provider_arg.contains(':') {
                if let Some(model) = provider_config.model.as_deref().filter(|m| !m.is_empty()) {
                    spec.model = model.to_string();
                }
            }
        }
        let api_key =
            get_api_key(&spec.name).ok_or(ProviderError::MissingApiKey(spec.name.clone()))?;

        let client = match config.proxy.as_ref().filter(|p| p.enabled) {
            Some(proxy) => {
                let url = proxy
                    .https
                    .as_deref()
                    .or(proxy.http.as_deref())
                    .ok_or_else(|| anyhow!("proxy enabled but no URL configured"))?;
                ProviderClient::with_proxy(url)?
            }
            None => ProviderClient::new(),
        };

        info!(provider = %spec.name, model = %spec.model, "llm extraction enabled");
        let mut extractor = LlmExtractor::new(client, spec, api_key);
        extractor.chunk_size_chars = config.extraction.chunk_size_chars;
        extractor.chunk_overlap_chars = config.extraction.chunk_overlap_chars;
        Some(Arc::new(extractor))
    } else {
        None
    };

    let out_dir = PathBuf::from(parse_arg_value(&args, "--out").unwrap_or_else(|| "output".to_string()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;

    let parallel: usize = parse_arg_value(&args, "--parallel")
        .and_then(|v| v.parse().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1);

    let inputs = collect_inputs(Path::new(&inputs_arg))?;
    if inputs.is_empty() {
        bail!("no input documents found in {}", inputs_arg);
    }
    info!(documents = inputs.len(), mode = ?mode, parallel, "starting batch");

    // Per-document wall-clock budget so one pathological file cannot stall
    // the whole batch.
    let timeout_secs: u64 = parse_arg_value(&args, "--timeout")
        .and_then(|v| v.parse().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(300);

    let plan = Arc::new(RunPlan {
        out_dir,
        mode,
        options,
        llm,
        timeout_secs,
    });

    let mut set: JoinSet<(PathBuf, Result<()>)> = JoinSet::new();
    let mut failures = 0usize;
    let mut pending = inputs.into_iter();

    loop {
        while set.len() < parallel {
            let Some(input) = pending.next() else { break };
            let plan = Arc::clone(&plan);
            set.spawn(async move {
                let budget = std::time::Duration::from_secs(plan.timeout_secs);
                let result = with_budget(budget, process_document(input.clone(), plan)).await;
                (input, result)
            });
        }
        let Some(joined) = set.join_next().await else { break };
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((input, Err(e))) => {
                failures += 1;
                error!(file = %input.display(), error = %e, "document failed");
            }
            Err(e) => {
                failures += 1;
                error!(error = %e, "worker task panicked");
            }
        }
    }

    if failures > 0 {
        bail!("{} document(s) failed", failures);
    }
    info!("batch complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_budget_fires_on_cpu_bound_work() {
        // CPU-bound work runs on the blocking pool, so awaiting its handle
        // gives the budget a poll boundary even with no other await points.
        let slow = async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_millis(300)))
                .await?;
            Ok(())
        };
        let err = with_budget(Duration::from_millis(20), slow)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_budget_passes_fast_work() {
        let result = with_budget(Duration::from_secs(5), async { Ok(()) }).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse("both").unwrap(), Mode::Both);
        assert!(Mode::parse("hybrid").is_err());
    }
}
