use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use symgraph::config::Config;
use symgraph::indexer::coverage::CoverageReport;
use symgraph::indexer::parser::ParserRegistry;
use symgraph::indexer::{IndexRequest, IndexResult, Indexer, SourceFile};
use symgraph::model::{CodeSymbol, Language};

const STATE_FILE: &str = "state.json";

/// Command-line overrides for one `index` invocation.
#[derive(Debug, Default)]
pub struct IndexOptions {
    pub rebuild: bool,
    pub workers: Option<usize>,
    pub coverage: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// What is persisted between runs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IndexState {
    pub hashes: BTreeMap<String, String>,
    pub symbols: Vec<CodeSymbol>,
}

impl IndexState {
    pub fn load(state_dir: &Path) -> Option<Self> {
        let path = state_dir.join(STATE_FILE);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring unreadable state {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;
        let path = state_dir.join(STATE_FILE);
        fs::write(&path, serde_json::to_string(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

pub async fn index_project(project: &Path, config: &Config, options: IndexOptions) -> Result<()> {
    let languages = config.enabled_languages();
    let files = discover_files(project, config, &languages);
    println!("Symgraph Indexer v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {} ({})", config.project.name, project.display());
    println!(
        "Languages: {}",
        languages
            .iter()
            .map(Language::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Found {} files to index", files.len());

    let full_rebuild = options.rebuild || config.indexing.full_rebuild;
    let state_dir = config.state_dir(project);
    let previous = if full_rebuild {
        IndexState::default()
    } else {
        IndexState::load(&state_dir).unwrap_or_default()
    };

    let coverage_path = options
        .coverage
        .or_else(|| config.metrics.coverage.as_ref().map(|path| project.join(path)));
    let coverage = match coverage_path {
        Some(path) => Some(load_coverage(&path)?),
        None => None,
    };

    let mut registry = ParserRegistry::new();
    registry.retain(&languages);
    let mut indexer = Indexer::with_registry(registry);
    if let Some(workers) = options.workers.or(config.performance.workers) {
        indexer = indexer.with_workers(workers);
    }

    let request = IndexRequest {
        files,
        previous_hashes: previous.hashes.clone().into_iter().collect(),
        cached_symbols: previous.symbols,
        coverage,
        full_rebuild,
    };
    let discovered: Vec<String> = request.files.iter().map(|f| f.rel_path.clone()).collect();
    let result = indexer.index(request).await?;

    let state = IndexState {
        hashes: merge_hashes(&previous.hashes, &result, &discovered),
        symbols: result.symbols.clone(),
    };
    state.save(&state_dir)?;
    debug!("Saved state to {}", state_dir.display());

    print_summary(&result, discovered.len());

    if let Some(output) = options.output {
        fs::write(&output, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Wrote {}", output.display());
    }

    Ok(())
}

/// Files under `project` with an enabled language that pass the config's
/// include/exclude patterns, sorted by relative path.
pub fn discover_files(project: &Path, config: &Config, languages: &[Language]) -> Vec<SourceFile> {
    let mut files: Vec<SourceFile> = WalkDir::new(project)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.path();
            let rel_path = path
                .strip_prefix(project)
                .ok()?
                .to_string_lossy()
                .replace('\\', "/");
            let language = Language::from_path(path);
            if !languages.contains(&language) || !config.should_index_file(&rel_path) {
                return None;
            }
            Some(SourceFile::new(path, rel_path))
        })
        .collect();

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files
}

/// Hashes to persist: fresh hashes for re-parsed files, the previous hash
/// for skipped files. Failed and vanished files get no entry.
pub fn merge_hashes(
    previous: &BTreeMap<String, String>,
    result: &IndexResult,
    discovered: &[String],
) -> BTreeMap<String, String> {
    let failed: HashSet<&str> = result.errors.iter().map(|e| e.file.as_str()).collect();
    let fresh: HashMap<&str, &String> = result
        .hashes
        .iter()
        .map(|(path, hash)| (path.as_str(), hash))
        .collect();

    discovered
        .iter()
        .filter(|path| !failed.contains(path.as_str()))
        .filter_map(|path| {
            fresh
                .get(path.as_str())
                .copied()
                .or_else(|| previous.get(path))
                .map(|hash| (path.clone(), hash.clone()))
        })
        .collect()
}

/// JSON reports are detected by extension or a leading `{`; anything else
/// is read as LCOV.
pub fn load_coverage(path: &Path) -> Result<CoverageReport> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage report {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json") || text.trim_start().starts_with('{');

    let report = if is_json {
        CoverageReport::from_json(&text)
            .with_context(|| format!("Invalid coverage report {}", path.display()))?
    } else {
        CoverageReport::parse_lcov(&text)
    };
    info!("Loaded coverage for {} files from {}", report.files.len(), path.display());
    Ok(report)
}

fn print_summary(result: &IndexResult, file_count: usize) {
    println!("\nIndexing complete!");
    println!("Files: {}", file_count);
    println!("Parsed: {}", result.hashes.len());
    println!("Skipped (unchanged): {}", result.skipped_count);
    println!("Total symbols: {}", result.symbols.len());
    println!("Total relationships: {}", result.relationships.len());

    if !result.errors.is_empty() {
        println!("Errors: {}", result.errors.len());
        for error in &result.errors {
            println!("  - {}: {}", error.file, error.error);
        }
    }
}
