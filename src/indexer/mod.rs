// Incremental, parallel indexing pipeline
//
// Phase 1 parses files on the worker pool. Phase 2 (relationships) and
// Phase 3 (metrics) need the complete symbol set and run on the caller's
// task once every worker result is in.

pub mod aggregate;
pub mod coverage;
pub mod metrics;
pub mod parser;
pub mod pool;
pub mod relationships;
pub mod worker;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{CodeSymbol, FileHashRecord, Language, SymbolRelationship};
use aggregate::{Aggregate, Aggregator, FileError, SourceEntry};
use coverage::CoverageReport;
use parser::{ParserRegistry, ParserStrategy};
use pool::WorkerPool;
use relationships::SourceTree;
use worker::{ParseOutcome, ParseTask};

/// A file handed to the indexer by the discovery layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path used for reading.
    pub file_path: PathBuf,
    /// Project-relative path used in symbols and hashes.
    pub rel_path: String,
}

impl SourceFile {
    pub fn new(file_path: impl Into<PathBuf>, rel_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            rel_path: rel_path.into(),
        }
    }
}

/// Input of one indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    pub files: Vec<SourceFile>,
    /// `rel_path -> content hash` recorded by the previous run.
    pub previous_hashes: HashMap<String, String>,
    /// Symbols recorded by the previous run; reused for unchanged files.
    pub cached_symbols: Vec<CodeSymbol>,
    pub coverage: Option<CoverageReport>,
    pub full_rebuild: bool,
}

impl IndexRequest {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }
}

/// Aggregated output of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResult {
    pub symbols: Vec<CodeSymbol>,
    pub relationships: Vec<SymbolRelationship>,
    pub errors: Vec<FileError>,
    pub skipped_count: usize,
    /// Hashes of the files (re)parsed successfully this run.
    pub hashes: BTreeMap<String, String>,
}

impl IndexResult {
    /// Hash records stamped with the current time.
    pub fn hash_records(&self) -> Vec<FileHashRecord> {
        self.hash_records_at(Utc::now())
    }

    pub fn hash_records_at(&self, indexed_at: DateTime<Utc>) -> Vec<FileHashRecord> {
        self.hashes
            .iter()
            .map(|(path, hash)| FileHashRecord {
                file_path: path.clone(),
                content_hash: hash.clone(),
                last_indexed_at: indexed_at,
            })
            .collect()
    }
}

/// Runs the three indexing phases.
pub struct Indexer {
    registry: Arc<ParserRegistry>,
    workers: Option<usize>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::with_registry(ParserRegistry::new())
    }

    pub fn with_registry(registry: ParserRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            workers: None,
        }
    }

    /// Override the default pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn pool_size(&self) -> usize {
        self.workers.unwrap_or_else(pool::default_pool_size)
    }

    /// Index `request.files`. Per-file failures are reported in
    /// [`IndexResult::errors`]; only a pool that cannot start is an `Err`.
    pub async fn index(&self, request: IndexRequest) -> Result<IndexResult> {
        let started = Instant::now();
        let IndexRequest {
            files,
            previous_hashes,
            cached_symbols,
            coverage,
            full_rebuild,
        } = request;

        info!(
            "Indexing {} files ({})",
            files.len(),
            if full_rebuild { "full rebuild" } else { "incremental" }
        );

        // Phase 1: parse on the pool
        let Aggregate {
            mut symbols,
            sources,
            skipped_files,
            errors,
            hashes,
        } = self
            .parse_files(&files, &previous_hashes, cached_symbols, full_rebuild)
            .await?;

        // Phase 2: relationships against the complete symbol set
        let trees = self.build_trees(&files, sources, &skipped_files);
        let relationships = relationships::extract_relationships(&self.registry, &trees, &symbols);

        // Phase 3: metrics
        metrics::collect_metrics(&mut symbols, &trees, coverage.as_ref());

        info!(
            "Indexed {} files in {:?}: {} parsed, {} skipped, {} failed, {} symbols, {} relationships",
            files.len(),
            started.elapsed(),
            hashes.len(),
            skipped_files.len(),
            errors.len(),
            symbols.len(),
            relationships.len()
        );

        Ok(IndexResult {
            symbols,
            relationships,
            errors,
            skipped_count: skipped_files.len(),
            hashes,
        })
    }

    async fn parse_files(
        &self,
        files: &[SourceFile],
        previous_hashes: &HashMap<String, String>,
        cached_symbols: Vec<CodeSymbol>,
        full_rebuild: bool,
    ) -> Result<Aggregate> {
        let registry = Arc::clone(&self.registry);
        let pool = WorkerPool::new(self.pool_size(), move |task: ParseTask| {
            worker::run_parse_task(&registry, task)
        })?;
        debug!("Dispatching {} tasks to {} workers", files.len(), pool.size());

        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                let existing_hash = if full_rebuild {
                    None
                } else {
                    previous_hashes.get(&file.rel_path).cloned()
                };
                pool.submit(ParseTask {
                    file_path: file.file_path.clone(),
                    rel_path: file.rel_path.clone(),
                    existing_hash,
                    full_rebuild,
                })
            })
            .collect();

        let outcomes = join_all(handles).await;
        pool.shutdown().await;

        let mut aggregator = Aggregator::new(cached_symbols);
        for (file, outcome) in files.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => aggregator.add(outcome),
                Err(e) => aggregator.add_error(file.rel_path.as_str(), e),
            }
        }
        Ok(aggregator.finish())
    }

    /// Syntax trees for every file that contributes symbols this run, in
    /// file-list order. Unchanged files are re-read so their outgoing edges
    /// are recomputed too; files without a grammar are never read.
    fn build_trees(
        &self,
        files: &[SourceFile],
        sources: Vec<SourceEntry>,
        skipped_files: &[String],
    ) -> Vec<SourceTree> {
        let mut parsed: HashMap<String, SourceEntry> = sources
            .into_iter()
            .map(|entry| (entry.rel_path.clone(), entry))
            .collect();
        let skipped: HashSet<&str> = skipped_files.iter().map(String::as_str).collect();

        let mut trees = Vec::with_capacity(files.len());
        for file in files {
            let language = Language::from_path(&file.file_path);
            if !self.registry.is_supported(language) {
                continue;
            }
            let entry = match parsed.remove(&file.rel_path) {
                Some(entry) => entry,
                None if skipped.contains(file.rel_path.as_str()) => {
                    match fs::read_to_string(&file.file_path) {
                        Ok(source) => SourceEntry {
                            rel_path: file.rel_path.clone(),
                            language,
                            source,
                        },
                        Err(e) => {
                            warn!("Failed to re-read {}: {}", file.rel_path, e);
                            continue;
                        }
                    }
                }
                None => continue,
            };

            match self.registry.get(entry.language).parse_tree(&entry.source) {
                Ok(Some(tree)) => trees.push(SourceTree {
                    rel_path: entry.rel_path,
                    language: entry.language,
                    source: entry.source,
                    tree,
                }),
                Ok(None) => {}
                Err(e) => warn!("Failed to re-parse {}: {}", entry.rel_path, e),
            }
        }
        trees
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}
