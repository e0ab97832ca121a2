// Merges per-file worker outcomes into one result

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::worker::ParseOutcome;
use crate::model::{CodeSymbol, Language, SymbolTable};

/// A file that could not be indexed this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub error: String,
}

/// Source text of a parsed file, kept for the relationship pass.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub rel_path: String,
    pub language: Language,
    pub source: String,
}

/// Accumulates worker outcomes. The orchestrator is the only writer.
pub struct Aggregator {
    table: SymbolTable,
    cached_by_file: HashMap<String, Vec<CodeSymbol>>,
    cached_by_id: HashMap<String, CodeSymbol>,
    sources: Vec<SourceEntry>,
    skipped_files: Vec<String>,
    errors: Vec<FileError>,
    hashes: BTreeMap<String, String>,
}

/// Everything Phase 1 produced.
pub struct Aggregate {
    pub symbols: Vec<CodeSymbol>,
    pub sources: Vec<SourceEntry>,
    /// Files whose cached symbols were reused.
    pub skipped_files: Vec<String>,
    pub errors: Vec<FileError>,
    pub hashes: BTreeMap<String, String>,
}

impl Aggregate {
    pub fn skipped_count(&self) -> usize {
        self.skipped_files.len()
    }
}

impl Aggregator {
    /// `cached` is the previous run's symbol set; it only contributes for
    /// files that turn out to be unchanged.
    pub fn new(cached: Vec<CodeSymbol>) -> Self {
        let mut cached_by_file: HashMap<String, Vec<CodeSymbol>> = HashMap::new();
        let mut cached_by_id = HashMap::new();
        for symbol in cached {
            cached_by_id.insert(symbol.id.clone(), symbol.clone());
            cached_by_file
                .entry(symbol.file.clone())
                .or_default()
                .push(symbol);
        }

        Self {
            table: SymbolTable::new(),
            cached_by_file,
            cached_by_id,
            sources: Vec::new(),
            skipped_files: Vec::new(),
            errors: Vec::new(),
            hashes: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, outcome: ParseOutcome) {
        match outcome {
            ParseOutcome::Skipped { rel_path } => {
                if let Some(cached) = self.cached_by_file.remove(&rel_path) {
                    for symbol in cached {
                        if let Err(e) = symbol.validate() {
                            warn!("Dropping invalid cached symbol in {}: {}", rel_path, e);
                            continue;
                        }
                        self.table.upsert(symbol);
                    }
                }
                self.skipped_files.push(rel_path);
            }
            ParseOutcome::Parsed(file) => {
                for mut symbol in file.symbols {
                    if let Some(previous) = self.cached_by_id.get(&symbol.id) {
                        symbol.carry_external_fields(previous);
                    }
                    self.table.upsert(symbol);
                }
                self.hashes.insert(file.rel_path.clone(), file.hash);
                self.sources.push(SourceEntry {
                    rel_path: file.rel_path,
                    language: file.language,
                    source: file.source,
                });
            }
            ParseOutcome::Failed { rel_path, error } => {
                warn!("Indexing failed for {}: {}", rel_path, error);
                self.errors.push(FileError {
                    file: rel_path,
                    error,
                });
            }
        }
    }

    /// Record a failure that never reached a worker result.
    pub fn add_error(&mut self, file: impl Into<String>, error: impl ToString) {
        self.add(ParseOutcome::Failed {
            rel_path: file.into(),
            error: error.to_string(),
        });
    }

    pub fn finish(self) -> Aggregate {
        Aggregate {
            symbols: self.table.into_vec(),
            sources: self.sources,
            skipped_files: self.skipped_files,
            errors: self.errors,
            hashes: self.hashes,
        }
    }
}
