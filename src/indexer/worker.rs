// Per-file parse task executed on pool workers

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::parser::ParserRegistry;
use crate::error::ParseError;
use crate::model::{content_hash, CodeSymbol, Language, SymbolSource};

/// Work item sent to a worker.
#[derive(Debug, Clone)]
pub struct ParseTask {
    pub file_path: PathBuf,
    pub rel_path: String,
    /// Hash recorded by the previous run, if any.
    pub existing_hash: Option<String>,
    pub full_rebuild: bool,
}

/// A successfully parsed file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub rel_path: String,
    pub symbols: Vec<CodeSymbol>,
    pub hash: String,
    /// Source text, kept for relationship extraction.
    pub source: String,
    pub language: Language,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Result sent back from a worker.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// Content hash matched the previous run.
    Skipped { rel_path: String },
    Parsed(ParsedFile),
    Failed { rel_path: String, error: String },
}

/// Read, hash and (unless unchanged) parse one file.
///
/// Never panics on bad input: every read or parse problem is returned as
/// [`ParseOutcome::Failed`].
pub fn run_parse_task(registry: &ParserRegistry, task: ParseTask) -> ParseOutcome {
    match parse_file(registry, &task) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Failed to parse {}: {}", task.rel_path, e);
            ParseOutcome::Failed {
                rel_path: task.rel_path,
                error: e.to_string(),
            }
        }
    }
}

fn parse_file(registry: &ParserRegistry, task: &ParseTask) -> Result<ParseOutcome, ParseError> {
    let bytes = fs::read(&task.file_path).map_err(|e| ParseError::Read {
        path: task.rel_path.clone(),
        message: e.to_string(),
    })?;

    let hash = content_hash(&bytes);
    if !task.full_rebuild && task.existing_hash.as_deref() == Some(hash.as_str()) {
        debug!("Skipping unchanged file: {}", task.rel_path);
        return Ok(ParseOutcome::Skipped {
            rel_path: task.rel_path.clone(),
        });
    }

    let language = Language::from_path(&task.file_path);
    let strategy = registry.get(language);
    let last_modified = fs::metadata(&task.file_path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    // No grammar: hashed but never decoded, so binary files are fine
    if strategy.grammar().is_none() {
        debug!("No parser for {} ({}), recording hash only", task.rel_path, language);
        return Ok(ParseOutcome::Parsed(ParsedFile {
            rel_path: task.rel_path.clone(),
            symbols: Vec::new(),
            hash,
            source: String::new(),
            language,
            last_modified,
        }));
    }

    let source = String::from_utf8(bytes).map_err(|e| ParseError::Read {
        path: task.rel_path.clone(),
        message: e.to_string(),
    })?;
    let parsed = strategy.parse(&source, &task.rel_path)?;

    let mut symbols = Vec::with_capacity(parsed.symbols.len());
    for mut symbol in parsed.symbols {
        if let Err(e) = symbol.validate() {
            warn!("Dropping invalid symbol in {}: {}", task.rel_path, e);
            continue;
        }
        symbol.source = SymbolSource::Human;
        symbol.last_modified = last_modified;
        symbols.push(symbol);
    }

    debug!("Parsed {} ({} symbols)", task.rel_path, symbols.len());

    Ok(ParseOutcome::Parsed(ParsedFile {
        rel_path: task.rel_path.clone(),
        symbols,
        hash,
        source,
        language,
        last_modified,
    }))
}
