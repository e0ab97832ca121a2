// Error types for the indexing core

use thiserror::Error;

/// Symbol model validation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Symbol in {file} at line {line} has an empty name")]
    EmptyName { file: String, line: u32 },

    #[error("Symbol {name} ends before it starts ({start_line} > {end_line})")]
    InvalidRange {
        name: String,
        start_line: u32,
        end_line: u32,
    },

    #[error("Unknown symbol kind: {0}")]
    UnknownKind(String),
}

/// Per-file failures. Never abort a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to load {language} grammar: {message}")]
    Grammar { language: String, message: String },

    #[error("Syntax error at line {line}")]
    Syntax { line: u32 },

    #[error("Parser produced no tree")]
    NoTree,
}

/// Per-task worker pool failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("Worker crashed: {0}")]
    Crashed(String),

    #[error("Worker pool closed before the task completed")]
    PoolClosed,
}

/// Fatal pool construction failures.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker pool size must be greater than 0")]
    EmptyPool,

    #[error("Worker pool must be started inside a Tokio runtime")]
    NoRuntime,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Orchestration-level failures that abort a whole run.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

pub type Result<T> = std::result::Result<T, IndexError>;
