// symgraph: incremental, parallel symbol and relationship indexer

pub mod config;
pub mod error;
pub mod indexer;
pub mod model;

pub use config::Config;
pub use indexer::{IndexRequest, IndexResult, Indexer, SourceFile};
