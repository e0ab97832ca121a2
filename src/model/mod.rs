// Shared symbol model produced by the indexing pipeline

pub mod hash;
pub mod language;
pub mod metrics;
pub mod relationship;
pub mod symbol;
pub mod table;

pub use hash::{content_hash, FileHashRecord};
pub use language::Language;
pub use metrics::{SymbolMetrics, TestCoverage};
pub use relationship::{RelationshipKind, RelationshipLocation, SymbolRelationship};
pub use symbol::{symbol_id, CodeSymbol, SymbolKind, SymbolSource, Visibility, SYMBOL_ID_LEN};
pub use table::SymbolTable;
