// Directed relationships between symbols

use std::fmt;

use serde::{Deserialize, Serialize};

/// Relationship kinds. `Other` keeps the set open for custom edge types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationshipKind {
    Calls,
    Inherits,
    Implements,
    Instantiates,
    Uses,
    Contains,
    Other(String),
}

impl RelationshipKind {
    pub fn as_str(&self) -> &str {
        match self {
            RelationshipKind::Calls => "calls",
            RelationshipKind::Inherits => "inherits",
            RelationshipKind::Implements => "implements",
            RelationshipKind::Instantiates => "instantiates",
            RelationshipKind::Uses => "uses",
            RelationshipKind::Contains => "contains",
            RelationshipKind::Other(kind) => kind,
        }
    }
}

impl From<String> for RelationshipKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "calls" => RelationshipKind::Calls,
            "inherits" => RelationshipKind::Inherits,
            "implements" => RelationshipKind::Implements,
            "instantiates" => RelationshipKind::Instantiates,
            "uses" => RelationshipKind::Uses,
            "contains" => RelationshipKind::Contains,
            _ => RelationshipKind::Other(kind),
        }
    }
}

impl From<RelationshipKind> for String {
    fn from(kind: RelationshipKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a relationship was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipLocation {
    pub file: String,
    pub line: u32,
}

/// A directed, typed edge between two symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRelationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<RelationshipLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred: Option<bool>,
}

impl SymbolRelationship {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            confidence: None,
            location: None,
            inferred: None,
        }
    }

    /// The `(sourceId, targetId, type)` triple that must be unique per run.
    pub fn key(&self) -> (String, String, RelationshipKind) {
        (
            self.source_id.clone(),
            self.target_id.clone(),
            self.kind.clone(),
        )
    }
}
