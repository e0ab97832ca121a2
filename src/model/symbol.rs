// Code symbols and their identity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::language::Language;
use super::metrics::SymbolMetrics;
use crate::error::ModelError;

/// Number of hex characters kept from the id digest.
pub const SYMBOL_ID_LEN: usize = 16;

/// Derive the deterministic id of a symbol from `(file, name, kind)`.
///
/// The same triple always yields the same id, in any process. Two
/// declarations that collide on the triple are the same logical symbol.
pub fn symbol_id(file: &str, name: &str, kind: SymbolKind) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(file.as_bytes());
    hasher.update(b"\x00");
    hasher.update(name.as_bytes());
    hasher.update(b"\x00");
    hasher.update(kind.as_str().as_bytes());

    let hex = hasher.finalize().to_hex();
    hex[..SYMBOL_ID_LEN].to_string()
}

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    AbstractClass,
    Interface,
    Enum,
    Type,
    Trait,
    Method,
    Function,
    Constructor,
    Lambda,
    Service,
    Controller,
    Repository,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::AbstractClass => "abstract_class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Type => "type",
            SymbolKind::Trait => "trait",
            SymbolKind::Method => "method",
            SymbolKind::Function => "function",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Lambda => "lambda",
            SymbolKind::Service => "service",
            SymbolKind::Controller => "controller",
            SymbolKind::Repository => "repository",
        }
    }

    /// Functions, methods, constructors and lambdas.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor | SymbolKind::Lambda
        )
    }

    /// Kinds that can be instantiated.
    pub fn is_class_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::AbstractClass
                | SymbolKind::Service
                | SymbolKind::Controller
                | SymbolKind::Repository
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(SymbolKind::Class),
            "abstract_class" => Ok(SymbolKind::AbstractClass),
            "interface" => Ok(SymbolKind::Interface),
            "enum" => Ok(SymbolKind::Enum),
            "type" => Ok(SymbolKind::Type),
            "trait" => Ok(SymbolKind::Trait),
            "method" => Ok(SymbolKind::Method),
            "function" => Ok(SymbolKind::Function),
            "constructor" => Ok(SymbolKind::Constructor),
            "lambda" => Ok(SymbolKind::Lambda),
            "service" => Ok(SymbolKind::Service),
            "controller" => Ok(SymbolKind::Controller),
            "repository" => Ok(SymbolKind::Repository),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// Visibility levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Internal,
}

/// Who produced a symbol record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolSource {
    #[default]
    Human,
    Generated,
}

/// One declared program entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSymbol {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Id of the lexically enclosing symbol. Not an ownership link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SymbolMetrics>,
    #[serde(default)]
    pub source: SymbolSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    // Owned by the governance engine and the explanation feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_hash: Option<String>,
}

impl CodeSymbol {
    /// Create a symbol with its id derived from `(file, name, kind)`.
    pub fn new(
        file: impl Into<String>,
        name: impl Into<String>,
        kind: SymbolKind,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let file = file.into();
        let name = name.into();

        Self {
            id: symbol_id(&file, &name, kind),
            name,
            qualified_name: None,
            kind,
            file,
            start_line,
            end_line,
            parent: None,
            visibility: None,
            exported: None,
            language: None,
            signature: None,
            tags: Vec::new(),
            layer: None,
            metrics: None,
            source: SymbolSource::Human,
            last_modified: None,
            pattern: None,
            violations: Vec::new(),
            explanation: None,
            explanation_hash: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.is_empty() {
            return Err(ModelError::EmptyName {
                file: self.file.clone(),
                line: self.start_line,
            });
        }
        if self.end_line < self.start_line {
            return Err(ModelError::InvalidRange {
                name: self.name.clone(),
                start_line: self.start_line,
                end_line: self.end_line,
            });
        }
        Ok(())
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// `end_line - start_line`, or 0 for an inverted range.
    pub fn line_span(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line)
    }

    /// Copy the fields written by external collaborators from an older
    /// record of the same symbol.
    pub fn carry_external_fields(&mut self, previous: &CodeSymbol) {
        if self.pattern.is_none() {
            self.pattern = previous.pattern.clone();
        }
        if self.violations.is_empty() {
            self.violations = previous.violations.clone();
        }
        if self.explanation.is_none() {
            self.explanation = previous.explanation.clone();
        }
        if self.explanation_hash.is_none() {
            self.explanation_hash = previous.explanation_hash.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_symbol_id_is_deterministic() {
        let a = symbol_id("src/a.ts", "foo", SymbolKind::Function);
        let b = symbol_id("src/a.ts", "foo", SymbolKind::Function);
        assert_eq!(a, b);
        assert_eq!(a.len(), SYMBOL_ID_LEN);
    }

    #[test]
    fn test_symbol_id_depends_on_every_component() {
        let base = symbol_id("src/a.ts", "foo", SymbolKind::Function);
        assert_ne!(base, symbol_id("src/b.ts", "foo", SymbolKind::Function));
        assert_ne!(base, symbol_id("src/a.ts", "bar", SymbolKind::Function));
        assert_ne!(base, symbol_id("src/a.ts", "foo", SymbolKind::Method));
    }

    #[test]
    fn test_symbol_id_separator_prevents_ambiguity() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(
            symbol_id("ab", "c", SymbolKind::Class),
            symbol_id("a", "bc", SymbolKind::Class)
        );
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut symbol = CodeSymbol::new("a.ts", "foo", SymbolKind::Function, 10, 12);
        assert!(symbol.validate().is_ok());

        symbol.end_line = 9;
        assert!(matches!(symbol.validate(), Err(ModelError::InvalidRange { .. })));
        assert_eq!(symbol.line_span(), 0);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let symbol = CodeSymbol::new("a.ts", "", SymbolKind::Function, 1, 1);
        assert!(matches!(symbol.validate(), Err(ModelError::EmptyName { .. })));
    }

    #[test]
    fn test_kind_parses_from_its_own_name() {
        let kind: SymbolKind = "abstract_class".parse().unwrap();
        assert_eq!(kind, SymbolKind::AbstractClass);
        assert_eq!(kind.to_string(), "abstract_class");
        assert!("widget".parse::<SymbolKind>().is_err());
    }

    #[test]
    fn test_carry_external_fields_keeps_collaborator_data() {
        let mut previous = CodeSymbol::new("a.ts", "foo", SymbolKind::Function, 1, 3);
        previous.pattern = Some("facade".to_string());
        previous.violations = vec!["layer-crossing".to_string()];
        previous.explanation = Some("Adds numbers".to_string());
        previous.explanation_hash = Some("abc".to_string());

        let mut fresh = CodeSymbol::new("a.ts", "foo", SymbolKind::Function, 1, 5);
        fresh.carry_external_fields(&previous);

        assert_eq!(fresh.pattern.as_deref(), Some("facade"));
        assert_eq!(fresh.violations, vec!["layer-crossing".to_string()]);
        assert_eq!(fresh.explanation.as_deref(), Some("Adds numbers"));
        assert_eq!(fresh.explanation_hash.as_deref(), Some("abc"));
        assert_eq!(fresh.end_line, 5);
    }

    #[test]
    fn test_serializes_with_camel_case_fields() {
        let symbol = CodeSymbol::new("a.ts", "foo", SymbolKind::AbstractClass, 1, 2);
        let json = serde_json::to_value(&symbol).unwrap();
        assert_eq!(json["startLine"], 1);
        assert_eq!(json["kind"], "abstract_class");
        assert_eq!(json["source"], "human");
        assert!(json.get("explanation").is_none());
    }

    proptest! {
        #[test]
        fn prop_symbol_id_stable(file in "[a-z/]{1,20}\\.ts", name in "[A-Za-z_][A-Za-z0-9_]{0,15}") {
            let first = symbol_id(&file, &name, SymbolKind::Function);
            let second = CodeSymbol::new(file.clone(), name.clone(), SymbolKind::Function, 1, 1).id;
            prop_assert_eq!(first, second);
        }
    }
}
