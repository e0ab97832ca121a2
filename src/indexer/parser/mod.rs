// Language parsers and the registry that dispatches to them

mod go;
mod java;
mod python;
mod rust;
mod typescript;

use std::collections::HashMap;
use std::sync::Arc;

use tree_sitter::{Node, Tree};

use crate::error::ParseError;
use crate::model::{CodeSymbol, Language, RelationshipKind, SymbolKind, Visibility};

pub use go::GoParser;
pub use java::JavaParser;
pub use python::PythonParser;
pub use rust::RustParser;
pub use typescript::TypeScriptParser;

/// Output of parsing one file.
pub struct ParsedSource {
    /// `None` when the language has no grammar.
    pub tree: Option<Tree>,
    pub symbols: Vec<CodeSymbol>,
}

/// An unresolved reference found while walking a tree. The relationship
/// extractor resolves `target_name` against the project-wide name index.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub source_id: String,
    pub target_name: String,
    pub kind: RelationshipKind,
    /// 1-based line of the referencing node.
    pub line: u32,
    /// Resolved by member name only, without knowing the receiver.
    pub inferred: bool,
}

impl Reference {
    pub fn new(source: &CodeSymbol, target_name: &str, kind: RelationshipKind, node: Node) -> Self {
        Self {
            source_id: source.id.clone(),
            target_name: target_name.to_string(),
            kind,
            line: start_line(node),
            inferred: false,
        }
    }
}

/// What an extraction hook can see about the file it is walking.
pub struct ExtractionContext<'a> {
    pub file: &'a str,
    pub source: &'a str,
    /// Symbols declared in this file.
    pub symbols: &'a [&'a CodeSymbol],
}

impl<'a> ExtractionContext<'a> {
    pub fn new(file: &'a str, source: &'a str, symbols: &'a [&'a CodeSymbol]) -> Self {
        Self {
            file,
            source,
            symbols,
        }
    }

    pub fn text(&self, node: Node) -> &'a str {
        node_text(node, self.source)
    }

    /// Innermost symbol whose range contains `line`.
    pub fn enclosing(&self, line: u32) -> Option<&'a CodeSymbol> {
        self.symbols
            .iter()
            .copied()
            .filter(|s| s.contains_line(line))
            .min_by(|a, b| {
                a.line_span()
                    .cmp(&b.line_span())
                    .then(b.start_line.cmp(&a.start_line))
            })
    }

    /// The symbol declared by exactly this node.
    pub fn declared_at(&self, node: Node) -> Option<&'a CodeSymbol> {
        let (start, end) = line_range(node);
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n));

        self.symbols.iter().copied().find(|s| {
            s.start_line == start && s.end_line == end && name.map_or(true, |n| s.name == n)
        })
    }

    pub fn top_level(&self) -> impl Iterator<Item = &'a CodeSymbol> + '_ {
        self.symbols.iter().copied().filter(|s| s.parent.is_none())
    }

    /// Reference from the symbol enclosing `node` to `target`.
    pub fn reference_from_enclosing(
        &self,
        node: Node,
        target: &str,
        kind: RelationshipKind,
        inferred: bool,
    ) -> Option<Reference> {
        let source = self.enclosing(start_line(node))?;
        let mut reference = Reference::new(source, target, kind, node);
        reference.inferred = inferred;
        Some(reference)
    }

    /// One `uses` reference per top-level symbol of the file.
    pub fn emit_import(&self, node: Node, target: &str, emit: &mut dyn FnMut(Reference)) {
        for symbol in self.top_level() {
            emit(Reference::new(symbol, target, RelationshipKind::Uses, node));
        }
    }
}

/// Per-language parsing and extraction strategy.
///
/// Strategies are shared by every worker thread, so they hold no mutable
/// state; a tree-sitter parser is created per call.
pub trait ParserStrategy: Send + Sync {
    fn language(&self) -> Language;

    /// `None` means files of this language are skipped.
    fn grammar(&self) -> Option<tree_sitter::Language>;

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &str) -> Vec<CodeSymbol>;

    fn parse_tree(&self, source: &str) -> Result<Option<Tree>, ParseError> {
        match self.grammar() {
            Some(grammar) => parse_with_grammar(&grammar, source, self.language()).map(Some),
            None => Ok(None),
        }
    }

    fn parse(&self, source: &str, file: &str) -> Result<ParsedSource, ParseError> {
        let tree = self.parse_tree(source)?;
        let symbols = tree
            .as_ref()
            .map(|tree| self.extract_symbols(tree, source, file))
            .unwrap_or_default();
        Ok(ParsedSource { tree, symbols })
    }

    /// Extension and implementation edges.
    fn extract_class_relationships(
        &self,
        _node: Node,
        _ctx: &ExtractionContext,
        _emit: &mut dyn FnMut(Reference),
    ) {
    }

    fn extract_instantiations(
        &self,
        _node: Node,
        _ctx: &ExtractionContext,
        _emit: &mut dyn FnMut(Reference),
    ) {
    }

    fn extract_imports(&self, _node: Node, _ctx: &ExtractionContext, _emit: &mut dyn FnMut(Reference)) {}

    fn extract_calls(&self, _node: Node, _ctx: &ExtractionContext, _emit: &mut dyn FnMut(Reference)) {}

    fn extract_event_listeners(
        &self,
        _node: Node,
        _ctx: &ExtractionContext,
        _emit: &mut dyn FnMut(Reference),
    ) {
    }
}

/// Fallback for languages without a grammar: no symbols, no edges.
pub struct NoopParser;

impl ParserStrategy for NoopParser {
    fn language(&self) -> Language {
        Language::Unknown
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        None
    }

    fn extract_symbols(&self, _tree: &Tree, _source: &str, _file: &str) -> Vec<CodeSymbol> {
        Vec::new()
    }
}

/// Maps a language to its parsing strategy.
pub struct ParserRegistry {
    strategies: HashMap<Language, Arc<dyn ParserStrategy>>,
    fallback: Arc<dyn ParserStrategy>,
}

impl ParserRegistry {
    /// Registry with every built-in strategy.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Language::TypeScript, Arc::new(TypeScriptParser::typescript()));
        registry.register(Language::Tsx, Arc::new(TypeScriptParser::tsx()));
        registry.register(Language::JavaScript, Arc::new(TypeScriptParser::javascript()));
        registry.register(Language::Python, Arc::new(PythonParser::new()));
        registry.register(Language::Rust, Arc::new(RustParser::new()));
        registry.register(Language::Go, Arc::new(GoParser::new()));
        registry.register(Language::Java, Arc::new(JavaParser::new()));

        registry
    }

    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: Arc::new(NoopParser),
        }
    }

    pub fn register(&mut self, language: Language, strategy: Arc<dyn ParserStrategy>) {
        self.strategies.insert(language, strategy);
    }

    /// The strategy for `language`, or the no-op fallback.
    pub fn get(&self, language: Language) -> Arc<dyn ParserStrategy> {
        self.strategies
            .get(&language)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn is_supported(&self, language: Language) -> bool {
        self.strategies.contains_key(&language)
    }

    /// Keep only the listed languages.
    pub fn retain(&mut self, enabled: &[Language]) {
        self.strategies.retain(|language, _| enabled.contains(language));
    }

    pub fn languages(&self) -> Vec<Language> {
        Language::SUPPORTED
            .into_iter()
            .filter(|l| self.strategies.contains_key(l))
            .collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `source`, treating any error node as a syntax failure.
pub fn parse_with_grammar(
    grammar: &tree_sitter::Language,
    source: &str,
    language: Language,
) -> Result<Tree, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| ParseError::Grammar {
            language: language.to_string(),
            message: e.to_string(),
        })?;

    let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ParseError::Syntax {
            line: first_error_line(root),
        });
    }

    Ok(tree)
}

fn first_error_line(root: Node) -> u32 {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return start_line(node);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    start_line(root)
}

pub(crate) fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub(crate) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub(crate) fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

pub(crate) fn start_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based, inclusive line range of a node.
pub(crate) fn line_range(node: Node) -> (u32, u32) {
    (start_line(node), node.end_position().row as u32 + 1)
}

/// Source text between two byte offsets with whitespace collapsed and
/// trailing body openers removed.
pub(crate) fn signature_between(source: &str, start: usize, end: usize) -> Option<String> {
    let text = source.get(start..end)?;
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['{', ':', ';', ' ']);
    let trimmed = trimmed.strip_suffix("=>").unwrap_or(trimmed).trim_end();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Signature spanning from `from` up to the start of `node`'s body.
pub(crate) fn header_signature(node: Node, from: Node, source: &str) -> Option<String> {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    signature_between(source, from.start_byte(), end)
}

/// Best-effort simple name of a type or callee expression.
pub(crate) fn simple_name<'s>(node: Node, source: &'s str) -> Option<&'s str> {
    match node.kind() {
        "identifier" | "type_identifier" | "property_identifier" | "field_identifier"
        | "private_property_identifier" | "shorthand_property_identifier" => {
            Some(node_text(node, source))
        }
        "type_arguments" | "type_parameters" | "arguments" | "argument_list" => None,
        _ => {
            for field in ["name", "property", "field", "attribute", "type", "function"] {
                if let Some(child) = node.child_by_field_name(field) {
                    if let Some(name) = simple_name(child, source) {
                        return Some(name);
                    }
                }
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            children
                .into_iter()
                .rev()
                .find_map(|child| simple_name(child, source))
        }
    }
}

/// Framework stereotype for a decorator or annotation name.
pub(crate) fn stereotype(annotation: &str) -> Option<(SymbolKind, &'static str)> {
    match annotation {
        "Injectable" | "Service" => Some((SymbolKind::Service, "application")),
        "Controller" | "RestController" => Some((SymbolKind::Controller, "presentation")),
        "Repository" | "EntityRepository" => Some((SymbolKind::Repository, "data")),
        _ => None,
    }
}

fn is_container(kind: SymbolKind) -> bool {
    kind.is_class_like()
        || matches!(
            kind,
            SymbolKind::Enum | SymbolKind::Trait | SymbolKind::Interface | SymbolKind::Type
        )
}

/// Builds the flat symbol list for one file while tracking lexical scope.
pub(crate) struct SymbolCollector<'a> {
    file: &'a str,
    source: &'a str,
    language: Language,
    separator: &'static str,
    scope: Vec<(String, String)>,
    symbols: Vec<CodeSymbol>,
}

impl<'a> SymbolCollector<'a> {
    pub fn new(file: &'a str, source: &'a str, language: Language, separator: &'static str) -> Self {
        Self {
            file,
            source,
            language,
            separator,
            scope: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn text(&self, node: Node) -> &'a str {
        node_text(node, self.source)
    }

    /// Whether the innermost enclosing scope entry is a symbol of one of `kinds`.
    pub fn in_scope_of(&self, kinds: &[SymbolKind]) -> bool {
        self.scope.last().is_some_and(|(id, _)| {
            self.symbols
                .iter()
                .rev()
                .find(|s| &s.id == id)
                .is_some_and(|s| kinds.contains(&s.kind))
        })
    }

    /// Record a symbol spanning `node`. Returns its index.
    pub fn declare(&mut self, node: Node, name: &str, kind: SymbolKind) -> usize {
        let (start, end) = line_range(node);
        let mut symbol = CodeSymbol::new(self.file, name, kind, start, end);
        symbol.language = Some(self.language);

        if let Some((parent_id, _)) = self.scope.last() {
            symbol.parent = Some(parent_id.clone());
        }
        if !self.scope.is_empty() {
            let path: Vec<&str> = self.scope.iter().map(|(_, n)| n.as_str()).collect();
            symbol.qualified_name = Some(format!("{}{}{}", path.join(self.separator), self.separator, name));
        }

        self.symbols.push(symbol);
        self.symbols.len() - 1
    }

    pub fn get_mut(&mut self, index: usize) -> &mut CodeSymbol {
        &mut self.symbols[index]
    }

    pub fn enter(&mut self, index: usize) {
        let symbol = &self.symbols[index];
        self.scope.push((symbol.id.clone(), symbol.name.clone()));
    }

    pub fn leave(&mut self) {
        self.scope.pop();
    }

    /// Attach a symbol to a container declared elsewhere in the file.
    pub fn adopt(&mut self, index: usize, container: &str) {
        let parent = self
            .symbols
            .iter()
            .find(|s| s.name == container && is_container(s.kind))
            .map(|s| s.id.clone());

        let symbol = &mut self.symbols[index];
        symbol.qualified_name = Some(format!("{}{}{}", container, self.separator, symbol.name));
        symbol.parent = parent;
    }

    pub fn set_visibility(&mut self, index: usize, visibility: Visibility, exported: bool) {
        let symbol = &mut self.symbols[index];
        symbol.visibility = Some(visibility);
        symbol.exported = Some(exported);
    }

    pub fn finish(self) -> Vec<CodeSymbol> {
        self.symbols
    }
}
