// Cross-file relationship extraction over the complete symbol set

use std::collections::{HashMap, HashSet};

use tracing::debug;
use tree_sitter::{Node, Tree};

use super::parser::{ExtractionContext, ParserRegistry, ParserStrategy, Reference};
use crate::model::{
    CodeSymbol, Language, RelationshipKind, RelationshipLocation, SymbolRelationship,
};

/// A parsed file ready for the relationship and metrics passes.
pub struct SourceTree {
    pub rel_path: String,
    pub language: Language,
    pub source: String,
    pub tree: Tree,
}

/// Project-wide `name -> symbol` lookup, built fresh for each run.
///
/// On a name collision the first registered symbol wins.
pub struct NameIndex<'a> {
    names: HashMap<&'a str, &'a CodeSymbol>,
}

impl<'a> NameIndex<'a> {
    pub fn build(symbols: &'a [CodeSymbol]) -> Self {
        let mut names = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            names.entry(symbol.name.as_str()).or_insert(symbol);
        }
        Self { names }
    }

    pub fn resolve(&self, name: &str) -> Option<&'a CodeSymbol> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Edge list that rejects repeated `(source, target, type)` triples.
#[derive(Default)]
pub struct EdgeSet {
    seen: HashSet<(String, String, RelationshipKind)>,
    edges: Vec<SymbolRelationship>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an edge with the same triple is already present.
    pub fn insert(&mut self, edge: SymbolRelationship) -> bool {
        if !self.seen.insert(edge.key()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn into_vec(self) -> Vec<SymbolRelationship> {
        self.edges
    }
}

/// Resolve every reference in `trees` against `symbols`.
///
/// Containment edges come first, then per-file edges in tree order, so the
/// output only depends on the symbol set and the order of `trees`.
pub fn extract_relationships(
    registry: &ParserRegistry,
    trees: &[SourceTree],
    symbols: &[CodeSymbol],
) -> Vec<SymbolRelationship> {
    let index = NameIndex::build(symbols);
    let mut edges = EdgeSet::new();

    add_containment(symbols, &mut edges);

    let mut by_file: HashMap<&str, Vec<&CodeSymbol>> = HashMap::new();
    for symbol in symbols {
        by_file.entry(symbol.file.as_str()).or_default().push(symbol);
    }

    for unit in trees {
        let file_symbols = by_file.get(unit.rel_path.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let ctx = ExtractionContext::new(&unit.rel_path, &unit.source, file_symbols);

        let mut references = Vec::new();
        collect_references(registry, unit, &ctx, &mut references);

        let before = edges.len();
        for reference in references {
            if let Some(edge) = resolve(&index, &unit.rel_path, reference) {
                edges.insert(edge);
            }
        }
        debug!("{}: {} relationships", unit.rel_path, edges.len() - before);
    }

    edges.into_vec()
}

fn add_containment(symbols: &[CodeSymbol], edges: &mut EdgeSet) {
    let ids: HashSet<&str> = symbols.iter().map(|s| s.id.as_str()).collect();

    for symbol in symbols {
        let Some(parent) = symbol.parent.as_deref() else {
            continue;
        };
        if !ids.contains(parent) || parent == symbol.id {
            continue;
        }
        let mut edge = SymbolRelationship::new(parent, symbol.id.as_str(), RelationshipKind::Contains);
        edge.location = Some(RelationshipLocation {
            file: symbol.file.clone(),
            line: symbol.start_line,
        });
        edges.insert(edge);
    }
}

/// Pre-order walk feeding every node to the strategy's hooks.
fn collect_references(
    registry: &ParserRegistry,
    unit: &SourceTree,
    ctx: &ExtractionContext,
    out: &mut Vec<Reference>,
) {
    let strategy = registry.get(unit.language);
    let mut emit = |reference: Reference| out.push(reference);

    let mut visit = |node: Node| {
        strategy.extract_class_relationships(node, ctx, &mut emit);
        strategy.extract_instantiations(node, ctx, &mut emit);
        strategy.extract_imports(node, ctx, &mut emit);
        strategy.extract_calls(node, ctx, &mut emit);
        strategy.extract_event_listeners(node, ctx, &mut emit);
    };

    let mut cursor = unit.tree.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Turn a reference into an edge, or drop it if the name is unknown.
fn resolve(index: &NameIndex, file: &str, reference: Reference) -> Option<SymbolRelationship> {
    let target = index.resolve(&reference.target_name)?;

    // Calling a class is constructing it
    let kind = match reference.kind {
        RelationshipKind::Calls if target.kind.is_class_like() => RelationshipKind::Instantiates,
        kind => kind,
    };

    let mut edge = SymbolRelationship::new(reference.source_id, target.id.as_str(), kind);
    edge.location = Some(RelationshipLocation {
        file: file.to_string(),
        line: reference.line,
    });
    edge.inferred = Some(reference.inferred);
    Some(edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolKind;
    use proptest::prelude::*;

    fn unit(registry: &ParserRegistry, rel_path: &str, source: &str) -> (SourceTree, Vec<CodeSymbol>) {
        let language = Language::from_path(rel_path);
        let parsed = registry.get(language).parse(source, rel_path).unwrap();
        let tree = SourceTree {
            rel_path: rel_path.to_string(),
            language,
            source: source.to_string(),
            tree: parsed.tree.unwrap(),
        };
        (tree, parsed.symbols)
    }

    fn project(files: &[(&str, &str)]) -> (Vec<SourceTree>, Vec<CodeSymbol>) {
        let registry = ParserRegistry::new();
        let mut trees = Vec::new();
        let mut symbols = Vec::new();
        for (path, source) in files {
            let (tree, file_symbols) = unit(&registry, path, source);
            trees.push(tree);
            symbols.extend(file_symbols);
        }
        (trees, symbols)
    }

    fn id(symbols: &[CodeSymbol], name: &str) -> String {
        symbols.iter().find(|s| s.name == name).unwrap().id.clone()
    }

    #[test]
    fn test_cross_file_call() {
        let (trees, symbols) = project(&[
            ("a.ts", "function foo(x, y) { if (x) { return y; } return 0; }\n"),
            ("b.ts", "function bar() { foo(1, 2); }\n"),
        ]);
        let edges = extract_relationships(&ParserRegistry::new(), &trees, &symbols);

        let call = edges
            .iter()
            .find(|e| e.kind == RelationshipKind::Calls)
            .unwrap();
        assert_eq!(call.source_id, id(&symbols, "bar"));
        assert_eq!(call.target_id, id(&symbols, "foo"));
        assert_eq!(call.inferred, Some(false));
        assert_eq!(
            call.location,
            Some(RelationshipLocation {
                file: "b.ts".to_string(),
                line: 1
            })
        );
    }

    #[test]
    fn test_unresolved_names_are_dropped() {
        let (trees, symbols) = project(&[("a.ts", "function foo() { console.log(1); lodash.map([]); }\n")]);
        let edges = extract_relationships(&ParserRegistry::new(), &trees, &symbols);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_repeated_calls_yield_one_edge() {
        let (trees, symbols) = project(&[(
            "a.ts",
            "function foo() {}\nfunction bar() {\n  foo();\n  foo();\n  foo();\n}\n",
        )]);
        let edges = extract_relationships(&ParserRegistry::new(), &trees, &symbols);
        let calls: Vec<_> = edges
            .iter()
            .filter(|e| e.kind == RelationshipKind::Calls)
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].location.as_ref().unwrap().line, 3);
    }

    #[test]
    fn test_contains_and_class_edges() {
        let (trees, symbols) = project(&[(
            "zoo.ts",
            "class Animal {}\ninterface Pet {}\nclass Dog extends Animal implements Pet {\n  bark() {}\n}\n",
        )]);
        let edges = extract_relationships(&ParserRegistry::new(), &trees, &symbols);

        let has = |source: &str, target: &str, kind: RelationshipKind| {
            edges.iter().any(|e| {
                e.source_id == id(&symbols, source) && e.target_id == id(&symbols, target) && e.kind == kind
            })
        };
        assert!(has("Dog", "bark", RelationshipKind::Contains));
        assert!(has("Dog", "Animal", RelationshipKind::Inherits));
        assert!(has("Dog", "Pet", RelationshipKind::Implements));
    }

    #[test]
    fn test_calling_a_class_is_instantiation() {
        let (trees, symbols) = project(&[
            ("models.py", "class User:\n    pass\n"),
            ("app.py", "def make():\n    return User()\n"),
        ]);
        let edges = extract_relationships(&ParserRegistry::new(), &trees, &symbols);

        assert!(edges.iter().any(|e| e.kind == RelationshipKind::Instantiates
            && e.source_id == id(&symbols, "make")
            && e.target_id == id(&symbols, "User")));
        assert!(!edges.iter().any(|e| e.kind == RelationshipKind::Calls));
    }

    #[test]
    fn test_imports_are_uses_from_top_level_symbols() {
        let (trees, symbols) = project(&[
            ("a.ts", "export function foo() {}\n"),
            ("b.ts", "import { foo } from './a';\nexport function bar() {}\nexport class Baz {}\n"),
        ]);
        let edges = extract_relationships(&ParserRegistry::new(), &trees, &symbols);

        let uses: Vec<_> = edges
            .iter()
            .filter(|e| e.kind == RelationshipKind::Uses)
            .collect();
        assert_eq!(uses.len(), 2);
        assert!(uses.iter().all(|e| e.target_id == id(&symbols, "foo")));
    }

    #[test]
    fn test_name_index_first_registered_wins() {
        let symbols = vec![
            CodeSymbol::new("a.ts", "run", SymbolKind::Function, 1, 1),
            CodeSymbol::new("b.ts", "run", SymbolKind::Function, 1, 1),
        ];
        let index = NameIndex::build(&symbols);
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve("run").unwrap().file, "a.ts");
        assert!(index.resolve("walk").is_none());
    }

    proptest! {
        #[test]
        fn prop_edge_set_has_unique_triples(
            triples in proptest::collection::vec((0u8..4, 0u8..4, 0u8..3), 0..40)
        ) {
            let kinds = [RelationshipKind::Calls, RelationshipKind::Uses, RelationshipKind::Inherits];
            let mut edges = EdgeSet::new();
            for (s, t, k) in &triples {
                edges.insert(SymbolRelationship::new(s.to_string(), t.to_string(), kinds[*k as usize].clone()));
            }

            let edges = edges.into_vec();
            let unique: HashSet<_> = edges.iter().map(|e| e.key()).collect();
            prop_assert_eq!(unique.len(), edges.len());

            let expected: HashSet<_> = triples.iter().collect();
            prop_assert_eq!(edges.len(), expected.len());
        }
    }
}
