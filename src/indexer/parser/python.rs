// Python extraction

use tree_sitter::{Node, Tree};

use super::{
    children, header_signature, named_children, simple_name, ExtractionContext, ParserStrategy,
    Reference, SymbolCollector,
};
use crate::model::{CodeSymbol, Language, RelationshipKind, SymbolKind, Visibility};

pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, node: Node, out: &mut SymbolCollector) {
        let handled = match node.kind() {
            "class_definition" => self.extract_class(node, out),
            "function_definition" => self.extract_function(node, out),
            "assignment" => self.extract_lambda(node, out),
            _ => None,
        };

        if handled.is_none() {
            for child in children(node) {
                self.walk(child, out);
            }
        }
    }

    fn walk_body(&self, node: Node, index: usize, out: &mut SymbolCollector) {
        out.enter(index);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, out);
        }
        out.leave();
    }

    fn extract_class(&self, node: Node, out: &mut SymbolCollector) -> Option<()> {
        let name_node = node.child_by_field_name("name")?;
        let name = out.text(name_node);

        let is_abstract = node
            .child_by_field_name("superclasses")
            .map(|bases| {
                named_children(bases).into_iter().any(|base| match base.kind() {
                    "keyword_argument" => out.text(base).replace(' ', "") == "metaclass=ABCMeta",
                    _ => matches!(simple_name(base, out.source()), Some("ABC")),
                })
            })
            .unwrap_or(false);
        let kind = if is_abstract {
            SymbolKind::AbstractClass
        } else {
            SymbolKind::Class
        };

        let index = out.declare(node, name, kind);
        let (visibility, exported) = visibility_of(name);
        out.set_visibility(index, visibility, exported);
        out.get_mut(index).signature = header_signature(node, node, out.source());
        out.get_mut(index).tags = decorators(node, out.source());

        self.walk_body(node, index, out);
        Some(())
    }

    fn extract_function(&self, node: Node, out: &mut SymbolCollector) -> Option<()> {
        let name_node = node.child_by_field_name("name")?;
        let name = out.text(name_node);

        let in_class = out.in_scope_of(&[SymbolKind::Class, SymbolKind::AbstractClass]);
        let kind = match (in_class, name) {
            (true, "__init__") => SymbolKind::Constructor,
            (true, _) => SymbolKind::Method,
            (false, _) => SymbolKind::Function,
        };

        let index = out.declare(node, name, kind);
        let (visibility, exported) = visibility_of(name);
        out.set_visibility(index, visibility, exported);
        out.get_mut(index).signature = header_signature(node, node, out.source());
        out.get_mut(index).tags = decorators(node, out.source());

        self.walk_body(node, index, out);
        Some(())
    }

    /// `name = lambda ...: ...`
    fn extract_lambda(&self, node: Node, out: &mut SymbolCollector) -> Option<()> {
        let left = node.child_by_field_name("left")?;
        let right = node.child_by_field_name("right")?;
        if left.kind() != "identifier" || right.kind() != "lambda" {
            return None;
        }

        let name = out.text(left);
        let params = right
            .child_by_field_name("parameters")
            .map(|p| out.text(p))
            .unwrap_or("");

        let index = out.declare(node, name, SymbolKind::Lambda);
        let (visibility, exported) = visibility_of(name);
        out.set_visibility(index, visibility, exported);
        out.get_mut(index).signature = Some(format!("{}({})", name, params));
        Some(())
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserStrategy for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_python::LANGUAGE.into())
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &str) -> Vec<CodeSymbol> {
        let mut out = SymbolCollector::new(file, source, Language::Python, ".");
        self.walk(tree.root_node(), &mut out);
        out.finish()
    }

    fn extract_class_relationships(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        if node.kind() != "class_definition" {
            return;
        }
        let (Some(class), Some(bases)) = (ctx.declared_at(node), node.child_by_field_name("superclasses"))
        else {
            return;
        };

        for base in named_children(bases) {
            if !matches!(base.kind(), "identifier" | "attribute") {
                continue;
            }
            if let Some(name) = simple_name(base, ctx.source) {
                emit(Reference::new(class, name, RelationshipKind::Inherits, base));
            }
        }
    }

    fn extract_imports(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "import_from_statement" {
            return;
        }
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();

        for item in names {
            let imported = match item.kind() {
                "aliased_import" => item.child_by_field_name("name"),
                _ => Some(item),
            };
            if let Some(name) = imported.and_then(|n| simple_name(n, ctx.source)) {
                ctx.emit_import(item, name, emit);
            }
        }
    }

    fn extract_calls(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "call" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };

        let (name, inferred) = match function.kind() {
            "identifier" => (ctx.text(function), false),
            "attribute" => match function.child_by_field_name("attribute") {
                Some(attribute) => (ctx.text(attribute), true),
                None => return,
            },
            _ => return,
        };

        if let Some(reference) =
            ctx.reference_from_enclosing(node, name, RelationshipKind::Calls, inferred)
        {
            emit(reference);
        }
    }
}

/// Leading underscore marks a private name.
fn visibility_of(name: &str) -> (Visibility, bool) {
    if name.starts_with("__") && name.ends_with("__") {
        (Visibility::Public, true)
    } else if name.starts_with('_') {
        (Visibility::Private, false)
    } else {
        (Visibility::Public, true)
    }
}

fn decorators(node: Node, source: &str) -> Vec<String> {
    let Some(parent) = node.parent().filter(|p| p.kind() == "decorated_definition") else {
        return Vec::new();
    };

    named_children(parent)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .filter_map(|d| d.named_child(0))
        .filter_map(|expr| simple_name(expr, source))
        .map(str::to_string)
        .collect()
}
