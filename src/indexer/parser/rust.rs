// Rust extraction

use tree_sitter::{Node, Tree};

use super::{
    children, header_signature, named_children, simple_name, ExtractionContext, ParserStrategy,
    Reference, SymbolCollector,
};
use crate::model::{CodeSymbol, Language, RelationshipKind, SymbolKind, Visibility};

pub struct RustParser;

/// Methods declared inside an `impl` block, attached to their type after the walk.
struct PendingImpl {
    index: usize,
    type_name: String,
}

impl RustParser {
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, node: Node, out: &mut SymbolCollector, pending: &mut Vec<PendingImpl>) {
        match node.kind() {
            "struct_item" | "union_item" => self.extract_item(node, out, SymbolKind::Class, pending),
            "enum_item" => self.extract_item(node, out, SymbolKind::Enum, pending),
            "type_item" => self.extract_item(node, out, SymbolKind::Type, pending),
            "trait_item" => self.extract_item(node, out, SymbolKind::Trait, pending),
            "function_item" | "function_signature_item" => self.extract_function(node, out, pending),
            "impl_item" => self.extract_impl(node, out, pending),
            _ => {
                for child in children(node) {
                    self.walk(child, out, pending);
                }
            }
        }
    }

    fn extract_item(
        &self,
        node: Node,
        out: &mut SymbolCollector,
        kind: SymbolKind,
        pending: &mut Vec<PendingImpl>,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };

        let index = out.declare(node, out.text(name_node), kind);
        let (visibility, exported) = visibility_of(node, out.source());
        out.set_visibility(index, visibility, exported);
        out.get_mut(index).signature = header_signature(node, node, out.source());

        if kind == SymbolKind::Trait {
            out.enter(index);
            if let Some(body) = node.child_by_field_name("body") {
                for child in children(body) {
                    self.walk(child, out, pending);
                }
            }
            out.leave();
        }
    }

    fn extract_function(&self, node: Node, out: &mut SymbolCollector, pending: &mut Vec<PendingImpl>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let kind = if out.in_scope_of(&[SymbolKind::Trait]) {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };

        let index = out.declare(node, out.text(name_node), kind);
        let (visibility, exported) = visibility_of(node, out.source());
        out.set_visibility(index, visibility, exported);
        out.get_mut(index).signature = header_signature(node, node, out.source());

        // Nested items
        out.enter(index);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, out, pending);
        }
        out.leave();
    }

    fn extract_impl(&self, node: Node, out: &mut SymbolCollector, pending: &mut Vec<PendingImpl>) {
        let Some(type_name) = node
            .child_by_field_name("type")
            .and_then(|ty| simple_name(ty, out.source()))
        else {
            return;
        };
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };

        for item in named_children(body) {
            if item.kind() != "function_item" {
                self.walk(item, out, pending);
                continue;
            }
            let Some(name_node) = item.child_by_field_name("name") else {
                continue;
            };
            let name = out.text(name_node);
            let kind = if name == "new" {
                SymbolKind::Constructor
            } else {
                SymbolKind::Method
            };

            let index = out.declare(item, name, kind);
            let (visibility, exported) = visibility_of(item, out.source());
            out.set_visibility(index, visibility, exported);
            out.get_mut(index).signature = header_signature(item, item, out.source());
            pending.push(PendingImpl {
                index,
                type_name: type_name.to_string(),
            });

            out.enter(index);
            if let Some(fn_body) = item.child_by_field_name("body") {
                self.walk(fn_body, out, pending);
            }
            out.leave();
        }
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserStrategy for RustParser {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_rust::LANGUAGE.into())
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &str) -> Vec<CodeSymbol> {
        let mut out = SymbolCollector::new(file, source, Language::Rust, "::");
        let mut pending = Vec::new();
        self.walk(tree.root_node(), &mut out, &mut pending);

        for PendingImpl { index, type_name } in pending {
            out.adopt(index, &type_name);
        }
        out.finish()
    }

    fn extract_class_relationships(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        match node.kind() {
            // impl Trait for Type
            "impl_item" => {
                let Some(trait_node) = node.child_by_field_name("trait") else {
                    return;
                };
                let implementor = node
                    .child_by_field_name("type")
                    .and_then(|ty| simple_name(ty, ctx.source))
                    .and_then(|name| {
                        ctx.symbols
                            .iter()
                            .copied()
                            .find(|s| s.name == name && s.parent.is_none() && !s.kind.is_callable())
                    });

                if let (Some(implementor), Some(trait_name)) =
                    (implementor, simple_name(trait_node, ctx.source))
                {
                    emit(Reference::new(
                        implementor,
                        trait_name,
                        RelationshipKind::Implements,
                        trait_node,
                    ));
                }
            }
            // trait Sub: Super
            "trait_item" => {
                let (Some(sub), Some(bounds)) =
                    (ctx.declared_at(node), node.child_by_field_name("bounds"))
                else {
                    return;
                };
                for bound in named_children(bounds) {
                    if bound.kind() == "lifetime" {
                        continue;
                    }
                    if let Some(name) = simple_name(bound, ctx.source) {
                        emit(Reference::new(sub, name, RelationshipKind::Inherits, bound));
                    }
                }
            }
            _ => {}
        }
    }

    fn extract_instantiations(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        if node.kind() != "struct_expression" {
            return;
        }
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| simple_name(n, ctx.source))
        else {
            return;
        };
        if let Some(reference) =
            ctx.reference_from_enclosing(node, name, RelationshipKind::Instantiates, false)
        {
            emit(reference);
        }
    }

    fn extract_imports(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "use_declaration" {
            return;
        }
        let Some(argument) = node.child_by_field_name("argument") else {
            return;
        };

        let mut names = Vec::new();
        collect_use_names(argument, ctx.source, &mut names);
        for name in names {
            ctx.emit_import(node, name, emit);
        }
    }

    fn extract_calls(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(mut function) = node.child_by_field_name("function") else {
            return;
        };
        if function.kind() == "generic_function" {
            match function.child_by_field_name("function") {
                Some(inner) => function = inner,
                None => return,
            }
        }

        let (name, inferred) = match function.kind() {
            "identifier" => (ctx.text(function), false),
            "scoped_identifier" => match function.child_by_field_name("name") {
                Some(name) => (ctx.text(name), true),
                None => return,
            },
            "field_expression" => match function.child_by_field_name("field") {
                Some(field) => (ctx.text(field), true),
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

/// Last path segment of every name a `use` tree brings into scope.
fn collect_use_names<'s>(node: Node, source: &'s str, names: &mut Vec<&'s str>) {
    match node.kind() {
        "identifier" | "type_identifier" => names.push(super::node_text(node, source)),
        "scoped_identifier" => {
            if let Some(name) = node.child_by_field_name("name") {
                collect_use_names(name, source, names);
            }
        }
        "use_as_clause" => {
            if let Some(path) = node.child_by_field_name("path") {
                collect_use_names(path, source, names);
            }
        }
        "scoped_use_list" => {
            if let Some(list) = node.child_by_field_name("list") {
                collect_use_names(list, source, names);
            }
        }
        "use_list" => {
            for child in named_children(node) {
                collect_use_names(child, source, names);
            }
        }
        _ => {}
    }
}

fn visibility_of(node: Node, source: &str) -> (Visibility, bool) {
    let modifier = children(node)
        .into_iter()
        .find(|c| c.kind() == "visibility_modifier")
        .map(|m| super::node_text(m, source));

    match modifier {
        Some("pub") => (Visibility::Public, true),
        Some(_) => (Visibility::Internal, false),
        None => (Visibility::Private, false),
    }
}
