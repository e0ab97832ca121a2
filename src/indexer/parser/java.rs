// Java extraction

use tree_sitter::{Node, Tree};

use super::{
    children, header_signature, named_children, simple_name, stereotype, ExtractionContext,
    ParserStrategy, Reference, SymbolCollector,
};
use crate::model::{CodeSymbol, Language, RelationshipKind, SymbolKind, Visibility};

pub struct JavaParser;

/// Modifier keywords and annotation names on a declaration.
struct Modifiers {
    keywords: Vec<String>,
    annotations: Vec<String>,
}

impl Modifiers {
    fn of(node: Node, source: &str) -> Self {
        let mut modifiers = Modifiers {
            keywords: Vec::new(),
            annotations: Vec::new(),
        };
        let Some(list) = children(node).into_iter().find(|c| c.kind() == "modifiers") else {
            return modifiers;
        };

        for item in children(list) {
            match item.kind() {
                "marker_annotation" | "annotation" => {
                    if let Some(name) = item
                        .child_by_field_name("name")
                        .and_then(|n| simple_name(n, source))
                    {
                        modifiers.annotations.push(name.to_string());
                    }
                }
                _ => modifiers
                    .keywords
                    .push(super::node_text(item, source).to_string()),
            }
        }
        modifiers
    }

    fn has(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    fn visibility(&self) -> Visibility {
        if self.has("public") {
            Visibility::Public
        } else if self.has("protected") {
            Visibility::Protected
        } else if self.has("private") {
            Visibility::Private
        } else {
            Visibility::Internal
        }
    }
}

impl JavaParser {
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, node: Node, out: &mut SymbolCollector) {
        match node.kind() {
            "class_declaration" | "record_declaration" => self.extract_type(node, out, SymbolKind::Class),
            "interface_declaration" | "annotation_type_declaration" => {
                self.extract_type(node, out, SymbolKind::Interface)
            }
            "enum_declaration" => self.extract_type(node, out, SymbolKind::Enum),
            "method_declaration" => self.extract_callable(node, out, SymbolKind::Method),
            "constructor_declaration" | "compact_constructor_declaration" => {
                self.extract_callable(node, out, SymbolKind::Constructor)
            }
            _ => {
                for child in children(node) {
                    self.walk(child, out);
                }
            }
        }
    }

    fn extract_type(&self, node: Node, out: &mut SymbolCollector, base_kind: SymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let modifiers = Modifiers::of(node, out.source());

        let mut kind = base_kind;
        let mut layer = None;
        if base_kind == SymbolKind::Class && modifiers.has("abstract") {
            kind = SymbolKind::AbstractClass;
        }
        if let Some((stereo_kind, stereo_layer)) =
            modifiers.annotations.iter().find_map(|a| stereotype(a))
        {
            kind = stereo_kind;
            layer = Some(stereo_layer.to_string());
        }

        let index = out.declare(node, out.text(name_node), kind);
        let visibility = modifiers.visibility();
        out.set_visibility(index, visibility, visibility == Visibility::Public);

        // Start after annotations and modifiers
        let header = children(node)
            .into_iter()
            .find(|c| c.kind() != "modifiers")
            .unwrap_or(name_node);
        let signature = header_signature(node, header, out.source());
        let symbol = out.get_mut(index);
        symbol.signature = signature;
        symbol.tags = modifiers.annotations;
        symbol.layer = layer;

        out.enter(index);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, out);
        }
        out.leave();
    }

    fn extract_callable(&self, node: Node, out: &mut SymbolCollector, kind: SymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let modifiers = Modifiers::of(node, out.source());

        let index = out.declare(node, out.text(name_node), kind);
        let visibility = modifiers.visibility();
        out.set_visibility(index, visibility, visibility == Visibility::Public);

        let from = node.child_by_field_name("type").unwrap_or(name_node);
        let signature = header_signature(node, from, out.source());
        let symbol = out.get_mut(index);
        symbol.signature = signature;
        symbol.tags = modifiers.annotations;

        // Local and anonymous classes
        out.enter(index);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, out);
        }
        out.leave();
    }
}

impl Default for JavaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserStrategy for JavaParser {
    fn language(&self) -> Language {
        Language::Java
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_java::LANGUAGE.into())
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &str) -> Vec<CodeSymbol> {
        let mut out = SymbolCollector::new(file, source, Language::Java, ".");
        self.walk(tree.root_node(), &mut out);
        out.finish()
    }

    fn extract_class_relationships(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        let (supers, interfaces): (Vec<Node>, Vec<Node>) = match node.kind() {
            "class_declaration" | "enum_declaration" | "record_declaration" => {
                let supers = node
                    .child_by_field_name("superclass")
                    .map(named_children)
                    .unwrap_or_default();
                let interfaces = node
                    .child_by_field_name("interfaces")
                    .map(type_list_members)
                    .unwrap_or_default();
                (supers, interfaces)
            }
            "interface_declaration" => {
                let extends = children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "extends_interfaces")
                    .flat_map(type_list_members)
                    .collect();
                (extends, Vec::new())
            }
            _ => return,
        };
        let Some(owner) = ctx.declared_at(node) else {
            return;
        };

        for ty in supers {
            if let Some(name) = simple_name(ty, ctx.source) {
                emit(Reference::new(owner, name, RelationshipKind::Inherits, ty));
            }
        }
        for ty in interfaces {
            if let Some(name) = simple_name(ty, ctx.source) {
                emit(Reference::new(owner, name, RelationshipKind::Implements, ty));
            }
        }
    }

    fn extract_instantiations(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        if node.kind() != "object_creation_expression" {
            return;
        }
        let Some(name) = node
            .child_by_field_name("type")
            .and_then(|ty| simple_name(ty, ctx.source))
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
        if node.kind() != "import_declaration" {
            return;
        }
        // Wildcard imports name no symbol
        if children(node).iter().any(|c| c.kind() == "asterisk") {
            return;
        }
        let Some(path) = named_children(node)
            .into_iter()
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        else {
            return;
        };
        if let Some(name) = simple_name(path, ctx.source) {
            ctx.emit_import(node, name, emit);
        }
    }

    fn extract_calls(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "method_invocation" {
            return;
        }
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let inferred = node.child_by_field_name("object").is_some();

        if let Some(reference) =
            ctx.reference_from_enclosing(node, ctx.text(name), RelationshipKind::Calls, inferred)
        {
            emit(reference);
        }
    }
}

/// Types listed in `implements A, B` or `extends A, B`.
fn type_list_members(node: Node) -> Vec<Node> {
    named_children(node)
        .into_iter()
        .flat_map(|child| {
            if child.kind() == "type_list" {
                named_children(child)
            } else {
                vec![child]
            }
        })
        .collect()
}
