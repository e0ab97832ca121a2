// TypeScript, TSX and JavaScript extraction

use tree_sitter::{Node, Tree};

use super::{
    children, header_signature, named_children, signature_between, simple_name, stereotype,
    ExtractionContext, ParserStrategy, Reference, SymbolCollector,
};
use crate::model::{CodeSymbol, Language, RelationshipKind, SymbolKind, Visibility};

/// Member calls that register an event handler.
const LISTENER_METHODS: &[&str] = &["on", "once", "addEventListener", "addListener", "subscribe"];

/// One strategy for the ECMAScript family; the dialect picks the grammar.
pub struct TypeScriptParser {
    language: Language,
}

impl TypeScriptParser {
    pub fn typescript() -> Self {
        Self {
            language: Language::TypeScript,
        }
    }

    pub fn tsx() -> Self {
        Self {
            language: Language::Tsx,
        }
    }

    pub fn javascript() -> Self {
        Self {
            language: Language::JavaScript,
        }
    }

    fn walk(&self, node: Node, out: &mut SymbolCollector) {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                if self.extract_class(node, out).is_none() {
                    self.walk_children(node, out);
                }
            }
            "interface_declaration" => {
                self.extract_container(node, out, SymbolKind::Interface);
            }
            "enum_declaration" => {
                self.extract_container(node, out, SymbolKind::Enum);
            }
            "type_alias_declaration" => {
                self.extract_container(node, out, SymbolKind::Type);
            }
            "function_declaration" | "generator_function_declaration" => {
                if self.extract_function(node, out).is_none() {
                    self.walk_children(node, out);
                }
            }
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                if self.extract_method(node, out).is_none() {
                    self.walk_children(node, out);
                }
            }
            "variable_declarator" => {
                if self.extract_declarator(node, out).is_none() {
                    self.walk_children(node, out);
                }
            }
            _ => self.walk_children(node, out),
        }
    }

    fn walk_children(&self, node: Node, out: &mut SymbolCollector) {
        for child in children(node) {
            self.walk(child, out);
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
        let decorators = decorator_names(node, out.source());

        let mut kind = if node.kind() == "abstract_class_declaration" {
            SymbolKind::AbstractClass
        } else {
            SymbolKind::Class
        };
        let mut layer = None;
        if let Some((stereo_kind, stereo_layer)) = decorators.iter().find_map(|d| stereotype(d)) {
            kind = stereo_kind;
            layer = Some(stereo_layer.to_string());
        }

        let index = out.declare(node, name, kind);
        out.set_visibility(index, Visibility::Public, is_exported(node));

        let header = first_keyword(node).unwrap_or(name_node);
        let signature = header_signature(node, header, out.source());
        let symbol = out.get_mut(index);
        symbol.signature = signature;
        symbol.tags = decorators;
        symbol.layer = layer;

        self.walk_body(node, index, out);
        Some(())
    }

    fn extract_container(&self, node: Node, out: &mut SymbolCollector, kind: SymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return self.walk_children(node, out);
        };

        let index = out.declare(node, out.text(name_node), kind);
        out.set_visibility(index, Visibility::Public, is_exported(node));
        self.walk_body(node, index, out);
    }

    fn extract_function(&self, node: Node, out: &mut SymbolCollector) -> Option<()> {
        let name_node = node.child_by_field_name("name")?;

        let index = out.declare(node, out.text(name_node), SymbolKind::Function);
        out.set_visibility(index, Visibility::Public, is_exported(node));
        out.get_mut(index).signature = header_signature(node, name_node, out.source());

        self.walk_body(node, index, out);
        Some(())
    }

    fn extract_method(&self, node: Node, out: &mut SymbolCollector) -> Option<()> {
        let name_node = node.child_by_field_name("name")?;
        let name = out.text(name_node);
        let kind = if name == "constructor" {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };

        let visibility = children(node)
            .into_iter()
            .find(|c| c.kind() == "accessibility_modifier")
            .map(|m| match out.text(m) {
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => Visibility::Public,
            })
            .unwrap_or(if name_node.kind() == "private_property_identifier" {
                Visibility::Private
            } else {
                Visibility::Public
            });

        let index = out.declare(node, name, kind);
        let signature = header_signature(node, name_node, out.source());
        let tags = decorator_names(node, out.source());
        let symbol = out.get_mut(index);
        symbol.visibility = Some(visibility);
        symbol.signature = signature;
        symbol.tags = tags;

        self.walk_body(node, index, out);
        Some(())
    }

    /// `const name = (..) => ..` and `const name = function (..) {..}`.
    fn extract_declarator(&self, node: Node, out: &mut SymbolCollector) -> Option<()> {
        let name_node = node.child_by_field_name("name")?;
        if name_node.kind() != "identifier" {
            return None;
        }
        let value = node.child_by_field_name("value")?;
        let kind = match value.kind() {
            "arrow_function" => SymbolKind::Lambda,
            "function_expression" | "function" | "generator_function" => SymbolKind::Function,
            _ => return None,
        };

        let name = out.text(name_node);
        let params = value
            .child_by_field_name("parameters")
            .map(|p| out.text(p).to_string())
            .or_else(|| {
                value
                    .child_by_field_name("parameter")
                    .map(|p| format!("({})", out.text(p)))
            })
            .unwrap_or_else(|| "()".to_string());
        let return_type = value
            .child_by_field_name("return_type")
            .map(|r| out.text(r))
            .unwrap_or("");
        let signature = format!("{}{}{}", name, params, return_type);

        let index = out.declare(node, name, kind);
        out.set_visibility(index, Visibility::Public, is_exported(node));
        out.get_mut(index).signature = signature_between(&signature, 0, signature.len());

        self.walk_body(value, index, out);
        Some(())
    }
}

impl ParserStrategy for TypeScriptParser {
    fn language(&self) -> Language {
        self.language
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        let grammar = match self.language {
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        };
        Some(grammar)
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &str) -> Vec<CodeSymbol> {
        let mut out = SymbolCollector::new(file, source, self.language, ".");
        self.walk(tree.root_node(), &mut out);
        out.finish()
    }

    fn extract_class_relationships(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                let Some(class) = ctx.declared_at(node) else {
                    return;
                };
                let heritage = children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "class_heritage");

                for clause in heritage.flat_map(named_children) {
                    match clause.kind() {
                        "extends_clause" => {
                            for value in named_children(clause) {
                                if let Some(base) = heritage_name(value, ctx) {
                                    emit(Reference::new(class, base, RelationshipKind::Inherits, value));
                                }
                            }
                        }
                        "implements_clause" => {
                            for ty in named_children(clause) {
                                if let Some(iface) = heritage_name(ty, ctx) {
                                    emit(Reference::new(class, iface, RelationshipKind::Implements, ty));
                                }
                            }
                        }
                        // JavaScript: `class A extends B` has no clause node
                        _ => {
                            if let Some(base) = heritage_name(clause, ctx) {
                                emit(Reference::new(class, base, RelationshipKind::Inherits, clause));
                            }
                        }
                    }
                }
            }
            "interface_declaration" => {
                let Some(iface) = ctx.declared_at(node) else {
                    return;
                };
                let extends = children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "extends_type_clause");

                for ty in extends.flat_map(named_children) {
                    if let Some(base) = heritage_name(ty, ctx) {
                        emit(Reference::new(iface, base, RelationshipKind::Inherits, ty));
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
        if node.kind() != "new_expression" {
            return;
        }
        let Some(constructor) = node.child_by_field_name("constructor") else {
            return;
        };
        if let Some(name) = simple_name(constructor, ctx.source) {
            if let Some(reference) =
                ctx.reference_from_enclosing(node, name, RelationshipKind::Instantiates, false)
            {
                emit(reference);
            }
        }
    }

    fn extract_imports(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "import_statement" {
            return;
        }
        let clauses = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "import_clause");

        for item in clauses.flat_map(named_children) {
            match item.kind() {
                "identifier" => ctx.emit_import(item, ctx.text(item), emit),
                "named_imports" => {
                    for spec in named_children(item) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(name) = spec.child_by_field_name("name") {
                            ctx.emit_import(spec, ctx.text(name), emit);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn extract_calls(&self, node: Node, ctx: &ExtractionContext, emit: &mut dyn FnMut(Reference)) {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };

        let (name, inferred) = match function.kind() {
            "identifier" => (ctx.text(function), false),
            "member_expression" => match function.child_by_field_name("property") {
                Some(property) => (ctx.text(property), true),
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

    fn extract_event_listeners(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(method) = node
            .child_by_field_name("function")
            .filter(|f| f.kind() == "member_expression")
            .and_then(|f| f.child_by_field_name("property"))
        else {
            return;
        };
        if !LISTENER_METHODS.contains(&ctx.text(method)) {
            return;
        }

        let handler = node
            .child_by_field_name("arguments")
            .and_then(|args| named_children(args).into_iter().last());
        let Some(handler) = handler else {
            return;
        };

        let name = match handler.kind() {
            "identifier" => ctx.text(handler),
            "member_expression" => match handler.child_by_field_name("property") {
                Some(property) => ctx.text(property),
                None => return,
            },
            _ => return,
        };

        if let Some(reference) = ctx.reference_from_enclosing(
            node,
            name,
            RelationshipKind::Other("listens".to_string()),
            false,
        ) {
            emit(reference);
        }
    }
}

fn heritage_name<'a>(node: Node, ctx: &ExtractionContext<'a>) -> Option<&'a str> {
    if node.kind() == "type_arguments" {
        return None;
    }
    simple_name(node, ctx.source)
}

/// First child that is not a decorator, i.e. the declaration keyword.
fn first_keyword(node: Node) -> Option<Node> {
    children(node).into_iter().find(|c| c.kind() != "decorator")
}

fn is_exported(node: Node) -> bool {
    let mut current = node.parent();
    for _ in 0..2 {
        match current {
            Some(parent) if parent.kind() == "export_statement" => return true,
            Some(parent) => current = parent.parent(),
            None => return false,
        }
    }
    false
}

/// Decorator names on a declaration, including those written before `export`.
fn decorator_names(node: Node, source: &str) -> Vec<String> {
    let mut decorators: Vec<Node> = children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .collect();
    if let Some(parent) = node.parent().filter(|p| p.kind() == "export_statement") {
        decorators.extend(children(parent).into_iter().filter(|c| c.kind() == "decorator"));
    }

    decorators
        .into_iter()
        .filter_map(|d| d.named_child(0))
        .filter_map(|expr| simple_name(expr, source))
        .map(str::to_string)
        .collect()
}
