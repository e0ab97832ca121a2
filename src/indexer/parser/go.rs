// Go extraction

use tree_sitter::{Node, Tree};

use super::{
    children, header_signature, named_children, simple_name, ExtractionContext, ParserStrategy,
    Reference, SymbolCollector,
};
use crate::model::{CodeSymbol, Language, RelationshipKind, SymbolKind, Visibility};

pub struct GoParser;

impl GoParser {
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, node: Node, out: &mut SymbolCollector, methods: &mut Vec<(usize, String)>) {
        match node.kind() {
            "function_declaration" => {
                if let Some(index) = self.declare_callable(node, out, SymbolKind::Function) {
                    self.walk_body(node, index, out, methods);
                }
            }
            "method_declaration" => {
                if let Some(index) = self.declare_callable(node, out, SymbolKind::Method) {
                    if let Some(receiver) = receiver_type(node, out.source()) {
                        methods.push((index, receiver.to_string()));
                    }
                    self.walk_body(node, index, out, methods);
                }
            }
            "type_spec" | "type_alias" => self.extract_type(node, out),
            _ => {
                for child in children(node) {
                    self.walk(child, out, methods);
                }
            }
        }
    }

    fn walk_body(
        &self,
        node: Node,
        index: usize,
        out: &mut SymbolCollector,
        methods: &mut Vec<(usize, String)>,
    ) {
        out.enter(index);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, out, methods);
        }
        out.leave();
    }

    /// Signature starts at the name so a method's receiver is left out.
    fn declare_callable(&self, node: Node, out: &mut SymbolCollector, kind: SymbolKind) -> Option<usize> {
        let name_node = node.child_by_field_name("name")?;
        let name = out.text(name_node);

        let index = out.declare(node, name, kind);
        let (visibility, exported) = visibility_of(name);
        out.set_visibility(index, visibility, exported);
        out.get_mut(index).signature = header_signature(node, name_node, out.source());
        Some(index)
    }

    fn extract_type(&self, node: Node, out: &mut SymbolCollector) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = out.text(name_node);
        let kind = match node.child_by_field_name("type").map(|t| t.kind()) {
            Some("struct_type") => SymbolKind::Class,
            Some("interface_type") => SymbolKind::Interface,
            _ => SymbolKind::Type,
        };

        let index = out.declare(node, name, kind);
        let (visibility, exported) = visibility_of(name);
        out.set_visibility(index, visibility, exported);

        let header = node.child_by_field_name("type").map(|t| {
            let shape = match t.kind() {
                "struct_type" => "struct",
                "interface_type" => "interface",
                _ => out.text(t),
            };
            let op = if node.kind() == "type_alias" { " = " } else { " " };
            format!("type {}{}{}", name, op, shape)
        });
        out.get_mut(index).signature = header;
    }
}

impl Default for GoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserStrategy for GoParser {
    fn language(&self) -> Language {
        Language::Go
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_go::LANGUAGE.into())
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &str) -> Vec<CodeSymbol> {
        let mut out = SymbolCollector::new(file, source, Language::Go, ".");
        let mut methods = Vec::new();
        self.walk(tree.root_node(), &mut out, &mut methods);

        for (index, receiver) in methods {
            out.adopt(index, &receiver);
        }
        out.finish()
    }

    /// Struct and interface embedding.
    fn extract_class_relationships(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        if node.kind() != "type_spec" {
            return;
        }
        let (Some(owner), Some(ty)) = (ctx.declared_at(node), node.child_by_field_name("type")) else {
            return;
        };

        let embedded: Vec<Node> = match ty.kind() {
            "struct_type" => named_children(ty)
                .into_iter()
                .filter(|c| c.kind() == "field_declaration_list")
                .flat_map(named_children)
                .filter(|f| f.kind() == "field_declaration" && f.child_by_field_name("name").is_none())
                .filter_map(|f| f.child_by_field_name("type"))
                .collect(),
            "interface_type" => named_children(ty)
                .into_iter()
                .filter(|c| matches!(c.kind(), "type_elem" | "constraint_elem" | "type_identifier" | "qualified_type"))
                .collect(),
            _ => Vec::new(),
        };

        for base in embedded {
            if let Some(name) = simple_name(base, ctx.source) {
                emit(Reference::new(owner, name, RelationshipKind::Inherits, base));
            }
        }
    }

    fn extract_instantiations(
        &self,
        node: Node,
        ctx: &ExtractionContext,
        emit: &mut dyn FnMut(Reference),
    ) {
        if node.kind() != "composite_literal" {
            return;
        }
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        if !matches!(ty.kind(), "type_identifier" | "qualified_type" | "generic_type") {
            return;
        }
        if let Some(name) = simple_name(ty, ctx.source) {
            if let Some(reference) =
                ctx.reference_from_enclosing(node, name, RelationshipKind::Instantiates, false)
            {
                emit(reference);
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
            "selector_expression" => match function.child_by_field_name("field") {
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

fn receiver_type<'s>(node: Node, source: &'s str) -> Option<&'s str> {
    let receiver = node.child_by_field_name("receiver")?;
    let param = named_children(receiver)
        .into_iter()
        .find(|c| c.kind() == "parameter_declaration")?;
    let ty = param.child_by_field_name("type")?;
    simple_name(ty, source)
}

/// Capitalized names are exported from their package.
fn visibility_of(name: &str) -> (Visibility, bool) {
    if name.chars().next().is_some_and(char::is_uppercase) {
        (Visibility::Public, true)
    } else {
        (Visibility::Internal, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package shapes

import "fmt"

type Shape interface {
	Stringer
	Area() float64
}

type Base struct {
	id int
}

type Circle struct {
	Base
	radius float64
}

type Radius = float64

func NewCircle(r float64) *Circle {
	return &Circle{radius: r}
}

func (c *Circle) Area() float64 {
	return square(c.radius) * 3.14
}

func (c *Circle) String() string {
	return fmt.Sprintf("circle %f", c.Area())
}

func square(x float64) float64 {
	return x * x
}
"#;

    fn parse() -> (Tree, Vec<CodeSymbol>) {
        let parsed = GoParser::new().parse(SOURCE, "shapes/circle.go").unwrap();
        (parsed.tree.unwrap(), parsed.symbols)
    }

    #[test]
    fn test_symbols() {
        let (_, symbols) = parse();
        let find = |name: &str| symbols.iter().find(|s| s.name == name).unwrap();

        assert_eq!(find("Shape").kind, SymbolKind::Interface);
        assert_eq!(find("Radius").kind, SymbolKind::Type);

        let circle = find("Circle");
        assert_eq!(circle.kind, SymbolKind::Class);

        let area = find("Area");
        assert_eq!(area.kind, SymbolKind::Method);
        assert_eq!(area.parent.as_deref(), Some(circle.id.as_str()));
        assert_eq!(area.signature.as_deref(), Some("Area() float64"));
        assert_eq!(area.exported, Some(true));

        let square = find("square");
        assert_eq!(square.kind, SymbolKind::Function);
        assert_eq!(square.visibility, Some(Visibility::Internal));
        assert_eq!(square.exported, Some(false));
    }

    #[test]
    fn test_references() {
        let parser = GoParser::new();
        let (tree, symbols) = parse();
        let refs: Vec<&CodeSymbol> = symbols.iter().collect();
        let ctx = ExtractionContext::new("shapes/circle.go", SOURCE, &refs);

        let mut found = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            let mut emit = |r: Reference| found.push(r);
            parser.extract_class_relationships(node, &ctx, &mut emit);
            parser.extract_instantiations(node, &ctx, &mut emit);
            parser.extract_calls(node, &ctx, &mut emit);
            stack.extend(named_children(node));
        }

        let has = |target: &str, kind: RelationshipKind| {
            found.iter().any(|r| r.target_name == target && r.kind == kind)
        };
        assert!(has("Base", RelationshipKind::Inherits));
        assert!(has("Circle", RelationshipKind::Instantiates));
        assert!(has("square", RelationshipKind::Calls));
        assert!(has("Sprintf", RelationshipKind::Calls));

        let area_call = found.iter().find(|r| r.target_name == "Area").unwrap();
        assert!(area_call.inferred);
    }
}
