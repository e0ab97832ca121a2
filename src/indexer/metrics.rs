// Static code metrics: lines of code, parameter count, cyclomatic complexity

use std::collections::HashMap;

use tree_sitter::Node;

use super::coverage::CoverageReport;
use super::parser::{line_range, named_children, node_text};
use super::relationships::SourceTree;
use crate::model::{CodeSymbol, Language, SymbolMetrics};

/// Node kinds that open a new path, per language.
fn branch_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => &[
            "if_statement",
            "for_statement",
            "for_in_statement",
            "while_statement",
            "do_statement",
            "catch_clause",
            "ternary_expression",
            "switch_case",
        ],
        Language::Python => &[
            "if_statement",
            "elif_clause",
            "for_statement",
            "while_statement",
            "except_clause",
            "conditional_expression",
            "case_clause",
        ],
        Language::Rust => &[
            "if_expression",
            "for_expression",
            "while_expression",
            "loop_expression",
            "match_arm",
        ],
        Language::Go => &[
            "if_statement",
            "for_statement",
            "expression_case",
            "type_case",
            "communication_case",
        ],
        Language::Java => &[
            "if_statement",
            "for_statement",
            "enhanced_for_statement",
            "while_statement",
            "do_statement",
            "catch_clause",
            "ternary_expression",
        ],
        Language::Unknown => &[],
    }
}

/// Short-circuit operators; other binary operators add no path.
const LOGICAL_OPERATORS: &[&str] = &["&&", "||", "??"];

pub fn lines_of_code(symbol: &CodeSymbol) -> u32 {
    symbol.line_span() + 1
}

/// Entries in the first parenthesized list of `signature`, splitting on
/// top-level commas only.
pub fn parameter_count(signature: &str) -> u32 {
    let Some(open) = signature.find('(') else {
        return 0;
    };

    let mut depth = 0i32;
    let mut count = 0u32;
    let mut current_has_text = false;
    let mut previous = '(';

    for c in signature[open + 1..].chars() {
        let arrow = c == '>' && matches!(previous, '-' | '=');
        previous = c;
        match c {
            '(' | '<' | '[' | '{' => {
                depth += 1;
                current_has_text = true;
            }
            ')' if depth == 0 => break,
            ')' | '>' | ']' | '}' if !arrow => {
                depth -= 1;
                current_has_text = true;
            }
            ',' if depth == 0 => {
                if current_has_text {
                    count += 1;
                }
                current_has_text = false;
            }
            c if c.is_whitespace() => {}
            _ => current_has_text = true,
        }
    }
    if current_has_text {
        count += 1;
    }
    count
}

/// `1 + branches` within `node`'s subtree.
pub fn cyclomatic_complexity(node: Node, source: &str, language: Language) -> u32 {
    let kinds = branch_kinds(language);
    let mut complexity = 1;

    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if is_branch(current, source, language, kinds) {
            complexity += 1;
        }
        stack.extend(named_children(current));
    }
    complexity
}

fn is_branch(node: Node, source: &str, language: Language, kinds: &[&str]) -> bool {
    let kind = node.kind();
    if kinds.contains(&kind) {
        return true;
    }

    match kind {
        "binary_expression" => node
            .child_by_field_name("operator")
            .is_some_and(|op| LOGICAL_OPERATORS.contains(&node_text(op, source))),
        "boolean_operator" => language == Language::Python,
        // `case X:` but not `default:`
        "switch_label" => language == Language::Java && node_text(node, source).starts_with("case"),
        _ => false,
    }
}

/// The outermost node spanning exactly `start..=end` (1-based lines).
pub fn find_node_for_lines(root: Node, start: u32, end: u32) -> Option<Node> {
    let mut node = root;
    loop {
        let (node_start, node_end) = line_range(node);
        if node_start == start && node_end == end {
            return Some(node);
        }

        let mut cursor = node.walk();
        let next = node.children(&mut cursor).find(|child| {
            let (child_start, child_end) = line_range(*child);
            child_start <= start && end <= child_end
        });
        node = next?;
    }
}

/// Fill in missing metrics for every symbol and, when a report is given,
/// attach coverage to callables.
///
/// Static metrics already present on a symbol (e.g. from a cached record)
/// are kept. Coverage is not: it always reflects this run's report.
pub fn collect_metrics(
    symbols: &mut [CodeSymbol],
    trees: &[SourceTree],
    coverage: Option<&CoverageReport>,
) {
    let trees_by_file: HashMap<&str, &SourceTree> =
        trees.iter().map(|t| (t.rel_path.as_str(), t)).collect();

    for symbol in symbols.iter_mut() {
        let mut metrics = symbol.metrics.take().unwrap_or_default();
        metrics.test_coverage = None;

        if metrics.lines_of_code.is_none() {
            metrics.lines_of_code = Some(lines_of_code(symbol));
        }
        if metrics.parameter_count.is_none() && symbol.kind.is_callable() {
            metrics.parameter_count =
                Some(symbol.signature.as_deref().map(parameter_count).unwrap_or(0));
        }
        if metrics.cyclomatic_complexity.is_none() {
            let complexity = trees_by_file
                .get(symbol.file.as_str())
                .and_then(|unit| {
                    find_node_for_lines(unit.tree.root_node(), symbol.start_line, symbol.end_line)
                        .map(|node| cyclomatic_complexity(node, &unit.source, unit.language))
                })
                .unwrap_or(1);
            metrics.cyclomatic_complexity = Some(complexity);
        }

        symbol.metrics = Some(metrics);
    }

    if let Some(report) = coverage {
        enrich_coverage(symbols, report);
    }
}

/// Attach coverage to callable symbols without touching other metrics.
/// Returns how many symbols were enriched.
pub fn enrich_coverage(symbols: &mut [CodeSymbol], report: &CoverageReport) -> usize {
    let mut enriched = 0;

    for symbol in symbols.iter_mut().filter(|s| s.kind.is_callable()) {
        let Some(file) = report.file(&symbol.file) else {
            continue;
        };
        if let Some(coverage) = file.coverage_for(symbol) {
            symbol
                .metrics
                .get_or_insert_with(SymbolMetrics::default)
                .test_coverage = Some(coverage);
            enriched += 1;
        }
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::coverage::{FileCoverage, FunctionCoverage};
    use crate::indexer::parser::{ParserRegistry, ParserStrategy};
    use crate::model::{SymbolKind, TestCoverage};

    fn complexity_of(rel_path: &str, source: &str, name: &str) -> u32 {
        let language = Language::from_path(rel_path);
        let parsed = ParserRegistry::new()
            .get(language)
            .parse(source, rel_path)
            .unwrap();
        let tree = parsed.tree.unwrap();
        let symbol = parsed.symbols.iter().find(|s| s.name == name).unwrap();

        let node = find_node_for_lines(tree.root_node(), symbol.start_line, symbol.end_line).unwrap();
        cyclomatic_complexity(node, source, language)
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(parameter_count("foo(x, y)"), 2);
        assert_eq!(parameter_count("foo()"), 0);
        assert_eq!(parameter_count("foo"), 0);
        assert_eq!(parameter_count("foo(a: Map<string, number>, b: [number, number])"), 2);
        assert_eq!(parameter_count("fn new(v: Vec<(u8, u8)>) -> Self"), 1);
        assert_eq!(parameter_count("def f(a, b=(1, 2), *args, **kwargs)"), 4);
        assert_eq!(parameter_count("foo(a, b,)"), 2);
        assert_eq!(parameter_count("foo({ a, b }: Props)"), 1);
        assert_eq!(parameter_count("on(cb: (e: Event) => void, once: boolean)"), 2);
    }

    #[test]
    fn test_baseline_complexity() {
        assert_eq!(complexity_of("a.ts", "function f() { return 1; }\n", "f"), 1);
    }

    #[test]
    fn test_each_branch_adds_one() {
        let source = r#"function f(x) {
  if (x) { x++; }
  for (let i = 0; i < 3; i++) {}
  while (x) { x--; }
  try { g(); } catch (e) {}
  const y = x ? 1 : 2;
  switch (x) {
    case 1: break;
    case 2: break;
    default: break;
  }
}
"#;
        // if, for, while, catch, ternary, two cases
        assert_eq!(complexity_of("a.ts", source, "f"), 8);
    }

    #[test]
    fn test_only_logical_operators_count() {
        let logical = "function f(a, b) {\n  return a && b;\n}\n";
        let arithmetic = "function f(a, b) {\n  return a + b;\n}\n";
        let nullish = "function f(a, b) {\n  return (a ?? b) || a;\n}\n";
        assert_eq!(complexity_of("a.ts", logical, "f"), 2);
        assert_eq!(complexity_of("a.ts", arithmetic, "f"), 1);
        assert_eq!(complexity_of("a.ts", nullish, "f"), 3);
    }

    #[test]
    fn test_python_complexity() {
        let source = "def f(x):\n    if x and x > 1:\n        return 1\n    elif x:\n        return 2\n    return 3 if x else 4\n";
        // if, and, elif, conditional expression
        assert_eq!(complexity_of("a.py", source, "f"), 5);
    }

    #[test]
    fn test_rust_complexity() {
        let source = "fn f(x: Option<u8>) -> u8 {\n    match x {\n        Some(v) if v > 1 => v,\n        Some(_) => 1,\n        None => 0,\n    }\n}\n";
        assert_eq!(complexity_of("a.rs", source, "f"), 4);
    }

    #[test]
    fn test_java_default_label_does_not_count() {
        let source = "class A {\n  int f(int x) {\n    switch (x) {\n      case 1: return 1;\n      default: return 0;\n    }\n  }\n}\n";
        assert_eq!(complexity_of("A.java", source, "f"), 2);
    }

    #[test]
    fn test_go_complexity() {
        let source = "package main\n\nfunc f(x int, ok bool) int {\n\tswitch x {\n\tcase 1:\n\t\treturn 1\n\tcase 2, 3:\n\t\treturn 2\n\tdefault:\n\t\treturn 0\n\t}\n\tif x > 0 && ok {\n\t\treturn 4\n\t}\n\treturn 5\n}\n";
        // two cases, if, && (default adds nothing)
        assert_eq!(complexity_of("main.go", source, "f"), 5);
    }

    #[test]
    fn test_inverted_range_does_not_overflow() {
        let mut symbols = vec![CodeSymbol::new("b.ts", "bar", SymbolKind::Function, 5, 1)];
        collect_metrics(&mut symbols, &[], None);
        assert_eq!(symbols[0].metrics.as_ref().unwrap().lines_of_code, Some(1));
    }

    #[test]
    fn test_collect_metrics_defaults_without_tree() {
        let mut symbol = CodeSymbol::new("a.ts", "foo", SymbolKind::Function, 3, 7);
        symbol.signature = Some("foo(a, b, c)".to_string());
        let mut symbols = vec![symbol];

        collect_metrics(&mut symbols, &[], None);

        let metrics = symbols[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.lines_of_code, Some(5));
        assert_eq!(metrics.parameter_count, Some(3));
        assert_eq!(metrics.cyclomatic_complexity, Some(1));
        assert!(metrics.test_coverage.is_none());
    }

    #[test]
    fn test_existing_metrics_are_kept() {
        let mut symbol = CodeSymbol::new("a.ts", "foo", SymbolKind::Function, 1, 2);
        symbol.metrics = Some(SymbolMetrics {
            lines_of_code: Some(40),
            cyclomatic_complexity: Some(9),
            parameter_count: Some(4),
            test_coverage: None,
        });
        let mut symbols = vec![symbol];

        let mut report = CoverageReport::default();
        report.files.insert(
            "a.ts".to_string(),
            FileCoverage {
                functions: vec![FunctionCoverage {
                    name: "foo".to_string(),
                    line: 1,
                    hit_count: 2,
                }],
                lines: [(1, 2), (2, 0)].into_iter().collect(),
            },
        );

        collect_metrics(&mut symbols, &[], Some(&report));

        let metrics = symbols[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.lines_of_code, Some(40));
        assert_eq!(metrics.cyclomatic_complexity, Some(9));
        let coverage = metrics.test_coverage.as_ref().unwrap();
        assert_eq!(coverage.hit_count, 2);
        assert_eq!(coverage.coverage_percent, 50.0);
    }

    #[test]
    fn test_stale_coverage_is_cleared() {
        let mut symbol = CodeSymbol::new("a.ts", "foo", SymbolKind::Function, 1, 2);
        symbol.metrics = Some(SymbolMetrics {
            lines_of_code: Some(2),
            cyclomatic_complexity: Some(1),
            parameter_count: Some(0),
            test_coverage: Some(TestCoverage::new(5, 2, 2)),
        });
        let mut symbols = vec![symbol.clone()];

        // Report no longer mentions foo
        let mut report = CoverageReport::default();
        report.files.insert("a.ts".to_string(), FileCoverage::default());
        collect_metrics(&mut symbols, &[], Some(&report));
        assert!(symbols[0].metrics.as_ref().unwrap().test_coverage.is_none());

        let mut symbols = vec![symbol];
        collect_metrics(&mut symbols, &[], None);
        let metrics = symbols[0].metrics.as_ref().unwrap();
        assert!(metrics.test_coverage.is_none());
        assert_eq!(metrics.lines_of_code, Some(2));
    }

    #[test]
    fn test_coverage_skips_non_callables() {
        let mut symbols = vec![
            CodeSymbol::new("a.ts", "Foo", SymbolKind::Class, 1, 5),
            CodeSymbol::new("a.ts", "bar", SymbolKind::Method, 2, 4),
        ];
        let mut report = CoverageReport::default();
        report.files.insert(
            "a.ts".to_string(),
            FileCoverage {
                functions: vec![FunctionCoverage {
                    name: "bar".to_string(),
                    line: 2,
                    hit_count: 1,
                }],
                lines: Default::default(),
            },
        );

        assert_eq!(enrich_coverage(&mut symbols, &report), 1);
        assert!(symbols[0].metrics.is_none());
        assert!(symbols[1].metrics.as_ref().unwrap().test_coverage.is_some());
    }
}
