// End-to-end tests for the indexing pipeline

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use symgraph::indexer::coverage::CoverageReport;
use symgraph::indexer::{IndexRequest, IndexResult, Indexer, SourceFile};
use symgraph::model::{CodeSymbol, RelationshipKind, SymbolKind};
use tempfile::TempDir;

fn write_files(dir: &Path, files: &[(&str, &str)]) -> Vec<SourceFile> {
    files
        .iter()
        .map(|(rel, content)| {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            SourceFile::new(path, *rel)
        })
        .collect()
}

fn symbol<'a>(result: &'a IndexResult, name: &str) -> &'a CodeSymbol {
    result
        .symbols
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("missing symbol {}", name))
}

async fn index(files: Vec<SourceFile>) -> IndexResult {
    Indexer::new()
        .with_workers(2)
        .index(IndexRequest::new(files))
        .await
        .unwrap()
}

async fn reindex(files: Vec<SourceFile>, previous: &IndexResult) -> IndexResult {
    let request = IndexRequest {
        files,
        previous_hashes: previous.hashes.clone().into_iter().collect::<HashMap<_, _>>(),
        cached_symbols: previous.symbols.clone(),
        ..IndexRequest::default()
    };
    Indexer::new().with_workers(2).index(request).await.unwrap()
}

const A_TS: &str = "function foo(x, y) { if (x) { return y; } return 0; }\n";
const B_TS: &str = "function bar() { foo(1, 2); }\n";

#[tokio::test]
async fn test_cross_file_call_with_metrics() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS), ("b.ts", B_TS)]);

    let result = index(files).await;
    assert!(result.errors.is_empty());
    assert_eq!(result.skipped_count, 0);
    assert_eq!(result.hashes.len(), 2);

    let foo = symbol(&result, "foo");
    let bar = symbol(&result, "bar");
    assert_eq!(foo.kind, SymbolKind::Function);
    let metrics = foo.metrics.as_ref().unwrap();
    assert_eq!(metrics.parameter_count, Some(2));
    assert_eq!(metrics.cyclomatic_complexity, Some(2));
    assert_eq!(metrics.lines_of_code, Some(1));

    assert!(result.relationships.iter().any(|e| e.kind == RelationshipKind::Calls
        && e.source_id == bar.id
        && e.target_id == foo.id));
}

#[tokio::test]
async fn test_unchanged_project_is_skipped_and_stable() {
    let dir = TempDir::new().unwrap();
    let files = write_files(
        dir.path(),
        &[
            ("a.ts", A_TS),
            ("b.ts", B_TS),
            ("models.py", "class User:\n    def save(self):\n        pass\n"),
        ],
    );

    let first = index(files.clone()).await;
    let second = reindex(files, &first).await;

    assert_eq!(second.skipped_count, 3);
    assert!(second.hashes.is_empty());
    assert_eq!(second.symbols, first.symbols);
    assert_eq!(second.relationships, first.relationships);
}

#[tokio::test]
async fn test_only_changed_file_is_reparsed() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS), ("b.ts", B_TS)]);
    let first = index(files.clone()).await;

    fs::write(dir.path().join("b.ts"), "function bar() { foo(1, 2); }\nfunction baz() {}\n").unwrap();
    let second = reindex(files, &first).await;

    assert_eq!(second.skipped_count, 1);
    assert_eq!(second.hashes.keys().collect::<Vec<_>>(), vec!["b.ts"]);
    assert_ne!(second.hashes["b.ts"], first.hashes["b.ts"]);
    assert!(second.symbols.iter().any(|s| s.name == "baz"));
    assert!(second
        .relationships
        .iter()
        .any(|e| e.kind == RelationshipKind::Calls));
}

#[tokio::test]
async fn test_full_rebuild_ignores_hashes() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS), ("b.ts", B_TS)]);
    let first = index(files.clone()).await;

    let request = IndexRequest {
        files,
        previous_hashes: first.hashes.clone().into_iter().collect(),
        cached_symbols: first.symbols.clone(),
        full_rebuild: true,
        ..IndexRequest::default()
    };
    let rebuilt = Indexer::new().with_workers(2).index(request).await.unwrap();

    assert_eq!(rebuilt.skipped_count, 0);
    assert_eq!(rebuilt.hashes, first.hashes);
    assert_eq!(rebuilt.relationships, first.relationships);
}

#[tokio::test]
async fn test_failing_file_does_not_abort_the_run() {
    let dir = TempDir::new().unwrap();
    let mut files = write_files(
        dir.path(),
        &[
            ("a.ts", A_TS),
            ("b.ts", B_TS),
            ("broken.ts", "function broken( {\n  return ;;; }}}\n"),
        ],
    );
    files.push(SourceFile::new(dir.path().join("missing.ts"), "missing.ts"));

    let result = index(files).await;

    let failed: HashSet<&str> = result.errors.iter().map(|e| e.file.as_str()).collect();
    assert_eq!(failed, HashSet::from(["broken.ts", "missing.ts"]));
    assert_eq!(result.hashes.len(), 2);
    assert!(!result.hashes.contains_key("broken.ts"));
    assert!(result.symbols.iter().all(|s| s.file != "broken.ts"));
    assert!(result.relationships.iter().any(|e| e.kind == RelationshipKind::Calls));
}

#[tokio::test]
async fn test_no_duplicate_edges() {
    let dir = TempDir::new().unwrap();
    let files = write_files(
        dir.path(),
        &[
            ("a.ts", A_TS),
            ("b.ts", "function bar() {\n  foo(1, 2);\n  foo(3, 4);\n  if (foo(5, 6)) { foo(7, 8); }\n}\n"),
            ("c.ts", "function qux() { foo(0, 0); bar(); bar(); }\n"),
        ],
    );

    let result = index(files).await;
    let keys: Vec<_> = result.relationships.iter().map(|e| e.key()).collect();
    let unique: HashSet<_> = keys.iter().cloned().collect();
    assert_eq!(keys.len(), unique.len());

    let calls = result
        .relationships
        .iter()
        .filter(|e| e.kind == RelationshipKind::Calls)
        .count();
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn test_external_fields_survive_reparse() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS)]);
    let mut first = index(files.clone()).await;

    for symbol in first.symbols.iter_mut().filter(|s| s.name == "foo") {
        symbol.pattern = Some("helper".to_string());
        symbol.violations = vec!["too-generic".to_string()];
        symbol.explanation = Some("Adds defaults".to_string());
        symbol.explanation_hash = Some("e1".to_string());
    }

    fs::write(dir.path().join("a.ts"), "function foo(x, y) {\n  return x ?? y;\n}\n").unwrap();
    let second = reindex(files, &first).await;

    assert_eq!(second.skipped_count, 0);
    let foo = symbol(&second, "foo");
    assert_eq!(foo.end_line, 3);
    assert_eq!(foo.pattern.as_deref(), Some("helper"));
    assert_eq!(foo.violations, vec!["too-generic".to_string()]);
    assert_eq!(foo.explanation.as_deref(), Some("Adds defaults"));
    assert_eq!(foo.explanation_hash.as_deref(), Some("e1"));
}

#[tokio::test]
async fn test_deleted_files_drop_cached_symbols() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS), ("b.ts", B_TS)]);
    let first = index(files.clone()).await;

    let remaining: Vec<SourceFile> = files.into_iter().filter(|f| f.rel_path == "a.ts").collect();
    let second = reindex(remaining, &first).await;

    assert_eq!(second.skipped_count, 1);
    assert!(second.symbols.iter().all(|s| s.file == "a.ts"));
    assert!(second.relationships.is_empty());
}

#[tokio::test]
async fn test_coverage_enrichment() {
    let dir = TempDir::new().unwrap();
    let files = write_files(
        dir.path(),
        &[("src/math.ts", "export class Calc {}\nexport function add(a, b) {\n  return a + b;\n}\n")],
    );
    let coverage = CoverageReport::parse_lcov(
        "SF:/ci/project/src/math.ts\nFN:2,add\nFNDA:4,add\nDA:2,4\nDA:3,4\nend_of_record\n",
    );

    let request = IndexRequest {
        files,
        coverage: Some(coverage),
        ..IndexRequest::default()
    };
    let result = Indexer::new().with_workers(1).index(request).await.unwrap();

    let add = symbol(&result, "add");
    let tested = add.metrics.as_ref().unwrap().test_coverage.as_ref().unwrap();
    assert_eq!(tested.hit_count, 4);
    assert_eq!(tested.lines_hit, 2);
    assert_eq!(tested.coverage_percent, 100.0);

    let calc = symbol(&result, "Calc");
    assert!(calc
        .metrics
        .as_ref()
        .map_or(true, |m| m.test_coverage.is_none()));
}

#[tokio::test]
async fn test_mixed_languages_in_one_run() {
    let dir = TempDir::new().unwrap();
    let files = write_files(
        dir.path(),
        &[
            ("web/app.ts", "export class App {}\n"),
            ("svc/main.go", "package main\n\nfunc Run() {}\n"),
            ("core/lib.rs", "pub struct Engine;\n"),
            ("api/Service.java", "public class Service {}\n"),
            ("tools/run.py", "def run():\n    pass\n"),
            ("README.md", "# not code\n"),
        ],
    );

    let result = index(files).await;
    assert!(result.errors.is_empty());
    assert_eq!(result.hashes.len(), 6);

    let names: HashSet<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
    for name in ["App", "Run", "Engine", "Service", "run"] {
        assert!(names.contains(name), "missing {}", name);
    }
    assert!(result.symbols.iter().all(|s| s.file != "README.md"));
}

#[tokio::test]
async fn test_edited_callee_is_reparsed_and_caller_edge_kept() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS), ("b.ts", B_TS)]);
    let first = index(files.clone()).await;

    fs::write(
        dir.path().join("a.ts"),
        "function foo(x, y) { if (x) { return y; } if (y) { return x; } return 0; }\n",
    )
    .unwrap();
    let second = reindex(files, &first).await;

    assert_eq!(second.skipped_count, 1);
    assert_eq!(second.hashes.keys().collect::<Vec<_>>(), vec!["a.ts"]);

    let foo = symbol(&second, "foo");
    let bar = symbol(&second, "bar");
    assert_eq!(foo.metrics.as_ref().unwrap().cyclomatic_complexity, Some(3));
    assert!(second.relationships.iter().any(|e| e.kind == RelationshipKind::Calls
        && e.source_id == bar.id
        && e.target_id == foo.id));
}

#[tokio::test]
async fn test_binary_file_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let mut files = write_files(dir.path(), &[("a.ts", A_TS)]);
    let logo = dir.path().join("logo.png");
    fs::write(&logo, [0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe, 0x00, 0x80]).unwrap();
    files.push(SourceFile::new(logo, "logo.png"));

    let first = index(files.clone()).await;
    assert!(first.errors.is_empty());
    assert!(first.hashes.contains_key("logo.png"));
    assert!(first.symbols.iter().all(|s| s.file != "logo.png"));

    let second = reindex(files, &first).await;
    assert!(second.errors.is_empty());
    assert_eq!(second.skipped_count, 2);
}

#[tokio::test]
async fn test_corrupt_cached_symbol_is_dropped() {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), &[("a.ts", A_TS), ("b.ts", B_TS)]);
    let mut first = index(files.clone()).await;

    for symbol in first.symbols.iter_mut().filter(|s| s.name == "bar") {
        symbol.start_line = 5;
        symbol.end_line = 1;
        symbol.metrics = None;
    }
    let second = reindex(files, &first).await;

    assert_eq!(second.skipped_count, 2);
    assert!(second.errors.is_empty());
    assert!(second.symbols.iter().all(|s| s.name != "bar"));
    assert!(second.symbols.iter().any(|s| s.name == "foo"));
}
