// External test coverage reports

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{CodeSymbol, TestCoverage};

/// Coverage of one function as reported by the test runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCoverage {
    pub name: String,
    pub line: u32,
    pub hit_count: u64,
}

/// Per-file coverage: function entries plus `line -> hits`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    #[serde(default)]
    pub functions: Vec<FunctionCoverage>,
    #[serde(default)]
    pub lines: BTreeMap<u32, u64>,
}

impl FileCoverage {
    /// Coverage for `symbol`, matched by name first and by line range for
    /// anonymous functions. `None` if no function entry falls in its range.
    pub fn coverage_for(&self, symbol: &CodeSymbol) -> Option<TestCoverage> {
        let function = self
            .functions
            .iter()
            .find(|f| f.name == symbol.name && symbol.contains_line(f.line))
            .or_else(|| self.functions.iter().find(|f| symbol.contains_line(f.line)))?;

        let in_range = self
            .lines
            .range(symbol.start_line..=symbol.end_line)
            .map(|(_, hits)| *hits);
        let (mut covered, mut hit) = (0u32, 0u32);
        for hits in in_range {
            covered += 1;
            if hits > 0 {
                hit += 1;
            }
        }

        Some(TestCoverage::new(function.hit_count, hit, covered))
    }
}

/// Coverage keyed by the path the report used for each file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    #[serde(default)]
    pub files: BTreeMap<String, FileCoverage>,
}

impl CoverageReport {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Read an LCOV tracefile. Unknown or malformed records are ignored.
    pub fn parse_lcov(text: &str) -> Self {
        let mut report = CoverageReport::default();
        let mut current: Option<(String, FileCoverage)> = None;
        let mut function_hits: HashMap<String, u64> = HashMap::new();

        for line in text.lines().map(str::trim) {
            if let Some(path) = line.strip_prefix("SF:") {
                current = Some((path.to_string(), FileCoverage::default()));
                function_hits.clear();
                continue;
            }
            if line == "end_of_record" {
                if let Some((path, mut file)) = current.take() {
                    for function in &mut file.functions {
                        function.hit_count = function_hits.get(&function.name).copied().unwrap_or(0);
                    }
                    report.files.insert(path, file);
                }
                continue;
            }
            let Some((_, file)) = current.as_mut() else {
                continue;
            };

            if let Some(rest) = line.strip_prefix("FN:") {
                if let Some((line_no, name)) = rest.split_once(',') {
                    if let Ok(line_no) = line_no.trim().parse() {
                        file.functions.push(FunctionCoverage {
                            name: name.trim().to_string(),
                            line: line_no,
                            hit_count: 0,
                        });
                    }
                }
            } else if let Some(rest) = line.strip_prefix("FNDA:") {
                if let Some((hits, name)) = rest.split_once(',') {
                    if let Ok(hits) = hits.trim().parse::<u64>() {
                        *function_hits.entry(name.trim().to_string()).or_insert(0) += hits;
                    }
                }
            } else if let Some(rest) = line.strip_prefix("DA:") {
                let mut parts = rest.split(',');
                let line_no = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
                let hits = parts.next().and_then(|p| p.trim().parse::<u64>().ok());
                if let (Some(line_no), Some(hits)) = (line_no, hits) {
                    *file.lines.entry(line_no).or_insert(0) += hits;
                }
            }
        }

        debug!("Loaded LCOV coverage for {} files", report.files.len());
        report
    }

    /// Entry for `rel_path`: exact key, or a key ending in `/<rel_path>`.
    pub fn file(&self, rel_path: &str) -> Option<&FileCoverage> {
        if let Some(file) = self.files.get(rel_path) {
            return Some(file);
        }
        let suffix = format!("/{}", rel_path.trim_start_matches("./"));
        self.files
            .iter()
            .find(|(path, _)| path.replace('\\', "/").ends_with(&suffix))
            .map(|(_, file)| file)
    }
}
