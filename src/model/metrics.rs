// Static metrics attached to symbols

use serde::{Deserialize, Serialize};

/// Metrics written by the metrics collector. Fields are optional so a
/// coverage-only pass can enrich a symbol without inventing the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_of_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cyclomatic_complexity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_coverage: Option<TestCoverage>,
}

/// Coverage figures for one callable symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCoverage {
    pub hit_count: u64,
    pub lines_hit: u32,
    pub lines_covered: u32,
    pub coverage_percent: f64,
}

impl TestCoverage {
    pub fn new(hit_count: u64, lines_hit: u32, lines_covered: u32) -> Self {
        let coverage_percent = if lines_covered == 0 {
            0.0
        } else {
            f64::from(lines_hit) / f64::from(lines_covered) * 100.0
        };

        Self {
            hit_count,
            lines_hit,
            lines_covered,
            coverage_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_percent() {
        let coverage = TestCoverage::new(4, 3, 4);
        assert!((coverage.coverage_percent - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coverage_percent_without_instrumented_lines() {
        let coverage = TestCoverage::new(0, 0, 0);
        assert_eq!(coverage.coverage_percent, 0.0);
    }
}
