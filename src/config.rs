// Configuration management for symgraph

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::Language;

/// File name looked up in the project root.
pub const CONFIG_FILE: &str = ".symgraph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub languages: LanguagesConfig,
    pub indexing: IndexingConfig,
    pub performance: PerformanceConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    /// Ignore recorded hashes and re-parse every file.
    pub full_rebuild: bool,
    /// Where hashes and cached symbols are kept between runs, relative to the project root.
    pub state_dir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker pool size. Unset means `max(1, min(cores - 1, 8))`.
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// LCOV tracefile or JSON coverage report.
    pub coverage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
            root: ".".to_string(),
        }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            enabled: Language::SUPPORTED
                .iter()
                .map(|l| l.as_str().to_string())
                .collect(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "target/".to_string(),
                "node_modules/".to_string(),
                "dist/".to_string(),
                ".git/".to_string(),
                ".symgraph/".to_string(),
                "**/__pycache__/**".to_string(),
                "*.d.ts".to_string(),
            ],
            include: vec![],
            full_rebuild: false,
            state_dir: ".symgraph".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn path_in<P: AsRef<Path>>(project_dir: P) -> PathBuf {
        project_dir.as_ref().join(CONFIG_FILE)
    }

    /// Absolute state directory for a project.
    pub fn state_dir<P: AsRef<Path>>(&self, project_dir: P) -> PathBuf {
        project_dir.as_ref().join(&self.indexing.state_dir)
    }

    /// Check if a project-relative path should be indexed based on include/exclude patterns
    pub fn should_index_file(&self, rel_path: &str) -> bool {
        if self
            .indexing
            .exclude
            .iter()
            .any(|pattern| matches_pattern(rel_path, pattern))
        {
            return false;
        }

        // With include patterns, a file must match at least one
        self.indexing.include.is_empty()
            || self
                .indexing
                .include
                .iter()
                .any(|pattern| matches_pattern(rel_path, pattern))
    }

    /// Enabled languages that have a grammar.
    pub fn enabled_languages(&self) -> Vec<Language> {
        self.languages
            .enabled
            .iter()
            .map(|key| Language::from_key(key))
            .filter(|language| *language != Language::Unknown)
            .collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            return Err(anyhow::anyhow!("Project name cannot be empty"));
        }

        for lang in &self.languages.enabled {
            if Language::from_key(lang) == Language::Unknown {
                return Err(anyhow::anyhow!("Unsupported language: {}", lang));
            }
        }

        if self.indexing.state_dir.is_empty() {
            return Err(anyhow::anyhow!("State directory cannot be empty"));
        }

        if self.performance.workers == Some(0) {
            return Err(anyhow::anyhow!("Worker count must be greater than 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}

/// Simple glob-style matching on `/`-separated relative paths.
fn matches_pattern(rel_path: &str, pattern: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix('/') {
        // Directory pattern, at the root or nested
        rel_path.starts_with(pattern) || rel_path.contains(&format!("/{}/", dir))
    } else if let Some(inner) = pattern
        .strip_prefix("**/")
        .and_then(|p| p.strip_suffix("/**"))
    {
        rel_path.starts_with(&format!("{}/", inner)) || rel_path.contains(&format!("/{}/", inner))
    } else if let Some(rest) = pattern.strip_prefix('*') {
        // `*.ext` suffix, or `*.test.*` infix
        match rest.strip_suffix('*') {
            Some(infix) => rel_path.contains(infix),
            None => rel_path.ends_with(rest),
        }
    } else {
        rel_path == pattern || rel_path.starts_with(&format!("{}/", pattern.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project.name, "unnamed-project");
        assert!(config.languages.enabled.contains(&"typescript".to_string()));
        assert!(config.indexing.exclude.contains(&"node_modules/".to_string()));
        assert_eq!(config.indexing.state_dir, ".symgraph");
        assert!(config.performance.workers.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[project]
name = "shop"

[performance]
workers = 2

[metrics]
coverage = "coverage/lcov.info"
"#,
        )
        .unwrap();

        assert_eq!(config.project.name, "shop");
        assert_eq!(config.project.root, ".");
        assert_eq!(config.performance.workers, Some(2));
        assert_eq!(config.metrics.coverage.as_deref(), Some("coverage/lcov.info"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.enabled_languages().len(), Language::SUPPORTED.len());
    }

    #[test]
    fn test_should_index_file() {
        let config = Config::default();

        assert!(config.should_index_file("src/main.rs"));
        assert!(config.should_index_file("lib/utils.py"));

        assert!(!config.should_index_file("target/debug/build.rs"));
        assert!(!config.should_index_file("web/node_modules/pkg/index.js"));
        assert!(!config.should_index_file("app/__pycache__/mod.py"));
        assert!(!config.should_index_file("types/global.d.ts"));
        assert!(!config.should_index_file(".symgraph/state.json"));
    }

    #[test]
    fn test_include_patterns_restrict() {
        let mut config = Config::default();
        config.indexing.include = vec!["src/".to_string()];

        assert!(config.should_index_file("src/app.ts"));
        assert!(!config.should_index_file("scripts/build.ts"));
    }

    #[test]
    fn test_pattern_matching() {
        // Directory patterns
        assert!(matches_pattern("target/debug/file", "target/"));
        assert!(matches_pattern("src/target/file", "target/"));
        assert!(!matches_pattern("src/targets.rs", "target/"));

        // Extension patterns
        assert!(matches_pattern("test.py", "*.py"));
        assert!(!matches_pattern("test.rs", "*.py"));
        assert!(matches_pattern("src/app.test.ts", "*.test.*"));

        // Recursive patterns
        assert!(matches_pattern("src/__tests__/test.py", "**/__tests__/**"));

        // Plain paths
        assert!(matches_pattern("docs", "docs"));
        assert!(matches_pattern("docs/a.md", "docs"));
        assert!(!matches_pattern("docsite/a.md", "docs"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        assert!(config.validate().is_ok());

        config.project.name = "".to_string();
        assert!(config.validate().is_err());
        config.project.name = "test".to_string();

        config.languages.enabled = vec!["cobol".to_string()];
        assert!(config.validate().is_err());
        config.languages.enabled = vec!["python".to_string()];

        config.performance.workers = Some(0);
        assert!(config.validate().is_err());
        config.performance.workers = Some(4);

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "info".to_string();

        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
        config.logging.format = "json".to_string();

        assert!(config.validate().is_ok());
    }
}
