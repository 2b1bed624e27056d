//! Configuration management for the sheet projector
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (sheet-projector.toml)
//! - Environment variables (SHEETS__*)
//!
//! ## Example config file (sheet-projector.toml):
//! ```toml
//! [paths]
//! schema_dir = "schemas"
//! source_dir = "sheets"
//! data_dir = "data"
//! code_dir = "src/content"
//!
//! [output]
//! format = "pretty"
//! indent = 2
//!
//! [validation]
//! strict = true
//!
//! [[contents]]
//! name = "Quest"
//! schema = "quest.schema.json"
//! source = "Quest.xlsx"
//!
//! [[contents]]
//! name = "Zone"
//! schema = "zone.schema.json"
//! source = "Zone_*.xlsx"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use config_crate::{Config, ConfigError, Environment, File};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{ProjectError, Result};

/// Main configuration for the projector
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Content types, in processing order
    #[serde(default)]
    pub contents: Vec<ContentConfig>,
}

/// Directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON Schema documents
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,

    /// Source workbooks
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Converted JSON data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Generated Rust modules
    #[serde(default = "default_code_dir")]
    pub code_dir: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Indent width for pretty output
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Any validation failure fails the command
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Validate produced data at the end of `convert`
    #[serde(default = "default_true")]
    pub after_convert: bool,
}

/// One content type: a schema plus the workbook(s) it is read from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentConfig {
    pub name: String,

    /// Schema file, relative to `schema_dir`
    pub schema: String,

    /// Workbook file name, relative to `source_dir`; may contain one `*`
    pub source: String,
}

/// A concrete source workbook and the data file it converts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub source: PathBuf,
    pub output: PathBuf,
}

// Default value functions
fn default_schema_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("sheets")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_code_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_indent() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schema_dir: default_schema_dir(),
            source_dir: default_source_dir(),
            data_dir: default_data_dir(),
            code_dir: default_code_dir(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            indent: default_indent(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: true,
            after_convert: true,
        }
    }
}

impl ToolConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "sheet-projector.toml",
            ".sheet-projector.toml",
            "config/sheet-projector.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "sheet-projector", "sheet-projector") {
            let xdg_config = config_dir.config_dir().join("sheet-projector.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Load from environment variables (SHEETS__*)
        builder = builder.add_source(
            Environment::with_prefix("SHEETS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Contents named by `filter`, in configuration order; all when empty.
    ///
    /// Unknown names are reported with the closest configured name and skipped.
    pub fn select(&self, filter: &[String]) -> Vec<&ContentConfig> {
        if filter.is_empty() {
            return self.contents.iter().collect();
        }

        for name in filter {
            if !self.contents.iter().any(|c| &c.name == name) {
                match self.suggest(name) {
                    Some(close) => warn!(content = %name, "unknown content, did you mean '{}'?", close),
                    None => warn!(content = %name, "unknown content"),
                }
            }
        }

        let wanted: HashSet<&str> = filter.iter().map(String::as_str).collect();
        self.contents
            .iter()
            .filter(|c| wanted.contains(c.name.as_str()))
            .collect()
    }

    /// Closest configured content name
    pub fn suggest(&self, name: &str) -> Option<&str> {
        let matcher = SkimMatcherV2::default().ignore_case();
        self.contents
            .iter()
            .filter_map(|c| matcher.fuzzy_match(&c.name, name).map(|score| (score, c.name.as_str())))
            .max_by_key(|(score, _)| *score)
            .map(|(_, n)| n)
    }

    /// Look up one content by exact name
    pub fn content(&self, name: &str) -> Result<&ContentConfig> {
        self.contents
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ProjectError::UnknownContent(name.to_string()))
    }

    pub fn schema_path(&self, content: &ContentConfig) -> PathBuf {
        self.paths.schema_dir.join(&content.schema)
    }

    /// Workbooks of `content` that exist on disk, in file name order
    pub fn source_files(&self, content: &ContentConfig) -> Result<Vec<SourceFile>> {
        let Some((prefix, suffix)) = content.source.split_once('*') else {
            return Ok(vec![SourceFile {
                source: self.paths.source_dir.join(&content.source),
                output: self.paths.data_dir.join(format!("{}.json", content.name)),
            }]);
        };

        let pattern = Regex::new(&format!(
            "^{}(.+){}$",
            regex::escape(prefix),
            regex::escape(suffix)
        ))
        .map_err(|e| ProjectError::InvalidExtension {
            path: content.source.clone(),
            reason: e.to_string(),
        })?;

        let mut files = Vec::new();
        if !self.paths.source_dir.is_dir() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.paths.source_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let file_name = entry.file_name().to_string_lossy();
            // Office lock files
            if file_name.starts_with("~$") {
                continue;
            }
            if let Some(caps) = pattern.captures(&file_name) {
                files.push(SourceFile {
                    source: entry.path().to_path_buf(),
                    output: self
                        .paths
                        .data_dir
                        .join(format!("{}_{}.json", content.name, &caps[1])),
                });
            }
        }

        Ok(files)
    }

    /// Data files `content` converts to that exist on disk
    pub fn data_files(&self, content: &ContentConfig) -> Result<Vec<PathBuf>> {
        if !content.source.contains('*') {
            let path = self.paths.data_dir.join(format!("{}.json", content.name));
            return Ok(if path.exists() { vec![path] } else { Vec::new() });
        }

        let pattern = Regex::new(&format!("^{}_.+\\.json$", regex::escape(&content.name))).map_err(|e| {
            ProjectError::InvalidExtension {
                path: content.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut files = Vec::new();
        if !self.paths.data_dir.is_dir() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.paths.data_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if pattern.is_match(&entry.file_name().to_string_lossy()) {
                files.push(entry.path().to_path_buf());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(name: &str, source: &str) -> ContentConfig {
        ContentConfig {
            name: name.to_string(),
            schema: format!("{}.schema.json", name.to_lowercase()),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = ToolConfig::default();
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert_eq!(config.output.indent, 2);
        assert!(config.validation.strict);
        assert!(config.contents.is_empty());
    }

    #[test]
    fn test_serialize_config() {
        let mut config = ToolConfig::default();
        config.contents.push(content("Quest", "Quest.xlsx"));
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[paths]"));
        assert!(toml_str.contains("[[contents]]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.toml");
        fs::write(
            &path,
            r#"
[output]
format = "compact"

[[contents]]
name = "Quest"
schema = "quest.schema.json"
source = "Quest.xlsx"
"#,
        )
        .unwrap();

        let config = ToolConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert_eq!(config.contents.len(), 1);
        assert_eq!(config.content("Quest").unwrap().source, "Quest.xlsx");
    }

    #[test]
    fn test_select_keeps_config_order_and_skips_unknown() {
        let mut config = ToolConfig::default();
        config.contents = vec![content("Quest", "Quest.xlsx"), content("Item", "Item.xlsx")];

        let all = config.select(&[]);
        assert_eq!(all.len(), 2);

        let picked = config.select(&["Item".to_string(), "Quest".to_string(), "Qest".to_string()]);
        let names: Vec<&str> = picked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Quest", "Item"]);
        assert_eq!(config.suggest("Qest"), Some("Quest"));
        assert!(matches!(config.content("Nope"), Err(ProjectError::UnknownContent(_))));
    }

    #[test]
    fn test_source_wildcard_fans_out() {
        let dir = tempfile::tempdir().unwrap();
        let sheets = dir.path().join("sheets");
        fs::create_dir_all(&sheets).unwrap();
        for name in ["Zone_Forest.xlsx", "Zone_Desert.xlsx", "~$Zone_Lock.xlsx", "Other.xlsx"] {
            fs::write(sheets.join(name), b"").unwrap();
        }

        let mut config = ToolConfig::default();
        config.paths.source_dir = sheets;
        config.paths.data_dir = dir.path().join("data");

        let files = config.source_files(&content("Zone", "Zone_*.xlsx")).unwrap();
        let outputs: Vec<String> = files
            .iter()
            .map(|f| f.output.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(outputs, vec!["Zone_Desert.json", "Zone_Forest.json"]);
    }
}
