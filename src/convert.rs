//! Batch Conversion
//!
//! Drives the per-content pipeline: enum collection, workbook projection,
//! output writing and validation. Conversion is best effort per file: a data
//! error is logged with its context and recorded in the report, and the batch
//! moves on. Configuration errors abort the run.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::checksum::{write_if_changed, WriteOutcome};
use crate::config::{ContentConfig, OutputFormat, SourceFile, ToolConfig};
use crate::enums::{artifact_path, enum_artifact, EnumCollector};
use crate::error::Result;
use crate::keys;
use crate::loader::SchemaLoader;
use crate::projector::project_workbook;
use crate::schema::ContentSchema;
use crate::source::open_workbook;
use crate::validate::{DataValidator, ValidationReport};

/// Files touched by one batch
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    /// Source file and the reason it failed
    pub failed: Vec<(PathBuf, String)>,
}

impl ConvertReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: ConvertReport) {
        self.written.extend(other.written);
        self.unchanged.extend(other.unchanged);
        self.failed.extend(other.failed);
    }

    fn record(&mut self, path: PathBuf, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.written.push(path),
            WriteOutcome::Unchanged => self.unchanged.push(path),
        }
    }
}

/// Runs conversions under one configuration
pub struct Converter<'c> {
    config: &'c ToolConfig,
}

impl<'c> Converter<'c> {
    pub fn new(config: &'c ToolConfig) -> Self {
        Self { config }
    }

    /// Serialize in the configured output format, with a trailing newline
    pub fn serialize(&self, value: &Value) -> Result<String> {
        let mut text = match self.config.output.format {
            OutputFormat::Compact => serde_json::to_string(value)?,
            OutputFormat::Pretty => {
                let indent = vec![b' '; self.config.output.indent];
                let mut buffer = Vec::new();
                let mut serializer =
                    Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(&indent));
                value.serialize(&mut serializer)?;
                String::from_utf8(buffer)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
            }
        };
        text.push('\n');
        Ok(text)
    }

    fn load_schema(&self, content: &ContentConfig) -> Result<ContentSchema> {
        SchemaLoader::load(&self.config.schema_path(content))
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Convert every workbook of `content`
    pub fn convert_content(&self, content: &ContentConfig) -> Result<ConvertReport> {
        let schema = self.load_schema(content)?;
        let files = self.config.source_files(content)?;
        if files.is_empty() {
            warn!(content = %content.name, source = %content.source, "no source workbooks found");
        }

        let mut report = ConvertReport::default();
        for file in &files {
            match self.convert_file(&schema, file) {
                Ok(outcome) => report.record(file.output.clone(), outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(content = %content.name, file = %file.source.display(), "conversion failed: {}", e);
                    report.failed.push((file.source.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Project one workbook and write its data file
    pub fn convert_file(&self, schema: &ContentSchema, file: &SourceFile) -> Result<WriteOutcome> {
        let workbook = open_workbook(&file.source)?;
        let data = project_workbook(schema, &workbook, &file.source)?;
        keys::check_content(schema, &data)?;

        let outcome = write_if_changed(&file.output, &self.serialize(&data)?)?;
        match outcome {
            WriteOutcome::Written => info!(
                source = %file.source.display(),
                output = %file.output.display(),
                "converted"
            ),
            WriteOutcome::Unchanged => debug!(output = %file.output.display(), "unchanged"),
        }
        Ok(outcome)
    }

    // =========================================================================
    // Enum Generation
    // =========================================================================

    /// Collect enum values from the workbooks of `content` and write its enum
    /// artifact. Returns `None` when the schema declares no enums.
    pub fn generate_enums(&self, content: &ContentConfig) -> Result<Option<(PathBuf, WriteOutcome)>> {
        let schema = self.load_schema(content)?;
        let mut collector = EnumCollector::new();

        for file in self.config.source_files(content)? {
            match open_workbook(&file.source) {
                Ok(workbook) => collector.collect_workbook(&schema, &workbook),
                Err(e) => warn!(file = %file.source.display(), "skipped for enum collection: {}", e),
            }
        }

        self.write_enums(content, &schema, &collector)
    }

    /// Like [`Self::generate_enums`], but collecting from converted data files
    pub fn generate_enums_from_data(
        &self,
        content: &ContentConfig,
    ) -> Result<Option<(PathBuf, WriteOutcome)>> {
        let schema = self.load_schema(content)?;
        let mut collector = EnumCollector::new();

        for path in self.config.data_files(content)? {
            let text = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Value>(&text) {
                Ok(data) => collector.collect_json(&schema, &data),
                Err(e) => warn!(file = %path.display(), "skipped for enum collection: {}", e),
            }
        }

        self.write_enums(content, &schema, &collector)
    }

    fn write_enums(
        &self,
        content: &ContentConfig,
        schema: &ContentSchema,
        collector: &EnumCollector,
    ) -> Result<Option<(PathBuf, WriteOutcome)>> {
        if collector.iter().next().is_none() {
            debug!(content = %content.name, "no enum columns declared");
            return Ok(None);
        }

        let path = artifact_path(&self.config.schema_path(content));
        let artifact = enum_artifact(schema, collector);
        let outcome = write_if_changed(&path, &self.serialize(&artifact)?)?;
        if outcome == WriteOutcome::Written {
            info!(content = %content.name, file = %path.display(), "enum artifact written");
        }
        Ok(Some((path, outcome)))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate the data files of `content` against its schema
    pub fn validate_content(&self, content: &ContentConfig) -> Result<ValidationReport> {
        let validator = DataValidator::load(&self.config.schema_path(content))?;
        let files = self.config.data_files(content)?;
        let report = validator.validate_files(&files)?;
        info!(
            content = %content.name,
            passed = report.passed.len(),
            failed = report.failed.len(),
            "validated"
        );
        Ok(report)
    }
}
