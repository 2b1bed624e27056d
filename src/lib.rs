//! Sheet Projector
//!
//! Converts spreadsheet tables into nested JSON content, guided by JSON
//! Schema documents annotated with how each field is laid out in the sheet.
//!
//! ## Layouts
//!
//! - **SingleRow**: a value lives on one row; array elements are spread over
//!   indexed columns (`Reward[0]`, `Reward[1]`, ...)
//! - **MultiRow**: a value spans a run of rows; a run continues while its key
//!   column is blank
//! - **SingleColumn**: a value is packed into one cell (`Heal 30`, `1, 2, 3`)
//!
//! ## Pipeline
//!
//! ```text
//! schemas/quest.schema.json ──► SchemaLoader ──► ContentSchema
//!                                                     │
//! sheets/Quest.xlsx ──► Workbook ──► Projector ───────┴──► data/Quest.json
//!                                        │
//!                          EnumCollector ┴──► schemas/quest.enum.json
//!
//! ContentSchema ──► RustGenerator ──► generated/quest.rs
//! ```

pub mod checksum;
pub mod codegen;
pub mod config;
pub mod convert;
pub mod cursor;
pub mod enums;
pub mod error;
pub mod keys;
pub mod loader;
pub mod projector;
pub mod registry;
pub mod schema;
pub mod source;
pub mod validate;

pub use checksum::{write_if_changed, Checksum, WriteOutcome};
pub use codegen::RustGenerator;
pub use config::{ContentConfig, ToolConfig};
pub use convert::{ConvertReport, Converter};
pub use cursor::RowCursor;
pub use enums::EnumCollector;
pub use error::{ProjectError, Result};
pub use loader::SchemaLoader;
pub use projector::{project_workbook, Projection, Projector};
pub use registry::ReferenceRegistry;
pub use schema::{ContentSchema, LayoutMode, SchemaNode};
pub use source::{open_workbook, Workbook};
pub use validate::{DataValidator, ValidationReport};
