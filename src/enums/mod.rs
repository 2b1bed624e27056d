//! Enum Collection
//!
//! Gathers the distinct values of the columns a content declares under
//! `enums`, either from source workbooks or from previously converted data
//! files, and writes them out as a JSON Schema of string enums that the
//! content schema can `$ref`.

pub mod artifact;
pub mod collector;

pub use artifact::{artifact_path, enum_artifact, ENUM_ARTIFACT_SUFFIX};
pub use collector::EnumCollector;
