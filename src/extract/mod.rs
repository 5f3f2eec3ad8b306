// src/extract/mod.rs
// Response normalization and projection: MCP envelope unwrapping, the
// JSONPath subset used by learned sub-tools, and schema field renaming.

pub mod fields;
pub mod path;
pub mod unwrap;

pub use fields::rename_fields;
pub use path::{clean_path, extract_path};
pub use unwrap::unwrap_response;
