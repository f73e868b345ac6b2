//! OpenAPI 3 document model and loader
//!
//! ## Usage
//! ```rust,ignore
//! use brapi_conformance_parser::openapi::OpenApiParser;
//!
//! let parser = OpenApiParser::from_file("brapi_openapi.yaml")?;
//! println!("{} paths", parser.spec().paths.len());
//! ```

mod parser;
mod types;

pub use parser::OpenApiParser;
pub use types::*;
