//! OpenAPI parsing and request catalog building
//!
//! This crate turns an OpenAPI v3 document describing a BrAPI server into a
//! [`RequestCatalog`] of executable requests.
//!
//! ## Building Strategy
//!
//! Each path is classified by its shape (see [`PathClassifier`]) and every
//! declared method on it becomes at most one request:
//! - `/studies` → List (GET), Create (POST)
//! - `/studies/{studyDbId}` → Get, Update (PUT), Delete
//! - `/search/studies` → Search (POST)
//! - `/search/studies/{searchResultsDbId}` → Search Results (GET)
//! - `/studies/table` → Table (GET)
//! - `/germplasm/{germplasmDbId}/pedigree` → List, after `GET /germplasm`
//!
//! Configured special paths such as `/commoncropnames` bypass classification.

mod builder;
mod catalog;
mod classifier;
pub mod naming;
pub mod openapi;

pub use builder::{request_kind, search_results_variable, BuildOutcome, RequestBuilder};
pub use catalog::RequestCatalog;
pub use classifier::{Classification, PathClassifier};
pub use openapi::{OpenApiParser, OpenApiSpec};

use brapi_conformance_common::{AnalysisOptions, Result};
use std::path::Path;

/// Load an OpenAPI document and build its request catalog
pub fn build_catalog(
    spec_path: &Path,
    options: &dyn AnalysisOptions,
) -> Result<(OpenApiParser, RequestCatalog)> {
    let parser = OpenApiParser::from_file(spec_path)?;
    let catalog = RequestCatalog::build(parser.spec(), options)?;
    Ok((parser, catalog))
}
