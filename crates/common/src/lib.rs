//! Common types and utilities for BrAPI conformance analysis
//!
//! This crate contains the shared data model, error types, and collaborator
//! traits used across the parser, analyzer, and CLI components.

pub mod auth;
pub mod model;
pub mod options;
pub mod report;

pub use auth::{AuthorizationProvider, NoAuthorization, StaticAuthorization};
pub use model::{
    ApiRequest, BodyTemplate, Endpoint, EndpointCategory, HttpMethod, Parameter,
    ParameterLocation, RequestKey, RequestKind, Variable, VariableValue,
};
pub use options::{
    AnalysisOptions, EntityOptions, KindGates, OptionsFile, PrerequisiteStrategy, SpecialCase,
};
pub use report::{AnalysisReport, Level, ReportError, ValidationMessage};

use std::fmt;
use thiserror::Error;

/// Errors that can occur while building or running an analysis
#[derive(Error, Debug)]
pub enum AnalyserError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unmatched endpoint: {method} {path}")]
    Classification { method: HttpMethod, path: String },

    #[error("Schema resolution error for {request}: {message}")]
    SchemaResolution { request: String, message: String },

    #[error("Variable '{0}' has no value")]
    MissingVariable(String),

    #[error("Unresolved variables for {request}: {}", .unresolved.join(", "))]
    VariableResolution {
        request: String,
        unresolved: Vec<String>,
    },

    #[error("Transport error for {request}: {message}")]
    Transport { request: String, message: String },

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to format output: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalyserError>;

/// An accumulated set of errors
///
/// Catalog construction and option validation keep going after the first
/// failure; this collects everything they hit.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<AnalyserError>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: AnalyserError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalyserError> {
        self.0.iter()
    }

    /// `Ok(value)` when nothing was collected, otherwise the full list
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, ErrorList> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<AnalyserError> for ErrorList {
    fn from(error: AnalyserError) -> Self {
        Self(vec![error])
    }
}

impl FromIterator<AnalyserError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = AnalyserError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorList {
    type Item = AnalyserError;
    type IntoIter = std::vec::IntoIter<AnalyserError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}
