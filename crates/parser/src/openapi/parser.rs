//! OpenAPI document loader

use super::types::OpenApiSpec;
use brapi_conformance_common::{AnalyserError, Result};
use std::fs;
use std::path::Path;

/// A loaded OpenAPI document
///
/// Keeps the raw text alongside the typed model so the response validator
/// can be built from exactly the same document. `$ref`s are expected to be
/// resolved already, apart from single-level `#/components/...` references,
/// which are followed on demand.
#[derive(Debug, Clone)]
pub struct OpenApiParser {
    spec: OpenApiSpec,
    source: String,
}

impl OpenApiParser {
    /// Load an OpenAPI document (JSON or YAML) from a file path
    ///
    /// # Example
    /// ```rust,ignore
    /// let parser = OpenApiParser::from_file("brapi_openapi.yaml")?;
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AnalyserError::Parse(format!(
                "Failed to read OpenAPI file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_source(content)
    }

    /// Parse an OpenAPI document from a string, detecting JSON or YAML
    pub fn from_source(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let spec = if source.trim_start().starts_with('{') {
            serde_json::from_str(&source)
                .map_err(|e| AnalyserError::Parse(format!("Failed to parse OpenAPI JSON: {}", e)))?
        } else {
            serde_yaml::from_str(&source)
                .map_err(|e| AnalyserError::Parse(format!("Failed to parse OpenAPI YAML: {}", e)))?
        };

        Ok(Self { spec, source })
    }

    pub fn spec(&self) -> &OpenApiSpec {
        &self.spec
    }

    /// Document text as loaded
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_openapi_json() {
        let openapi_json = r#"{
            "openapi": "3.0.0",
            "info": {
                "title": "Test API",
                "version": "1.0.0"
            },
            "paths": {}
        }"#;

        let parser = OpenApiParser::from_source(openapi_json);
        assert!(parser.is_ok());

        let parser = parser.unwrap();
        assert_eq!(parser.spec.openapi, "3.0.0");
        assert_eq!(parser.spec.info.title, "Test API");
        assert_eq!(parser.source(), openapi_json);
    }

    #[test]
    fn test_parse_minimal_openapi_yaml() {
        let openapi_yaml = "openapi: 3.0.0\ninfo:\n  title: BrAPI-Core\n  version: '2.1'\npaths:\n  /studies:\n    get:\n      responses: {}\n";

        let parser = OpenApiParser::from_source(openapi_yaml).unwrap();
        assert_eq!(parser.spec().info.title, "BrAPI-Core");
        assert!(parser.spec().paths.contains_key("/studies"));
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let result = OpenApiParser::from_source("{ not json");
        assert!(matches!(result, Err(AnalyserError::Parse(_))));
    }
}
