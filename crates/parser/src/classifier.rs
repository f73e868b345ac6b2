//! Endpoint path classification
//!
//! Paths are matched against an ordered list of anchored patterns; the first
//! pattern that matches decides the category and no further patterns are
//! tried:
//! - `/search/{entity}/{searchResultsDbId}` → Search Result
//! - `/search/{entity}` → Search
//! - `/{entities}` → Entities
//! - `/{entities}/{entityDbId}` → Entity
//! - `/{entities}/table` → Table
//! - `/{entities}/{entityDbId}/{subEntities}` → Sub-path

use brapi_conformance_common::{AnalyserError, EndpointCategory, Result};
use regex::{Captures, Regex};

/// Segments captured from a classified path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: EndpointCategory,
    /// Entity path segment, e.g. `studies`
    pub entity_segment: String,
    /// Name of the id placeholder, e.g. `studyDbId`
    pub id_parameter: Option<String>,
    /// Nested collection segment of a sub-path, e.g. `pedigree`
    pub sub_entity_segment: Option<String>,
}

struct Rule {
    category: EndpointCategory,
    pattern: Regex,
}

/// Ordered (pattern, category) rules
pub struct PathClassifier {
    rules: Vec<Rule>,
}

const RULES: [(EndpointCategory, &str); 6] = [
    (
        EndpointCategory::SearchResult,
        r"^/search/(?P<entity>\w+)/\{(?P<id>\w+)\}$",
    ),
    (EndpointCategory::Search, r"^/search/(?P<entity>\w+)$"),
    (EndpointCategory::Entities, r"^/(?P<entity>\w+)$"),
    (EndpointCategory::Entity, r"^/(?P<entity>\w+)/\{(?P<id>\w+)\}$"),
    (EndpointCategory::Table, r"^/(?P<entity>\w+)/table$"),
    (
        EndpointCategory::SubPath,
        r"^/(?P<entity>\w+)/\{(?P<id>\w+)\}/(?P<sub>\w+)$",
    ),
];

impl PathClassifier {
    pub fn new() -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|(category, pattern)| {
                Regex::new(pattern)
                    .map(|pattern| Rule {
                        category: *category,
                        pattern,
                    })
                    .map_err(|e| {
                        AnalyserError::Configuration(format!(
                            "invalid {category} pattern '{pattern}': {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Classify a path; `None` when no pattern matches
    ///
    /// # Examples
    /// ```
    /// use brapi_conformance_common::EndpointCategory;
    /// use brapi_conformance_parser::PathClassifier;
    ///
    /// let classifier = PathClassifier::new().unwrap();
    /// let studies = classifier.classify("/studies/{studyDbId}").unwrap();
    /// assert_eq!(studies.category, EndpointCategory::Entity);
    /// assert_eq!(studies.id_parameter.as_deref(), Some("studyDbId"));
    /// ```
    pub fn classify(&self, path: &str) -> Option<Classification> {
        self.rules.iter().find_map(|rule| {
            rule.pattern
                .captures(path)
                .map(|captures| Self::classification(rule.category, &captures))
        })
    }

    fn classification(category: EndpointCategory, captures: &Captures<'_>) -> Classification {
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());

        Classification {
            category,
            entity_segment: group("entity").unwrap_or_default(),
            id_parameter: group("id"),
            sub_entity_segment: group("sub"),
        }
    }
}
