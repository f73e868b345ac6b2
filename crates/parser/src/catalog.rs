//! Request catalog
//!
//! Built once per analysis from the OpenAPI document. Endpoints that produce
//! no request are kept as diagnostics; per-endpoint build failures are
//! collected and never stop the rest of the catalog from being built.

use crate::builder::{BuildOutcome, RequestBuilder};
use crate::classifier::PathClassifier;
use crate::openapi::OpenApiSpec;
use brapi_conformance_common::{
    AnalyserError, AnalysisOptions, ApiRequest, Endpoint, ErrorList, RequestKey, Result,
};
use std::collections::{BTreeMap, HashMap};

/// Executable requests keyed by method and path template, grouped by entity
#[derive(Debug, Default)]
pub struct RequestCatalog {
    /// Every request in insertion order
    requests: Vec<ApiRequest>,
    by_key: HashMap<RequestKey, usize>,
    /// Entity name -> indices into `requests`, in insertion order
    entity_groups: BTreeMap<String, Vec<usize>>,
    special: Vec<usize>,
    unmatched: Vec<Endpoint>,
    skipped: Vec<Endpoint>,
    errors: ErrorList,
}

impl RequestCatalog {
    /// Build the catalog for every path in the document
    ///
    /// Only a classifier that cannot be constructed fails the build; every
    /// per-endpoint problem is recorded in [`RequestCatalog::errors`].
    pub fn build(spec: &OpenApiSpec, options: &dyn AnalysisOptions) -> Result<Self> {
        let classifier = PathClassifier::new()?;
        let builder = RequestBuilder::new(spec, options);
        let mut catalog = Self::default();

        // BTreeMap iteration keeps path order stable between builds
        for (path, path_item) in &spec.paths {
            let outcomes = if let Some(special) = options
                .special_cases()
                .iter()
                .find(|special| &special.path == path)
            {
                builder.build_special(path, path_item, special)
            } else if let Some(classification) = classifier.classify(path) {
                tracing::debug!(path = %path, category = %classification.category, "classified");
                builder.build(path, path_item, &classification)
            } else {
                for (method, _) in path_item.operations() {
                    let error = AnalyserError::Classification {
                        method,
                        path: path.clone(),
                    };
                    tracing::debug!("{error}");
                    catalog.unmatched.push(Endpoint {
                        path: path.clone(),
                        method,
                        entity_name: None,
                        category: None,
                    });
                }
                continue;
            };

            for outcome in outcomes {
                catalog.record(outcome);
            }
        }

        tracing::info!(
            requests = catalog.requests.len(),
            entities = catalog.entity_groups.len(),
            skipped = catalog.skipped.len(),
            unmatched = catalog.unmatched.len(),
            errors = catalog.errors.len(),
            "catalog built"
        );

        Ok(catalog)
    }

    fn record(&mut self, outcome: Result<BuildOutcome>) {
        match outcome {
            Ok(BuildOutcome::Request(request)) => self.insert(request),
            Ok(BuildOutcome::Skipped(endpoint)) => {
                tracing::debug!(method = %endpoint.method, path = %endpoint.path, "skipped endpoint");
                self.skipped.push(endpoint);
            }
            Ok(BuildOutcome::Unsupported(endpoint)) => {
                tracing::debug!(method = %endpoint.method, path = %endpoint.path, "unsupported method");
                self.unmatched.push(endpoint);
            }
            Err(e) => {
                tracing::warn!("{e}");
                self.errors.push(e);
            }
        }
    }

    fn insert(&mut self, request: ApiRequest) {
        let position = self.requests.len();
        self.by_key.insert(request.key(), position);

        match &request.entity_name {
            Some(entity_name) if !request.is_special() => self
                .entity_groups
                .entry(entity_name.clone())
                .or_default()
                .push(position),
            _ => self.special.push(position),
        }

        self.requests.push(request);
    }

    pub fn get(&self, key: &RequestKey) -> Option<&ApiRequest> {
        self.by_key.get(key).map(|&position| &self.requests[position])
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Every request, in the order it was built
    pub fn requests(&self) -> &[ApiRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Entity names, sorted
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entity_groups.keys().map(String::as_str)
    }

    /// Requests of one entity in execution order
    ///
    /// Ascending index; requests with the same index keep catalog order.
    pub fn entity_group(&self, entity_name: &str) -> Option<Vec<&ApiRequest>> {
        let positions = self.entity_groups.get(entity_name)?;
        let mut group: Vec<&ApiRequest> = positions
            .iter()
            .map(|&position| &self.requests[position])
            .collect();
        // sort_by_key is stable
        group.sort_by_key(|request| request.index);
        Some(group)
    }

    /// Special requests, in catalog order
    pub fn special_requests(&self) -> Vec<&ApiRequest> {
        self.special
            .iter()
            .map(|&position| &self.requests[position])
            .collect()
    }

    /// Endpoints matching no pattern, or with a method their category lacks
    pub fn unmatched(&self) -> &[Endpoint] {
        &self.unmatched
    }

    /// Endpoints the analysis options turned off
    pub fn skipped(&self) -> &[Endpoint] {
        &self.skipped
    }

    /// Per-endpoint build failures
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }
}
