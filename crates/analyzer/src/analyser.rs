//! Analysis orchestration
//!
//! Special requests always run first, then each chosen entity group in
//! entity-name order. Within a group requests run by ascending index:
//! List < Get < Search < Search Results < Table < Create < Update < Delete.

use crate::executor::{RequestExecutor, RunContext};
use crate::output;
use crate::summary::RunSummary;
use crate::validator::OpenApiValidator;
use brapi_conformance_common::{
    AnalyserError, AnalysisReport, ApiRequest, AuthorizationProvider, OptionsFile,
    PrerequisiteStrategy, Result,
};
use brapi_conformance_parser::{OpenApiParser, RequestCatalog};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Runs the request catalog of one OpenAPI document against one server
pub struct Analyser {
    catalog: RequestCatalog,
    validator: OpenApiValidator,
    client: reqwest::Client,
    base_url: Url,
    authorization: Box<dyn AuthorizationProvider>,
    strategy: PrerequisiteStrategy,
}

/// Reports of one run, in execution order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub reports: Vec<AnalysisReport>,
    /// The run stopped early on cancellation
    pub cancelled: bool,
}

impl Analyser {
    /// Validate the options and prepare everything a run needs
    ///
    /// Fails before any network traffic when the options are unusable.
    pub fn new(
        parser: &OpenApiParser,
        options: &OptionsFile,
        authorization: Box<dyn AuthorizationProvider>,
    ) -> Result<Self> {
        options
            .validate()
            .map_err(|errors| AnalyserError::Configuration(errors.to_string()))?;

        let base_url = options.base_url()?;
        let catalog = RequestCatalog::build(parser.spec(), options)?;
        let validator = OpenApiValidator::new(parser.source())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| {
                AnalyserError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        tracing::info!(
            base_url = %base_url,
            requests = catalog.len(),
            strategy = ?options.prerequisite_strategy,
            "analyser ready"
        );

        Ok(Self {
            catalog,
            validator,
            client,
            base_url,
            authorization,
            strategy: options.prerequisite_strategy,
        })
    }

    pub fn catalog(&self) -> &RequestCatalog {
        &self.catalog
    }

    /// Special requests, then every entity group
    pub async fn analyse_all(&self, cancel: CancellationToken) -> AnalysisOutcome {
        let entity_names: Vec<&str> = self.catalog.entity_names().collect();
        self.run(&entity_names, cancel).await
    }

    /// Special requests, then the named entity groups
    ///
    /// An unknown entity name is a configuration error raised before anything
    /// is sent.
    pub async fn analyse_entities(
        &self,
        entity_names: &[String],
        cancel: CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let unknown: Vec<&str> = entity_names
            .iter()
            .map(String::as_str)
            .filter(|name| self.catalog.entity_group(name).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(AnalyserError::Configuration(format!(
                "Unknown entities: {}",
                unknown.join(", ")
            )));
        }

        let mut names: Vec<&str> = Vec::new();
        for name in entity_names {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        Ok(self.run(&names, cancel).await)
    }

    /// Special requests, then one entity group
    pub async fn analyse_entity(
        &self,
        entity_name: &str,
        cancel: CancellationToken,
    ) -> Result<AnalysisOutcome> {
        self.analyse_entities(&[entity_name.to_string()], cancel)
            .await
    }

    /// Special requests only
    pub async fn analyse_special(&self, cancel: CancellationToken) -> AnalysisOutcome {
        self.run(&[], cancel).await
    }

    async fn run(&self, entity_names: &[&str], cancel: CancellationToken) -> AnalysisOutcome {
        let executor = RequestExecutor::new(
            &self.catalog,
            &self.client,
            &self.base_url,
            &self.validator,
            self.authorization.as_ref(),
            self.strategy,
        );
        let mut context = RunContext::new(cancel);

        let mut scheduled: Vec<&ApiRequest> = self.catalog.special_requests();
        for name in entity_names {
            scheduled.extend(self.catalog.entity_group(name).unwrap_or_default());
        }

        let mut reports = Vec::with_capacity(scheduled.len());
        for request in scheduled {
            if context.is_cancelled() {
                tracing::info!(completed = reports.len(), "run cancelled");
                return AnalysisOutcome {
                    reports,
                    cancelled: true,
                };
            }

            let report = executor.execute(request, &mut context).await;
            let stop = report.error_key() == Some(AnalysisReport::CANCELLED);
            reports.push(report);

            if stop {
                tracing::info!(completed = reports.len(), "run cancelled");
                return AnalysisOutcome {
                    reports,
                    cancelled: true,
                };
            }
        }

        AnalysisOutcome {
            reports,
            cancelled: false,
        }
    }
}

impl AnalysisOutcome {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_reports(&self.reports)
    }

    /// Plain-text rendering
    pub fn to_text(&self) -> Result<String> {
        output::generate_text(self)
    }

    /// Write the outcome as pretty JSON
    pub fn write_json(&self, output_path: &Path) -> Result<()> {
        let json = output::generate_json(self)?;
        fs::write(output_path, json)?;
        Ok(())
    }
}
