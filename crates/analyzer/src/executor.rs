//! Executes one catalog request against the server
//!
//! Steps, in order:
//! 1. Run prerequisites (recursively, through this same executor)
//! 2. Substitute path, query and body from the variable store
//! 3. Authorize
//! 4. Send, bounded by the client timeout and the run's cancellation token
//! 5. Extract cache variables from a 2xx response
//! 6. Validate the exchange against the OpenAPI document
//!
//! Every failure ends in a report; nothing here aborts the run.

use crate::store::VariableStore;
use crate::substitution::{substitute_body, substitute_path, substitute_query};
use crate::validator::{Exchange, OpenApiValidator};
use brapi_conformance_common::{
    AnalyserError, AnalysisReport, ApiRequest, AuthorizationProvider, HttpMethod, Level,
    PrerequisiteStrategy, ReportError, RequestKey, Result, ValidationMessage, VariableValue,
};
use brapi_conformance_parser::RequestCatalog;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use serde_json_path::JsonPath;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const EXTRACTION_INVALID_JSON: &str = "extraction.invalidJson";
pub const EXTRACTION_INVALID_PATH: &str = "extraction.invalidPath";
pub const EXTRACTION_NO_MATCH: &str = "extraction.noMatch";

type BoxFuture<'r, T> = Pin<Box<dyn Future<Output = T> + Send + 'r>>;

/// State shared by every request of one run
pub struct RunContext {
    pub store: VariableStore,
    cancel: CancellationToken,
    /// Success of every request executed so far, by key
    outcomes: HashMap<RequestKey, bool>,
    /// Requests currently resolving prerequisites
    in_progress: HashSet<RequestKey>,
}

impl RunContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            store: VariableStore::new(),
            cancel,
            outcomes: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct RequestExecutor<'a> {
    catalog: &'a RequestCatalog,
    client: &'a reqwest::Client,
    base_url: &'a Url,
    validator: &'a OpenApiValidator,
    authorization: &'a dyn AuthorizationProvider,
    strategy: PrerequisiteStrategy,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(
        catalog: &'a RequestCatalog,
        client: &'a reqwest::Client,
        base_url: &'a Url,
        validator: &'a OpenApiValidator,
        authorization: &'a dyn AuthorizationProvider,
        strategy: PrerequisiteStrategy,
    ) -> Self {
        Self {
            catalog,
            client,
            base_url,
            validator,
            authorization,
            strategy,
        }
    }

    /// Execute a request and everything it depends on
    ///
    /// Boxed because prerequisites recurse through here.
    pub fn execute<'r>(
        &'r self,
        request: &'r ApiRequest,
        context: &'r mut RunContext,
    ) -> BoxFuture<'r, AnalysisReport> {
        Box::pin(async move {
            let key = request.key();
            context.in_progress.insert(key.clone());
            let report = self.run(request, context).await;
            context.in_progress.remove(&key);
            context.outcomes.insert(key, report.is_success());
            report
        })
    }

    async fn run(&self, request: &ApiRequest, context: &mut RunContext) -> AnalysisReport {
        let cancel = context.cancel.clone();
        if cancel.is_cancelled() {
            return cancelled(request, None, Utc::now());
        }

        let resolution_start = Utc::now();
        let failures = self.resolve_prerequisites(request, context).await;
        if cancel.is_cancelled() {
            return cancelled(request, None, resolution_start);
        }
        if !failures.is_empty() {
            let message = failures.join("; ");
            tracing::warn!(request = %request.name, "{message}");
            return AnalysisReport::failed(
                request.clone(),
                None,
                resolution_start,
                report_error(AnalysisReport::PRE_EXECUTION, Level::Warn, message),
            );
        }

        let start = Utc::now();
        let resolved = substitute_path(request, &context.store).and_then(|path| {
            let query = substitute_query(request, &context.store)?;
            let body = substitute_body(request, &context.store)?;
            let url = self.url(&path, &query)?;
            Ok((path, url, body))
        });
        let (path, url, body) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(request = %request.name, "{e}");
                return AnalysisReport::failed(
                    request.clone(),
                    None,
                    start,
                    report_error(AnalysisReport::PRE_EXECUTION, Level::Warn, e.to_string()),
                );
            }
        };

        let header = match self.authorization.authorization() {
            Ok(Some(value)) => Some(value),
            Ok(None) if self.authorization.required() => {
                return AnalysisReport::failed(
                    request.clone(),
                    Some(url.to_string()),
                    start,
                    report_error(
                        AnalysisReport::AUTHORIZATION,
                        Level::Error,
                        "Authorization is required but no value was produced".to_string(),
                    ),
                );
            }
            Ok(None) => None,
            Err(e) => {
                return AnalysisReport::failed(
                    request.clone(),
                    Some(url.to_string()),
                    start,
                    report_error(AnalysisReport::AUTHORIZATION, Level::Error, e.to_string()),
                );
            }
        };

        let mut builder = self
            .client
            .request(reqwest_method(request.method), url.clone());
        if let Some(header) = header {
            builder = builder.header(AUTHORIZATION, header);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        tracing::info!(request = %request.name, method = %request.method, uri = %url, "sending");

        let sent = tokio::select! {
            _ = cancel.cancelled() => return cancelled(request, Some(url.to_string()), start),
            sent = builder.send() => sent,
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => return transport_failure(request, &url, start, &e),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let text = tokio::select! {
            _ = cancel.cancelled() => return cancelled(request, Some(url.to_string()), start),
            text = response.text() => text,
        };
        let text = match text {
            Ok(text) => text,
            Err(e) => return transport_failure(request, &url, start, &e),
        };
        let end = Utc::now();

        tracing::info!(request = %request.name, status, "received");

        let mut messages = Vec::new();
        if (200..300).contains(&status) && !request.cache_variables.is_empty() {
            messages.extend(extract_variables(request, &text, &mut context.store));
        }

        messages.extend(self.validator.validate(&Exchange {
            method: request.method,
            path: &path,
            path_template: Some(&request.path_template),
            request_body: body.as_ref(),
            status,
            content_type: content_type.as_deref(),
            body: &text,
        }));

        AnalysisReport::completed(
            request.clone(),
            url.to_string(),
            start,
            end,
            status,
            messages,
        )
    }

    /// Run every prerequisite; returns one message per failed prerequisite
    async fn resolve_prerequisites(
        &self,
        request: &ApiRequest,
        context: &mut RunContext,
    ) -> Vec<String> {
        let mut failures = Vec::new();

        for key in &request.prerequisites {
            if context.is_cancelled() {
                break;
            }

            if context.in_progress.contains(key) {
                failures.push(
                    AnalyserError::VariableResolution {
                        request: request.name.clone(),
                        unresolved: vec![format!("circular prerequisite {key}")],
                    }
                    .to_string(),
                );
                continue;
            }

            let Some(prerequisite) = self.catalog.get(key) else {
                failures.push(format!("Prerequisite {key} is not in the catalog"));
                continue;
            };

            if self.strategy == PrerequisiteStrategy::Once {
                if let Some(&succeeded) = context.outcomes.get(key) {
                    if !succeeded {
                        failures.push(format!("Prerequisite {key} failed earlier in this run"));
                    }
                    continue;
                }
            }

            tracing::debug!(request = %request.name, prerequisite = %key, "running prerequisite");
            let report = self.execute(prerequisite, context).await;
            if !report.is_success() {
                failures.push(format!("Prerequisite {key} failed: {}", describe(&report)));
            }
        }

        failures
    }

    /// Base URL joined with the substituted path and query
    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}")).map_err(|e| {
            AnalyserError::Configuration(format!("Cannot build URL for {path}: {e}"))
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

/// Apply the request's cache variables to its response body
///
/// Problems become WARN findings; they never fail the request.
fn extract_variables(
    request: &ApiRequest,
    body: &str,
    store: &mut VariableStore,
) -> Vec<ValidationMessage> {
    let mut messages = Vec::new();

    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            messages.push(ValidationMessage::new(
                EXTRACTION_INVALID_JSON,
                Level::Warn,
                format!("Cannot extract variables, body is not JSON: {e}"),
            ));
            return messages;
        }
    };

    for variable in &request.cache_variables {
        let path = match JsonPath::parse(&variable.json_path) {
            Ok(path) => path,
            Err(e) => {
                messages.push(ValidationMessage::new(
                    EXTRACTION_INVALID_PATH,
                    Level::Warn,
                    format!("Invalid JSONPath '{}': {e}", variable.json_path),
                ));
                continue;
            }
        };

        match path.query(&json).first() {
            Some(found) => {
                let value = if variable.convert_to_list {
                    Value::Array(vec![found.clone()])
                } else {
                    found.clone()
                };
                store.put(VariableValue {
                    variable_name: variable.variable_name.clone(),
                    parameter_name: variable.parameter_name.clone(),
                    value,
                });
            }
            None => {
                tracing::warn!(request = %request.name, variable = %variable.variable_name, "no value at {}", variable.json_path);
                messages.push(ValidationMessage::new(
                    EXTRACTION_NO_MATCH,
                    Level::Warn,
                    format!(
                        "No value for '{}' at {}",
                        variable.variable_name, variable.json_path
                    ),
                ));
            }
        }
    }

    messages
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn report_error(key: &str, level: Level, message: String) -> ReportError {
    ReportError {
        key: key.to_string(),
        level,
        message,
    }
}

fn cancelled(request: &ApiRequest, uri: Option<String>, start: DateTime<Utc>) -> AnalysisReport {
    tracing::info!(request = %request.name, "cancelled");
    AnalysisReport::failed(
        request.clone(),
        uri,
        start,
        report_error(
            AnalysisReport::CANCELLED,
            Level::Warn,
            "Run was cancelled".to_string(),
        ),
    )
}

fn transport_failure(
    request: &ApiRequest,
    url: &Url,
    start: DateTime<Utc>,
    error: &reqwest::Error,
) -> AnalysisReport {
    let error = AnalyserError::Transport {
        request: request.name.clone(),
        message: error.to_string(),
    };
    tracing::warn!("{error}");
    AnalysisReport::failed(
        request.clone(),
        Some(url.to_string()),
        start,
        report_error(AnalysisReport::TRANSPORT, Level::Error, error.to_string()),
    )
}

fn describe(report: &AnalysisReport) -> String {
    match (&report.error, report.status_code) {
        (Some(error), _) => error.message.clone(),
        (None, Some(status)) => format!("status {status}"),
        (None, None) => "no response".to_string(),
    }
}
