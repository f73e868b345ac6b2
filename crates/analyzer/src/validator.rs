//! OpenAPI contract validation of request/response exchanges
//!
//! Built once per run from the raw document text. Schemas are compiled with
//! `jsonschema` the first time an exchange needs them and cached for the rest
//! of the run. OpenAPI 3.0 documents are validated as Draft 4 after
//! `nullable: true` has been folded into the `type` keyword; 3.1 documents
//! are validated as Draft 2020-12.

use brapi_conformance_common::{AnalyserError, HttpMethod, Level, Result, ValidationMessage};
use jsonschema::{Draft, Validator};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const OPERATION_NOT_FOUND: &str = "validation.request.operation.notFound";
pub const REQUEST_BODY_SCHEMA: &str = "validation.request.body.schema";
pub const STATUS_UNKNOWN: &str = "validation.response.status.unknown";
pub const CONTENT_TYPE_NOT_ALLOWED: &str = "validation.response.contentType.notAllowed";
pub const BODY_MISSING: &str = "validation.response.body.missing";
pub const BODY_INVALID_JSON: &str = "validation.response.body.invalidJson";
pub const BODY_SCHEMA: &str = "validation.response.body.schema";

/// One request/response pair as seen on the wire
#[derive(Debug, Clone)]
pub struct Exchange<'a> {
    pub method: HttpMethod,
    /// Concrete path relative to the server base URL, without query
    pub path: &'a str,
    /// Declared path the request was built from; matched against `path` when absent
    pub path_template: Option<&'a str>,
    pub request_body: Option<&'a Value>,
    pub status: u16,
    pub content_type: Option<&'a str>,
    pub body: &'a str,
}

struct Route {
    template: String,
    pattern: Regex,
    placeholders: usize,
}

/// Checks exchanges against the document's operations
pub struct OpenApiValidator {
    document: Value,
    draft: Draft,
    /// Literal paths before templated ones
    routes: Vec<Route>,
    compiled: Mutex<HashMap<String, Arc<Validator>>>,
}

impl OpenApiValidator {
    /// Build from the document text (JSON or YAML)
    pub fn new(source: &str) -> Result<Self> {
        let mut document: Value = if source.trim_start().starts_with('{') {
            serde_json::from_str(source).map_err(|e| {
                AnalyserError::Parse(format!("Failed to parse OpenAPI JSON: {e}"))
            })?
        } else {
            serde_yaml::from_str(source).map_err(|e| {
                AnalyserError::Parse(format!("Failed to parse OpenAPI YAML: {e}"))
            })?
        };

        let version = document
            .get("openapi")
            .and_then(Value::as_str)
            .unwrap_or("3.0.0");
        let draft = if version.starts_with("3.1") {
            Draft::Draft202012
        } else {
            fold_nullable(&mut document);
            Draft::Draft4
        };

        let templates: Vec<String> = document
            .get("paths")
            .and_then(Value::as_object)
            .map(|paths| paths.keys().cloned().collect())
            .unwrap_or_default();

        let mut routes = templates
            .iter()
            .map(|template| route(template))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AnalyserError::Parse(format!("Failed to compile path pattern: {e}")))?;
        routes.sort_by(|a, b| {
            a.placeholders
                .cmp(&b.placeholders)
                .then_with(|| a.template.cmp(&b.template))
        });

        Ok(Self {
            document,
            draft,
            routes,
            compiled: Mutex::new(HashMap::new()),
        })
    }

    /// Every finding for one exchange; empty when it conforms
    pub fn validate(&self, exchange: &Exchange<'_>) -> Vec<ValidationMessage> {
        let mut messages = Vec::new();

        let Some(operation) = self.operation(exchange) else {
            messages.push(ValidationMessage::new(
                OPERATION_NOT_FOUND,
                Level::Error,
                format!(
                    "No operation declared for {} {}",
                    exchange.method, exchange.path
                ),
            ));
            return messages;
        };

        if let Some(body) = exchange.request_body {
            self.check_request_body(&operation, body, &mut messages);
        }

        self.check_response(&operation, exchange, &mut messages);
        messages
    }

    /// JSON pointer of the operation serving the exchange
    fn operation(&self, exchange: &Exchange<'_>) -> Option<String> {
        let method = exchange.method.openapi_key();
        if let Some(template) = exchange.path_template {
            let pointer = format!("/paths/{}/{method}", escape_pointer(template));
            return self.document.pointer(&pointer).map(|_| pointer);
        }

        let path = exchange.path.split('?').next().unwrap_or(exchange.path);
        self.routes
            .iter()
            .filter(|route| route.pattern.is_match(path))
            .map(|route| format!("/paths/{}/{method}", escape_pointer(&route.template)))
            .find(|pointer| self.document.pointer(pointer).is_some())
    }

    fn check_request_body(
        &self,
        operation: &str,
        body: &Value,
        messages: &mut Vec<ValidationMessage>,
    ) {
        let Some((request_body, value)) = self.resolve(format!("{operation}/requestBody")) else {
            return;
        };
        let Some(media) = json_media_key(value.get("content")) else {
            return;
        };

        let schema = format!("{request_body}/content/{}/schema", escape_pointer(&media));
        for violation in self.violations(&schema, body) {
            messages.push(ValidationMessage::new(
                REQUEST_BODY_SCHEMA,
                Level::Error,
                violation,
            ));
        }
    }

    fn check_response(
        &self,
        operation: &str,
        exchange: &Exchange<'_>,
        messages: &mut Vec<ValidationMessage>,
    ) {
        let Some(status_key) = self.status_key(operation, exchange.status) else {
            messages.push(ValidationMessage::new(
                STATUS_UNKNOWN,
                Level::Error,
                format!("Response status {} is not declared", exchange.status),
            ));
            return;
        };

        let Some((response, value)) =
            self.resolve(format!("{operation}/responses/{}", escape_pointer(&status_key)))
        else {
            return;
        };

        let content = match value.get("content").and_then(Value::as_object) {
            Some(content) if !content.is_empty() => content,
            _ => return,
        };

        if let Some(content_type) = exchange.content_type {
            let media_type = content_type
                .split(';')
                .next()
                .unwrap_or(content_type)
                .trim()
                .to_ascii_lowercase();
            if !content.keys().any(|declared| media_matches(declared, &media_type)) {
                messages.push(ValidationMessage::new(
                    CONTENT_TYPE_NOT_ALLOWED,
                    Level::Warn,
                    format!(
                        "Response content type '{media_type}' is not one of: {}",
                        content.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
        }

        let Some(media) = json_media_key(value.get("content")) else {
            return;
        };
        let schema = format!("{response}/content/{}/schema", escape_pointer(&media));
        if self.document.pointer(&schema).is_none() {
            return;
        }

        if exchange.body.trim().is_empty() {
            messages.push(ValidationMessage::new(
                BODY_MISSING,
                Level::Error,
                format!("Response {} declares a body but none was sent", status_key),
            ));
            return;
        }

        let body: Value = match serde_json::from_str(exchange.body) {
            Ok(body) => body,
            Err(e) => {
                messages.push(ValidationMessage::new(
                    BODY_INVALID_JSON,
                    Level::Error,
                    format!("Response body is not valid JSON: {e}"),
                ));
                return;
            }
        };

        for violation in self.violations(&schema, &body) {
            messages.push(ValidationMessage::new(BODY_SCHEMA, Level::Error, violation));
        }
    }

    /// Declared response key for a status: exact code, then `NXX`, then `default`
    fn status_key(&self, operation: &str, status: u16) -> Option<String> {
        let responses = self
            .document
            .pointer(&format!("{operation}/responses"))?
            .as_object()?;

        let exact = status.to_string();
        let range = format!("{}XX", status / 100);

        responses
            .keys()
            .find(|key| **key == exact)
            .or_else(|| responses.keys().find(|key| key.eq_ignore_ascii_case(&range)))
            .or_else(|| responses.keys().find(|key| *key == "default"))
            .cloned()
    }

    /// Follow local `$ref`s from `pointer`, returning the final pointer and value
    fn resolve(&self, mut pointer: String) -> Option<(String, &Value)> {
        for _ in 0..8 {
            let value = self.document.pointer(&pointer)?;
            match value.get("$ref").and_then(Value::as_str) {
                Some(reference) if reference.starts_with("#/") => {
                    pointer = reference[1..].to_string();
                }
                _ => return Some((pointer, value)),
            }
        }
        None
    }

    /// Schema violations of `instance` against the schema at `pointer`
    fn violations(&self, pointer: &str, instance: &Value) -> Vec<String> {
        let Some(validator) = self.compiled(pointer) else {
            return Vec::new();
        };

        validator
            .iter_errors(instance)
            .map(|error| {
                let location = error.instance_path.to_string();
                if location.is_empty() {
                    format!("(root): {error}")
                } else {
                    format!("{location}: {error}")
                }
            })
            .collect()
    }

    fn compiled(&self, pointer: &str) -> Option<Arc<Validator>> {
        let mut compiled = self
            .compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(validator) = compiled.get(pointer) {
            return Some(Arc::clone(validator));
        }

        let schema = self.document.pointer(pointer)?;
        // components ride along so `#/components/...` refs resolve from the root
        let wrapper = json!({
            "allOf": [schema],
            "components": self.document.get("components").cloned().unwrap_or(Value::Null),
        });

        let mut options = jsonschema::options();
        options.with_draft(self.draft);
        match options.build(&wrapper) {
            Ok(validator) => {
                let validator = Arc::new(validator);
                compiled.insert(pointer.to_string(), Arc::clone(&validator));
                Some(validator)
            }
            Err(e) => {
                tracing::warn!(schema = pointer, "schema does not compile: {e}");
                None
            }
        }
    }
}

fn route(template: &str) -> std::result::Result<Route, regex::Error> {
    let mut pattern = String::from("^");
    let mut placeholders = 0;
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..start]));
        pattern.push_str("[^/]+");
        placeholders += 1;
        rest = &rest[start + end + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    Ok(Route {
        template: template.to_string(),
        pattern: Regex::new(&pattern)?,
        placeholders,
    })
}

/// JSON pointer escaping of one reference token
fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Declared JSON media type in a `content` map
fn json_media_key(content: Option<&Value>) -> Option<String> {
    let content = content?.as_object()?;
    if content.contains_key("application/json") {
        return Some("application/json".to_string());
    }
    content.keys().find(|key| key.contains("json")).cloned()
}

fn media_matches(declared: &str, actual: &str) -> bool {
    let declared = declared.to_ascii_lowercase();
    if declared == actual || declared == "*/*" {
        return true;
    }
    match declared.strip_suffix("/*") {
        Some(kind) => actual.split('/').next() == Some(kind),
        None => false,
    }
}

/// Rewrite `nullable: true` into a `null` alternative of `type`
fn fold_nullable(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("nullable").and_then(Value::as_bool) == Some(true) {
                if let Some(Value::String(kind)) = map.get("type").cloned() {
                    map.insert("type".to_string(), json!([kind, "null"]));
                }
            }
            for child in map.values_mut() {
                fold_nullable(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                fold_nullable(item);
            }
        }
        _ => {}
    }
}
