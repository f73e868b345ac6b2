//! Variable substitution into request paths, query strings and bodies

use crate::store::VariableStore;
use brapi_conformance_common::{AnalyserError, ApiRequest, BodyTemplate, Result};
use serde_json::{Map, Value};

/// Fill every `{token}` of the path template from the store
///
/// Scalars are URL-encoded; arrays and objects are JSON-encoded first. Any
/// token still present afterwards fails the request, and the error lists
/// all of them.
pub fn substitute_path(request: &ApiRequest, store: &VariableStore) -> Result<String> {
    let mut path = request.path_template.clone();

    for parameter in &request.path_parameters {
        if let Ok(value) = store.get(&parameter.variable_name) {
            let token = format!("{{{}}}", parameter.parameter_name);
            path = path.replace(&token, &encode_segment(&value.value));
        }
    }

    let unresolved = placeholders(&path);
    if unresolved.is_empty() {
        Ok(path)
    } else {
        Err(AnalyserError::VariableResolution {
            request: request.name.clone(),
            unresolved,
        })
    }
}

/// Query pairs, unencoded; the URL builder encodes them
pub fn substitute_query(
    request: &ApiRequest,
    store: &VariableStore,
) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut unresolved = Vec::new();

    for parameter in &request.query_parameters {
        match store.get(&parameter.variable_name) {
            Ok(value) => pairs.push((parameter.parameter_name.clone(), text(&value.value))),
            Err(_) => unresolved.push(format!("{{{}}}", parameter.parameter_name)),
        }
    }

    if unresolved.is_empty() {
        Ok(pairs)
    } else {
        Err(AnalyserError::VariableResolution {
            request: request.name.clone(),
            unresolved,
        })
    }
}

/// Concrete JSON body, or `None` when the request carries no body
pub fn substitute_body(request: &ApiRequest, store: &VariableStore) -> Result<Option<Value>> {
    let Some(template) = &request.body else {
        return Ok(None);
    };

    let mut unresolved = Vec::new();
    let body = fill(template, store, &mut unresolved);

    if unresolved.is_empty() {
        Ok(Some(body))
    } else {
        Err(AnalyserError::VariableResolution {
            request: request.name.clone(),
            unresolved,
        })
    }
}

fn fill(template: &BodyTemplate, store: &VariableStore, unresolved: &mut Vec<String>) -> Value {
    match template {
        BodyTemplate::Scalar(value) => value.clone(),
        BodyTemplate::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), fill(value, store, unresolved)))
                .collect::<Map<String, Value>>(),
        ),
        BodyTemplate::List(items) => Value::Array(
            items
                .iter()
                .map(|item| fill(item, store, unresolved))
                .collect(),
        ),
        BodyTemplate::Parameter(parameter) => match store.get(&parameter.variable_name) {
            Ok(value) => value.value.clone(),
            Err(_) => {
                unresolved.push(format!("{{{}}}", parameter.parameter_name));
                Value::Null
            }
        },
    }
}

/// Strings as-is, everything else as JSON text
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Percent-encode a value for use as one path segment
fn encode_segment(value: &Value) -> String {
    url::form_urlencoded::byte_serialize(text(value).as_bytes())
        .collect::<String>()
        // form encoding turns spaces into '+', which a path keeps literally
        .replace('+', "%20")
}

/// Every `{...}` token in `path`, in order
pub fn placeholders(path: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = path;

    while let Some(start) = rest.find('{') {
        match rest[start..].find('}') {
            Some(end) => {
                tokens.push(rest[start..start + end + 1].to_string());
                rest = &rest[start + end + 1..];
            }
            None => break,
        }
    }

    tokens
}
