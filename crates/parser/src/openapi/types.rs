//! OpenAPI 3 document model
//!
//! Only the parts classification and request building read are modelled;
//! the validator works on the raw document instead.

use brapi_conformance_common::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiSpec {
    /// Document version, e.g. `3.0.0`
    pub openapi: String,

    pub info: Info,

    /// Paths in sorted order
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,

    #[serde(default)]
    pub components: Option<Components>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
}

/// A `$ref` into `components`, or the item itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    Reference {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    Item(T),
}

pub type SchemaOrRef = RefOr<Box<Schema>>;

/// Operations declared on one path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub get: Option<Operation>,
    #[serde(default)]
    pub post: Option<Operation>,
    #[serde(default)]
    pub put: Option<Operation>,
    #[serde(default)]
    pub patch: Option<Operation>,
    #[serde(default)]
    pub delete: Option<Operation>,

    /// Shared by every operation on the path
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,

    #[serde(rename = "requestBody", default)]
    pub request_body: Option<RefOr<RequestBody>>,

    /// Keyed by status code, `NXX` range or `default`
    #[serde(default)]
    pub responses: HashMap<String, RefOr<Response>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    /// `query`, `path`, `header` or `cookie`
    #[serde(rename = "in")]
    pub location: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub schema: Option<SchemaOrRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Keyed by media type
    #[serde(default)]
    pub content: HashMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub content: HashMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Option<SchemaOrRef>,
}

/// The schema keywords body templates and entity naming rely on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Names the entity a response carries, e.g. `StudyListResponse`
    #[serde(default)]
    pub title: Option<String>,

    #[serde(rename = "type", default)]
    pub schema_type: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, SchemaOrRef>,

    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub items: Option<Box<SchemaOrRef>>,

    #[serde(default)]
    pub example: Option<serde_json::Value>,

    #[serde(rename = "enum", default)]
    pub enum_values: Vec<serde_json::Value>,

    #[serde(rename = "allOf", default)]
    pub all_of: Vec<SchemaOrRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: HashMap<String, Schema>,

    #[serde(default)]
    pub parameters: HashMap<String, Parameter>,

    #[serde(rename = "requestBodies", default)]
    pub request_bodies: HashMap<String, RequestBody>,

    #[serde(default)]
    pub responses: HashMap<String, Response>,
}

/// Name of the component a `$ref` points at within `section`
///
/// `#/components/schemas/Study` in section `schemas` -> `Study`
pub fn component_name<'a>(ref_path: &'a str, section: &str) -> Option<&'a str> {
    ref_path
        .strip_prefix("#/components/")?
        .strip_prefix(section)?
        .strip_prefix('/')
}

impl OpenApiSpec {
    /// Schema named by a `#/components/schemas/...` reference
    pub fn resolve_schema_ref(&self, ref_path: &str) -> Option<&Schema> {
        let schema_name = component_name(ref_path, "schemas")?;
        self.components
            .as_ref()
            .and_then(|c| c.schemas.get(schema_name))
    }

    /// Follow at most one level of `$ref` for a schema
    pub fn schema<'a>(&'a self, schema_or_ref: &'a SchemaOrRef) -> Option<&'a Schema> {
        match schema_or_ref {
            RefOr::Item(schema) => Some(schema.as_ref()),
            RefOr::Reference { ref_path } => self.resolve_schema_ref(ref_path),
        }
    }

    pub fn parameter<'a>(&'a self, parameter: &'a RefOr<Parameter>) -> Option<&'a Parameter> {
        match parameter {
            RefOr::Item(parameter) => Some(parameter),
            RefOr::Reference { ref_path } => {
                let name = component_name(ref_path, "parameters")?;
                self.components.as_ref()?.parameters.get(name)
            }
        }
    }

    pub fn response<'a>(&'a self, response: &'a RefOr<Response>) -> Option<&'a Response> {
        match response {
            RefOr::Item(response) => Some(response),
            RefOr::Reference { ref_path } => {
                let name = component_name(ref_path, "responses")?;
                self.components.as_ref()?.responses.get(name)
            }
        }
    }

    pub fn request_body<'a>(&'a self, body: &'a RefOr<RequestBody>) -> Option<&'a RequestBody> {
        match body {
            RefOr::Item(body) => Some(body),
            RefOr::Reference { ref_path } => {
                let name = component_name(ref_path, "requestBodies")?;
                self.components.as_ref()?.request_bodies.get(name)
            }
        }
    }
}

impl PathItem {
    /// Declared operations in a fixed method order
    pub fn operations(&self) -> Vec<(HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, self.get.as_ref()),
            (HttpMethod::Post, self.post.as_ref()),
            (HttpMethod::Put, self.put.as_ref()),
            (HttpMethod::Patch, self.patch.as_ref()),
            (HttpMethod::Delete, self.delete.as_ref()),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.map(|op| (method, op)))
        .collect()
    }
}

/// JSON media type entry, if any
pub fn json_media_type(content: &HashMap<String, MediaType>) -> Option<&MediaType> {
    content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(media_type, _)| media_type.contains("json"))
                .map(|(_, media)| media)
        })
}
