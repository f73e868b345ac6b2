//! Build-time and run-time data model
//!
//! `Endpoint`, `Parameter`, `Variable` and `ApiRequest` are produced once per
//! analysis from the OpenAPI document and never change afterwards.
//! `VariableValue` is produced while requests run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods the analyser knows how to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Lowercase key used by OpenAPI path items
    pub fn openapi_key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural category of an endpoint path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointCategory {
    /// Configured out-of-band, not tied to an entity
    Special,
    /// `/search/{entity}/{searchResultsDbId}`
    SearchResult,
    /// `/search/{entity}`
    Search,
    /// `/{entities}`
    Entities,
    /// `/{entities}/{entityDbId}`
    Entity,
    /// `/{entities}/table`
    Table,
    /// `/{entities}/{entityDbId}/{subEntities}`
    SubPath,
}

impl fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointCategory::Special => "Special",
            EndpointCategory::SearchResult => "Search Result",
            EndpointCategory::Search => "Search",
            EndpointCategory::Entities => "Entities",
            EndpointCategory::Entity => "Entity",
            EndpointCategory::Table => "Table",
            EndpointCategory::SubPath => "Sub-path",
        };
        f.write_str(name)
    }
}

/// Kind of request, which fixes its execution priority within an entity group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Special,
    List,
    Get,
    Search,
    SearchResults,
    Table,
    Create,
    Update,
    Delete,
}

impl RequestKind {
    pub const SPECIAL_INDEX: u32 = 0;
    pub const LIST_INDEX: u32 = 10;
    pub const GET_INDEX: u32 = 20;
    pub const SEARCH_INDEX: u32 = 30;
    pub const SEARCH_RESULTS_INDEX: u32 = 40;
    pub const TABLE_INDEX: u32 = 50;
    pub const CREATE_INDEX: u32 = 60;
    pub const UPDATE_INDEX: u32 = 70;
    pub const DELETE_INDEX: u32 = 80;

    /// Ordering weight; lower runs first
    pub fn index(&self) -> u32 {
        match self {
            RequestKind::Special => Self::SPECIAL_INDEX,
            RequestKind::List => Self::LIST_INDEX,
            RequestKind::Get => Self::GET_INDEX,
            RequestKind::Search => Self::SEARCH_INDEX,
            RequestKind::SearchResults => Self::SEARCH_RESULTS_INDEX,
            RequestKind::Table => Self::TABLE_INDEX,
            RequestKind::Create => Self::CREATE_INDEX,
            RequestKind::Update => Self::UPDATE_INDEX,
            RequestKind::Delete => Self::DELETE_INDEX,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Special => "Special",
            RequestKind::List => "List",
            RequestKind::Get => "Get",
            RequestKind::Search => "Search",
            RequestKind::SearchResults => "Search Results",
            RequestKind::Table => "Table",
            RequestKind::Create => "Create",
            RequestKind::Update => "Update",
            RequestKind::Delete => "Delete",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Diagnostic record for an endpoint that produced no request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    pub entity_name: Option<String>,
    /// `None` when the path matched no pattern at all
    pub category: Option<EndpointCategory>,
}

/// Where a parameter is placed in the HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    /// Placeholder leaf inside a body template
    Body,
}

/// Binds a request placeholder to a variable store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub parameter_name: String,
    pub variable_name: String,
    pub location: ParameterLocation,
}

impl Parameter {
    pub fn path(parameter_name: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            variable_name: variable_name.into(),
            location: ParameterLocation::Path,
        }
    }

    pub fn query(parameter_name: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            variable_name: variable_name.into(),
            location: ParameterLocation::Query,
        }
    }

    pub fn body(parameter_name: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            variable_name: variable_name.into(),
            location: ParameterLocation::Body,
        }
    }
}

/// Extraction rule evaluated against a request's own response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub variable_name: String,
    pub parameter_name: String,
    pub json_path: String,
    #[serde(default)]
    pub convert_to_list: bool,
}

/// A value extracted at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableValue {
    pub variable_name: String,
    pub parameter_name: String,
    pub value: serde_json::Value,
}

/// Request body template
///
/// Map and list nodes are walked recursively at run time; `Parameter`
/// leaves are replaced by the current value of the bound variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyTemplate {
    Scalar(serde_json::Value),
    Map(BTreeMap<String, BodyTemplate>),
    List(Vec<BodyTemplate>),
    Parameter(Parameter),
}

impl BodyTemplate {
    /// Every `Parameter` leaf in the template, depth first
    pub fn parameters(&self) -> Vec<&Parameter> {
        let mut found = Vec::new();
        self.collect_parameters(&mut found);
        found
    }

    fn collect_parameters<'a>(&'a self, found: &mut Vec<&'a Parameter>) {
        match self {
            BodyTemplate::Scalar(_) => {}
            BodyTemplate::Map(entries) => {
                for value in entries.values() {
                    value.collect_parameters(found);
                }
            }
            BodyTemplate::List(items) => {
                for item in items {
                    item.collect_parameters(found);
                }
            }
            BodyTemplate::Parameter(parameter) => found.push(parameter),
        }
    }
}

/// Catalog key: one request per method and path template
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestKey {
    pub method: HttpMethod,
    pub path: String,
}

impl RequestKey {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// An executable request derived from the OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub name: String,
    pub kind: RequestKind,
    /// Ordering weight, see [`RequestKind::index`]
    pub index: u32,
    /// `None` only for special requests
    pub entity_name: Option<String>,
    pub method: HttpMethod,
    pub path_template: String,
    #[serde(default)]
    pub path_parameters: Vec<Parameter>,
    #[serde(default)]
    pub query_parameters: Vec<Parameter>,
    #[serde(default)]
    pub body: Option<BodyTemplate>,
    #[serde(default)]
    pub cache_variables: Vec<Variable>,
    #[serde(default)]
    pub prerequisites: Vec<RequestKey>,
}

impl ApiRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, self.path_template.clone())
    }

    pub fn is_special(&self) -> bool {
        self.kind == RequestKind::Special
    }
}
