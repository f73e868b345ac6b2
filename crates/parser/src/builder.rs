//! Builds executable requests for classified endpoints
//!
//! Each declared HTTP method of a path becomes at most one [`ApiRequest`].
//! Which kind of request it is follows from the path category and the method:
//! - Entities: GET → List, POST → Create
//! - Entity: GET → Get, PUT → Update, DELETE → Delete
//! - Search: POST → Search
//! - Search Result: GET → Search Results
//! - Table: GET → Table
//! - Sub-path: GET → List (with a prerequisite on the parent list)

use crate::classifier::Classification;
use crate::naming::{entity_name_from_segment, entity_name_from_title, lower_first};
use crate::openapi::{
    component_name, json_media_type, OpenApiSpec, Operation, PathItem, RefOr, Schema,
    SchemaOrRef,
};
use brapi_conformance_common::{
    AnalyserError, AnalysisOptions, ApiRequest, BodyTemplate, Endpoint, EndpointCategory,
    HttpMethod, Parameter, RequestKey, RequestKind, Result, SpecialCase, Variable,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const COMMON_CROP_NAME: &str = "commonCropName";
const COMMON_CROP_NAMES: &str = "commonCropNames";

/// What happened to one (path, method) pair
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// An executable request
    Request(ApiRequest),
    /// Disabled by the analysis options
    Skipped(Endpoint),
    /// The path category has no handler for this method
    Unsupported(Endpoint),
}

/// Builds requests from the OpenAPI document according to the analysis options
pub struct RequestBuilder<'a> {
    spec: &'a OpenApiSpec,
    options: &'a dyn AnalysisOptions,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(spec: &'a OpenApiSpec, options: &'a dyn AnalysisOptions) -> Self {
        Self { spec, options }
    }

    /// Build requests for every method of a classified path
    pub fn build(
        &self,
        path: &str,
        path_item: &PathItem,
        classification: &Classification,
    ) -> Vec<Result<BuildOutcome>> {
        let entity_name = self.entity_name_for(path, path_item, classification);

        path_item
            .operations()
            .into_iter()
            .map(|(method, operation)| {
                let Some(kind) = request_kind(classification.category, method) else {
                    return Ok(BuildOutcome::Unsupported(Endpoint {
                        path: path.to_string(),
                        method,
                        entity_name: Some(entity_name.clone()),
                        category: Some(classification.category),
                    }));
                };

                if !self.options.is_analysing(kind, &entity_name) {
                    return Ok(BuildOutcome::Skipped(Endpoint {
                        path: path.to_string(),
                        method,
                        entity_name: Some(entity_name.clone()),
                        category: Some(classification.category),
                    }));
                }

                self.entity_request(
                    path,
                    path_item,
                    method,
                    operation,
                    kind,
                    &entity_name,
                    classification,
                )
                .map(BuildOutcome::Request)
            })
            .collect()
    }

    /// Build requests for a configured special-case path
    pub fn build_special(
        &self,
        path: &str,
        path_item: &PathItem,
        special: &SpecialCase,
    ) -> Vec<Result<BuildOutcome>> {
        path_item
            .operations()
            .into_iter()
            .map(|(method, operation)| -> Result<BuildOutcome> {
                let request_name = format!("{} {}", RequestKind::Special, path);
                let request = ApiRequest {
                    name: request_name.clone(),
                    kind: RequestKind::Special,
                    index: RequestKind::Special.index(),
                    entity_name: None,
                    method,
                    path_template: path.to_string(),
                    path_parameters: placeholder_parameters(path, |token| {
                        Parameter::path(token, token)
                    }),
                    query_parameters: self.query_parameters(
                        &request_name,
                        path_item,
                        operation,
                    )?,
                    body: self.body_template(
                        &request_name,
                        RequestKind::Special,
                        method,
                        operation,
                    )?,
                    cache_variables: special.variables.clone(),
                    prerequisites: Vec::new(),
                };
                Ok(BuildOutcome::Request(request))
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn entity_request(
        &self,
        path: &str,
        path_item: &PathItem,
        method: HttpMethod,
        operation: &Operation,
        kind: RequestKind,
        entity_name: &str,
        classification: &Classification,
    ) -> Result<ApiRequest> {
        let name = match classification.category {
            EndpointCategory::SubPath => format!(
                "{} {} {}",
                kind,
                self.parent_entity_name(classification),
                entity_name_from_segment(
                    classification.sub_entity_segment.as_deref().unwrap_or_default()
                )
            ),
            _ => format!("{kind} {entity_name}"),
        };

        let path_parameters = self.path_parameters(path, entity_name, classification);
        let query_parameters = self.query_parameters(&name, path_item, operation)?;
        let body = self.body_template(&name, kind, method, operation)?;
        let cache_variables = self.cache_variables(kind, entity_name);

        let prerequisites = match classification.category {
            EndpointCategory::SubPath => vec![RequestKey::new(
                HttpMethod::Get,
                format!("/{}", classification.entity_segment),
            )],
            _ => Vec::new(),
        };

        Ok(ApiRequest {
            name,
            kind,
            index: kind.index(),
            entity_name: Some(entity_name.to_string()),
            method,
            path_template: path.to_string(),
            path_parameters,
            query_parameters,
            body,
            cache_variables,
            prerequisites,
        })
    }

    /// Entity name for a path, shared by all of its methods
    ///
    /// Prefers the title of a 2xx JSON response schema; falls back to the
    /// path segments.
    fn entity_name_for(
        &self,
        path: &str,
        path_item: &PathItem,
        classification: &Classification,
    ) -> String {
        path_item
            .operations()
            .into_iter()
            .find_map(|(_, operation)| self.response_title(operation))
            .and_then(|title| entity_name_from_title(&title))
            .unwrap_or_else(|| {
                let segment = match classification.category {
                    EndpointCategory::SubPath => classification
                        .sub_entity_segment
                        .as_deref()
                        .unwrap_or(&classification.entity_segment),
                    _ => &classification.entity_segment,
                };
                tracing::debug!(path, "no response title, naming entity from path");
                entity_name_from_segment(segment)
            })
    }

    /// Entity owning the collection a sub-path hangs off
    fn parent_entity_name(&self, classification: &Classification) -> String {
        let parent_path = format!("/{}", classification.entity_segment);
        self.spec
            .paths
            .get(&parent_path)
            .and_then(|item| {
                item.operations()
                    .into_iter()
                    .find_map(|(_, operation)| self.response_title(operation))
            })
            .and_then(|title| entity_name_from_title(&title))
            .unwrap_or_else(|| entity_name_from_segment(&classification.entity_segment))
    }

    /// Title of the 200 (or first 2xx) JSON response schema
    fn response_title(&self, operation: &Operation) -> Option<String> {
        let response = operation.responses.get("200").or_else(|| {
            let mut success: Vec<_> = operation
                .responses
                .iter()
                .filter(|(status, _)| status.starts_with('2'))
                .collect();
            success.sort_by(|a, b| a.0.cmp(b.0));
            success.into_iter().next().map(|(_, response)| response)
        })?;

        let response = self.spec.response(response)?;
        let schema_or_ref = json_media_type(&response.content)?.schema.as_ref()?;

        match schema_or_ref {
            RefOr::Item(schema) => schema.title.clone(),
            RefOr::Reference { ref_path } => self
                .spec
                .resolve_schema_ref(ref_path)
                .and_then(|schema| schema.title.clone())
                .or_else(|| component_name(ref_path, "schemas").map(String::from)),
        }
    }

    fn path_parameters(
        &self,
        path: &str,
        entity_name: &str,
        classification: &Classification,
    ) -> Vec<Parameter> {
        let id_parameter = classification.id_parameter.as_deref();

        placeholder_parameters(path, |token| {
            if Some(token) != id_parameter {
                return Parameter::path(token, token);
            }

            match classification.category {
                EndpointCategory::Entity => {
                    Parameter::path(token, self.options.id_property_name_for(entity_name))
                }
                EndpointCategory::SubPath => Parameter::path(
                    token,
                    self.options
                        .id_property_name_for(&self.parent_entity_name(classification)),
                ),
                EndpointCategory::SearchResult => {
                    Parameter::path(token, search_results_variable(entity_name))
                }
                _ => Parameter::path(token, token),
            }
        })
    }

    /// Query parameters that must be sent: those the document marks as
    /// required, plus the crop when requests are partitioned by crop
    fn query_parameters(
        &self,
        request_name: &str,
        path_item: &PathItem,
        operation: &Operation,
    ) -> Result<Vec<Parameter>> {
        let mut parameters = Vec::new();

        for parameter in path_item.parameters.iter().chain(&operation.parameters) {
            let parameter = self.spec.parameter(parameter).ok_or_else(|| {
                AnalyserError::SchemaResolution {
                    request: request_name.to_string(),
                    message: format!("unresolvable parameter {}", describe_ref(parameter)),
                }
            })?;

            if parameter.location != "query" {
                continue;
            }

            let crop_scoped =
                self.options.partitioned_by_crop() && parameter.name == COMMON_CROP_NAME;

            if (parameter.required || crop_scoped)
                && !parameters
                    .iter()
                    .any(|p: &Parameter| p.parameter_name == parameter.name)
            {
                parameters.push(Parameter::query(&parameter.name, &parameter.name));
            }
        }

        Ok(parameters)
    }

    fn body_template(
        &self,
        request_name: &str,
        kind: RequestKind,
        method: HttpMethod,
        operation: &Operation,
    ) -> Result<Option<BodyTemplate>> {
        if !matches!(method, HttpMethod::Post | HttpMethod::Put) {
            return Ok(None);
        }

        let Some(request_body) = operation.request_body.as_ref() else {
            return Ok(match kind {
                RequestKind::Search => Some(BodyTemplate::Map(BTreeMap::new())),
                _ => None,
            });
        };

        let resolution_error = |message: String| AnalyserError::SchemaResolution {
            request: request_name.to_string(),
            message,
        };

        let request_body = self.spec.request_body(request_body).ok_or_else(|| {
            resolution_error(format!("unresolvable request body {}", describe_ref(request_body)))
        })?;

        let schema_or_ref = json_media_type(&request_body.content)
            .and_then(|media| media.schema.as_ref())
            .ok_or_else(|| resolution_error("request body has no JSON schema".to_string()))?;

        let schema = self.spec.schema(schema_or_ref).ok_or_else(|| {
            resolution_error(format!("unresolvable body schema {}", describe_ref(schema_or_ref)))
        })?;

        Ok(Some(self.template_for(schema)))
    }

    fn template_for(&self, schema: &Schema) -> BodyTemplate {
        if is_array(schema) {
            let item = schema
                .items
                .as_deref()
                .and_then(|items| self.spec.schema(items));
            return match item {
                Some(item) => BodyTemplate::List(vec![self.template_for(item)]),
                None => BodyTemplate::List(Vec::new()),
            };
        }

        BodyTemplate::Map(self.template_fields(schema))
    }

    fn template_fields(&self, schema: &Schema) -> BTreeMap<String, BodyTemplate> {
        let mut fields = BTreeMap::new();

        for member in &schema.all_of {
            if let Some(member) = self.spec.schema(member) {
                fields.extend(self.template_fields(member));
            }
        }

        for (name, property) in &schema.properties {
            if let Some(parameter) = self.substitutable(name) {
                fields.insert(name.clone(), BodyTemplate::Parameter(parameter));
            } else if schema.required.contains(name) {
                let value = self
                    .spec
                    .schema(property)
                    .map(sample_value)
                    .unwrap_or_else(|| json!({}));
                fields.insert(name.clone(), BodyTemplate::Scalar(value));
            }
        }

        fields
    }

    /// Body fields filled from the variable store rather than literals
    fn substitutable(&self, field: &str) -> Option<Parameter> {
        if self.options.partitioned_by_crop()
            && (field == COMMON_CROP_NAME || field == COMMON_CROP_NAMES)
        {
            return Some(Parameter::body(field, field));
        }
        None
    }

    fn cache_variables(&self, kind: RequestKind, entity_name: &str) -> Vec<Variable> {
        match kind {
            RequestKind::List | RequestKind::Create => {
                let id_property = self.options.id_property_name_for(entity_name);
                vec![Variable {
                    variable_name: id_property.clone(),
                    parameter_name: id_property.clone(),
                    json_path: format!("$.result.data[0].{id_property}"),
                    convert_to_list: false,
                }]
            }
            RequestKind::Search => vec![Variable {
                variable_name: search_results_variable(entity_name),
                parameter_name: "searchResultsDbId".to_string(),
                json_path: "$.result.searchResultsDbId".to_string(),
                convert_to_list: false,
            }],
            _ => Vec::new(),
        }
    }
}

/// Which request, if any, a method on a path category produces
pub fn request_kind(category: EndpointCategory, method: HttpMethod) -> Option<RequestKind> {
    match (category, method) {
        (EndpointCategory::Special, _) => Some(RequestKind::Special),
        (EndpointCategory::Entities, HttpMethod::Get) => Some(RequestKind::List),
        (EndpointCategory::Entities, HttpMethod::Post) => Some(RequestKind::Create),
        (EndpointCategory::Entity, HttpMethod::Get) => Some(RequestKind::Get),
        (EndpointCategory::Entity, HttpMethod::Put) => Some(RequestKind::Update),
        (EndpointCategory::Entity, HttpMethod::Delete) => Some(RequestKind::Delete),
        (EndpointCategory::Search, HttpMethod::Post) => Some(RequestKind::Search),
        (EndpointCategory::SearchResult, HttpMethod::Get) => Some(RequestKind::SearchResults),
        (EndpointCategory::Table, HttpMethod::Get) => Some(RequestKind::Table),
        (EndpointCategory::SubPath, HttpMethod::Get) => Some(RequestKind::List),
        _ => None,
    }
}

/// Variable holding the id of an entity's pending search
///
/// `Study` -> `studySearchResultsDbId`
pub fn search_results_variable(entity_name: &str) -> String {
    format!("{}SearchResultsDbId", lower_first(entity_name))
}

/// One parameter per `{token}` in the path, in order
fn placeholder_parameters(path: &str, bind: impl Fn(&str) -> Parameter) -> Vec<Parameter> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
        .map(bind)
        .collect()
}

fn is_array(schema: &Schema) -> bool {
    schema.schema_type.as_deref() == Some("array")
        || (schema.schema_type.is_none() && schema.items.is_some())
}

/// Literal used for a required body field
fn sample_value(schema: &Schema) -> Value {
    if let Some(example) = &schema.example {
        return example.clone();
    }
    if let Some(first) = schema.enum_values.first() {
        return first.clone();
    }

    match schema.schema_type.as_deref() {
        Some("string") => json!("string"),
        Some("integer") => json!(0),
        Some("number") => json!(0.0),
        Some("boolean") => json!(false),
        Some("array") => json!([]),
        _ => json!({}),
    }
}

fn describe_ref<T>(item: &RefOr<T>) -> String {
    match item {
        RefOr::Reference { ref_path } => format!("'{ref_path}'"),
        RefOr::Item(_) => "(inline)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PathClassifier;
    use crate::openapi::OpenApiParser;
    use brapi_conformance_common::{OptionsFile, ParameterLocation};

    fn spec() -> OpenApiSpec {
        let json = r##"{
            "openapi": "3.0.0",
            "info": {"title": "BrAPI-Core", "version": "2.1"},
            "paths": {
                "/studies": {
                    "get": {
                        "parameters": [
                            {"name": "commonCropName", "in": "query", "schema": {"type": "string"}},
                            {"name": "page", "in": "query", "schema": {"type": "integer"}}
                        ],
                        "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/StudyListResponse"}}}}}
                    },
                    "post": {
                        "requestBody": {"content": {"application/json": {"schema": {"type": "array", "items": {"$ref": "#/components/schemas/StudyNewRequest"}}}}},
                        "responses": {"200": {"description": "OK"}}
                    }
                },
                "/search/studies": {
                    "post": {
                        "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/StudySearchRequest"}}}},
                        "responses": {"202": {"description": "Accepted"}}
                    }
                },
                "/germplasm/{germplasmDbId}/pedigree": {
                    "get": {"responses": {"200": {"description": "OK"}}}
                },
                "/germplasm": {
                    "get": {"responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {"title": "GermplasmListResponse", "type": "object"}}}}}}
                },
                "/studies/{studyDbId}": {
                    "put": {
                        "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Missing"}}}},
                        "responses": {"200": {"description": "OK"}}
                    }
                }
            },
            "components": {
                "schemas": {
                    "StudyListResponse": {"title": "StudyListResponse", "type": "object"},
                    "StudyNewRequest": {
                        "type": "object",
                        "required": ["studyName", "active"],
                        "properties": {
                            "studyName": {"type": "string", "example": "Grape Yield 2024"},
                            "active": {"type": "boolean"},
                            "commonCropName": {"type": "string"},
                            "studyDescription": {"type": "string"}
                        }
                    },
                    "StudySearchRequest": {
                        "type": "object",
                        "properties": {
                            "commonCropNames": {"type": "array", "items": {"type": "string"}},
                            "studyDbIds": {"type": "array", "items": {"type": "string"}}
                        }
                    }
                }
            }
        }"##;
        OpenApiParser::from_source(json).unwrap().spec().clone()
    }

    fn build(
        spec: &OpenApiSpec,
        options: &OptionsFile,
        path: &str,
    ) -> Vec<Result<BuildOutcome>> {
        let classification = PathClassifier::new().unwrap().classify(path).unwrap();
        RequestBuilder::new(spec, options).build(path, &spec.paths[path], &classification)
    }

    fn request(outcome: &Result<BuildOutcome>) -> &ApiRequest {
        match outcome {
            Ok(BuildOutcome::Request(request)) => request,
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_list_request_caches_id() {
        let spec = spec();
        let options = OptionsFile::default();
        let outcomes = build(&spec, &options, "/studies");

        let list = request(&outcomes[0]);
        assert_eq!(list.kind, RequestKind::List);
        assert_eq!(list.index, 10);
        assert_eq!(list.entity_name.as_deref(), Some("Study"));
        assert_eq!(list.name, "List Study");
        assert!(list.query_parameters.is_empty());
        assert_eq!(list.cache_variables[0].variable_name, "studyDbId");
        assert_eq!(
            list.cache_variables[0].json_path,
            "$.result.data[0].studyDbId"
        );

        // create is off by default
        assert!(matches!(
            &outcomes[1],
            Ok(BuildOutcome::Skipped(Endpoint { method: HttpMethod::Post, .. }))
        ));
    }

    #[test]
    fn test_create_body_template() {
        let spec = spec();
        let mut options = OptionsFile::default();
        options.defaults.create = true;
        options.partitioned_by_crop = true;

        let outcomes = build(&spec, &options, "/studies");
        let list = request(&outcomes[0]);
        assert_eq!(
            list.query_parameters,
            vec![Parameter::query("commonCropName", "commonCropName")]
        );

        let create = request(&outcomes[1]);
        assert_eq!(create.kind, RequestKind::Create);

        let Some(BodyTemplate::List(items)) = &create.body else {
            panic!("expected list body, got {:?}", create.body);
        };
        let BodyTemplate::Map(fields) = &items[0] else {
            panic!("expected map item");
        };
        assert_eq!(
            fields["studyName"],
            BodyTemplate::Scalar(json!("Grape Yield 2024"))
        );
        assert_eq!(fields["active"], BodyTemplate::Scalar(json!(false)));
        assert!(!fields.contains_key("studyDescription"));
        match &fields["commonCropName"] {
            BodyTemplate::Parameter(p) => {
                assert_eq!(p.variable_name, "commonCropName");
                assert_eq!(p.location, ParameterLocation::Body);
            }
            other => panic!("expected parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_search_caches_search_results_id() {
        let spec = spec();
        let options = OptionsFile::default();
        let outcomes = build(&spec, &options, "/search/studies");

        let search = request(&outcomes[0]);
        assert_eq!(search.kind, RequestKind::Search);
        // no 2xx title, named from the path
        assert_eq!(search.entity_name.as_deref(), Some("Study"));
        assert_eq!(
            search.cache_variables[0].variable_name,
            "studySearchResultsDbId"
        );
        assert_eq!(search.body, Some(BodyTemplate::Map(BTreeMap::new())));
    }

    #[test]
    fn test_sub_path_requires_parent_list() {
        let spec = spec();
        let options = OptionsFile::default();
        let outcomes = build(&spec, &options, "/germplasm/{germplasmDbId}/pedigree");

        let pedigree = request(&outcomes[0]);
        assert_eq!(pedigree.kind, RequestKind::List);
        assert_eq!(pedigree.name, "List Germplasm Pedigree");
        assert_eq!(pedigree.entity_name.as_deref(), Some("Pedigree"));
        assert_eq!(
            pedigree.prerequisites,
            vec![RequestKey::new(HttpMethod::Get, "/germplasm")]
        );
        assert_eq!(
            pedigree.path_parameters,
            vec![Parameter::path("germplasmDbId", "germplasmDbId")]
        );
    }

    #[test]
    fn test_missing_body_schema_fails_only_that_request() {
        let spec = spec();
        let mut options = OptionsFile::default();
        options.defaults.update = true;
        let outcomes = build(&spec, &options, "/studies/{studyDbId}");

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            Err(AnalyserError::SchemaResolution { message, .. }) if message.contains("#/components/schemas/Missing")
        ));
    }

    #[test]
    fn test_request_kind_table() {
        assert_eq!(
            request_kind(EndpointCategory::Entities, HttpMethod::Get),
            Some(RequestKind::List)
        );
        assert_eq!(
            request_kind(EndpointCategory::Entity, HttpMethod::Delete),
            Some(RequestKind::Delete)
        );
        assert_eq!(
            request_kind(EndpointCategory::Search, HttpMethod::Get),
            None
        );
        assert_eq!(
            request_kind(EndpointCategory::Entity, HttpMethod::Patch),
            None
        );
    }
}
