//! Analysis options
//!
//! The core only consumes the [`AnalysisOptions`] query surface. [`OptionsFile`]
//! is a YAML-backed implementation loaded from a single file; layering several
//! files on top of each other is left to callers.

use crate::model::{RequestKind, Variable};
use crate::{AnalyserError, ErrorList, Result};
use serde::{Deserialize, Serialize};
use serde_json_path::JsonPath;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use url::Url;

/// Query surface the request builder and orchestrator consult
pub trait AnalysisOptions: Send + Sync {
    /// Per-entity, per-kind gate
    fn is_analysing(&self, kind: RequestKind, entity_name: &str) -> bool;

    /// Whether per-entity requests should be scoped to a crop
    fn partitioned_by_crop(&self) -> bool;

    /// Name of the id property for an entity (e.g. `studyDbId`)
    fn id_property_name_for(&self, entity_name: &str) -> String;

    /// Endpoints executed before any entity group
    fn special_cases(&self) -> &[SpecialCase];
}

/// How shared prerequisites are handled within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrerequisiteStrategy {
    /// Re-execute a prerequisite for every dependent, refreshing its variables
    #[default]
    Always,
    /// Execute each prerequisite at most once per run
    Once,
}

/// Default gates for each request kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KindGates {
    pub list: bool,
    pub get: bool,
    pub search: bool,
    pub search_results: bool,
    pub table: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for KindGates {
    /// Read-only requests on, mutations off
    fn default() -> Self {
        Self {
            list: true,
            get: true,
            search: true,
            search_results: true,
            table: true,
            create: false,
            update: false,
            delete: false,
        }
    }
}

impl KindGates {
    fn gate(&self, kind: RequestKind) -> bool {
        match kind {
            RequestKind::Special => true,
            RequestKind::List => self.list,
            RequestKind::Get => self.get,
            RequestKind::Search => self.search,
            RequestKind::SearchResults => self.search_results,
            RequestKind::Table => self.table,
            RequestKind::Create => self.create,
            RequestKind::Update => self.update,
            RequestKind::Delete => self.delete,
        }
    }
}

/// Per-entity overrides; unset fields fall back to the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityOptions {
    pub list: Option<bool>,
    pub get: Option<bool>,
    pub search: Option<bool>,
    pub search_results: Option<bool>,
    pub table: Option<bool>,
    pub create: Option<bool>,
    pub update: Option<bool>,
    pub delete: Option<bool>,
    pub id_property_name: Option<String>,
}

impl EntityOptions {
    fn gate(&self, kind: RequestKind) -> Option<bool> {
        match kind {
            RequestKind::Special => None,
            RequestKind::List => self.list,
            RequestKind::Get => self.get,
            RequestKind::Search => self.search,
            RequestKind::SearchResults => self.search_results,
            RequestKind::Table => self.table,
            RequestKind::Create => self.create,
            RequestKind::Update => self.update,
            RequestKind::Delete => self.delete,
        }
    }
}

/// An endpoint not tied to any entity, with the variables it seeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialCase {
    pub path: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

/// Analysis options loaded from a YAML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsFile {
    /// Server base URL, e.g. `https://test-server.brapi.org/brapi/v2`
    pub base_url: Option<String>,
    /// Per-HTTP-call deadline
    pub timeout_secs: u64,
    pub partitioned_by_crop: bool,
    pub prerequisite_strategy: PrerequisiteStrategy,
    pub defaults: KindGates,
    pub entities: BTreeMap<String, EntityOptions>,
    pub special: Vec<SpecialCase>,
}

impl Default for OptionsFile {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
            partitioned_by_crop: false,
            prerequisite_strategy: PrerequisiteStrategy::default(),
            defaults: KindGates::default(),
            entities: BTreeMap::new(),
            special: default_special_cases(),
        }
    }
}

/// `/commoncropnames` seeds the crop used when requests are partitioned by crop
pub fn default_special_cases() -> Vec<SpecialCase> {
    vec![SpecialCase {
        path: "/commoncropnames".to_string(),
        variables: vec![
            Variable {
                variable_name: "commonCropName".to_string(),
                parameter_name: "commonCropName".to_string(),
                json_path: "$.result.data[0]".to_string(),
                convert_to_list: false,
            },
            Variable {
                variable_name: "commonCropNames".to_string(),
                parameter_name: "commonCropNames".to_string(),
                json_path: "$.result.data[0]".to_string(),
                convert_to_list: true,
            },
        ],
    }]
}

impl OptionsFile {
    /// Load options from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AnalyserError::Configuration(format!(
                "Failed to read options file {:?}: {}",
                path, e
            ))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            AnalyserError::Configuration(format!(
                "Failed to parse options YAML from {:?}: {}",
                path, e
            ))
        })
    }

    /// Parse options from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override the base URL (e.g. from the command line)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Parsed base URL; a missing or malformed value is a configuration error
    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AnalyserError::Configuration("baseUrl is not set".to_string()))?;

        let url = Url::parse(raw).map_err(|e| {
            AnalyserError::Configuration(format!("baseUrl '{raw}' is not a valid URL: {e}"))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AnalyserError::Configuration(format!(
                "baseUrl '{raw}' must use http or https"
            )));
        }

        Ok(url)
    }

    /// Check everything needed before any request is sent
    pub fn validate(&self) -> std::result::Result<(), ErrorList> {
        let mut errors = ErrorList::new();

        if let Err(e) = self.base_url() {
            errors.push(e);
        }

        if self.timeout_secs == 0 {
            errors.push(AnalyserError::Configuration(
                "timeoutSecs must be greater than zero".to_string(),
            ));
        }

        for special in &self.special {
            if !special.path.starts_with('/') {
                errors.push(AnalyserError::Configuration(format!(
                    "special path '{}' must start with '/'",
                    special.path
                )));
            }
            for variable in &special.variables {
                if variable.variable_name.is_empty() {
                    errors.push(AnalyserError::Configuration(format!(
                        "special path '{}' has a variable without a name",
                        special.path
                    )));
                }
                if let Err(e) = JsonPath::parse(&variable.json_path) {
                    errors.push(AnalyserError::Configuration(format!(
                        "variable '{}' has an invalid JSONPath '{}': {}",
                        variable.variable_name, variable.json_path, e
                    )));
                }
            }
        }

        errors.into_result(())
    }
}

impl AnalysisOptions for OptionsFile {
    fn is_analysing(&self, kind: RequestKind, entity_name: &str) -> bool {
        self.entities
            .get(entity_name)
            .and_then(|entity| entity.gate(kind))
            .unwrap_or_else(|| self.defaults.gate(kind))
    }

    fn partitioned_by_crop(&self) -> bool {
        self.partitioned_by_crop
    }

    fn id_property_name_for(&self, entity_name: &str) -> String {
        self.entities
            .get(entity_name)
            .and_then(|entity| entity.id_property_name.clone())
            .unwrap_or_else(|| default_id_property_name(entity_name))
    }

    fn special_cases(&self) -> &[SpecialCase] {
        &self.special
    }
}

/// `Study` -> `studyDbId`, `ObservationUnit` -> `observationUnitDbId`
pub fn default_id_property_name(entity_name: &str) -> String {
    let mut chars = entity_name.chars();
    match chars.next() {
        Some(first) => format!("{}{}DbId", first.to_lowercase(), chars.as_str()),
        None => "dbId".to_string(),
    }
}
