//! Run-scoped variable store

use brapi_conformance_common::{AnalyserError, Result, VariableValue};
use std::collections::HashMap;

/// Most recently extracted value per variable name
///
/// Lives for exactly one analysis run. A miss is always an error; nothing is
/// ever defaulted.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, VariableValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any earlier one with the same variable name
    pub fn put(&mut self, value: VariableValue) {
        tracing::debug!(variable = %value.variable_name, value = %value.value, "cached");
        self.values.insert(value.variable_name.clone(), value);
    }

    pub fn get(&self, variable_name: &str) -> Result<&VariableValue> {
        self.values
            .get(variable_name)
            .ok_or_else(|| AnalyserError::MissingVariable(variable_name.to_string()))
    }

    pub fn contains(&self, variable_name: &str) -> bool {
        self.values.contains_key(variable_name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
