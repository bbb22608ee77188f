use serde::Serialize;
use serde_json::{Map, Value};

/// Variables visible to templates
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct TemplateContext {
    variables: Map<String, Value>,
}

impl TemplateContext {
    pub fn new(variables: Map<String, Value>) -> Self {
        Self { variables }
    }

    /// Merge global variables with module-local ones. Locals win on conflict.
    pub fn merge(globals: &Map<String, Value>, locals: &Map<String, Value>) -> Self {
        let mut variables = globals.clone();
        for (key, value) in locals {
            variables.insert(key.clone(), value.clone());
        }
        Self { variables }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
