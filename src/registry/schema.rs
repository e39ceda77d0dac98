//! Declared inputs and outputs of a module

use crate::core::field::FieldSchema;
use serde::{Deserialize, Serialize};

/// Input and output fields a module declares for one configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleSchema {
    pub inputs: Vec<FieldSchema>,
    pub outputs: Vec<FieldSchema>,
}

impl ModuleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, field: FieldSchema) -> Self {
        self.inputs.push(field);
        self
    }

    pub fn output(mut self, field: FieldSchema) -> Self {
        self.outputs.push(field);
        self
    }

    pub fn input_field(&self, name: &str) -> Option<&FieldSchema> {
        self.inputs.iter().find(|f| f.name == name)
    }

    pub fn output_field(&self, name: &str) -> Option<&FieldSchema> {
        self.outputs.iter().find(|f| f.name == name)
    }
}
