//! Field references and field declarations

use crate::core::error::{Result, WorkflowError};
use crate::core::value::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed form of a `"step_id.field_name"` reference
///
/// Parsed once when a connection or alias is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldRef {
    pub step_id: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(step_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            field: field.into(),
        }
    }

    /// Parse `step_id.field_name`; the step id may not contain dots
    pub fn parse(reference: &str) -> Result<Self> {
        match reference.split_once('.') {
            Some((step_id, field)) if !step_id.is_empty() && !field.is_empty() => {
                Ok(Self::new(step_id, field))
            }
            _ => Err(WorkflowError::UnknownField(reference.to_string())),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step_id, self.field)
    }
}

impl TryFrom<String> for FieldRef {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self> {
        FieldRef::parse(&value)
    }
}

impl From<FieldRef> for String {
    fn from(value: FieldRef) -> Self {
        value.to_string()
    }
}

/// Declaration of an input or output field of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,

    pub data_type: DataType,

    #[serde(default)]
    pub doc: String,

    /// Value used when no input is set
    #[serde(default)]
    pub default: Option<Value>,

    /// Whether the field may stay unset without a default
    #[serde(default)]
    pub optional: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            doc: String::new(),
            default: None,
            optional: false,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Whether the field can be left unset
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.optional
    }
}
