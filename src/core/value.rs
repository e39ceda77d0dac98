//! Typed values exchanged between steps

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Map of field name to value, as passed into and out of a module
pub type ValueMap = BTreeMap<String, Value>;

/// Declared type of a step field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Any,
    String,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
    File,
    FileBundle,
    Table,
    Array,
    NetworkData,
}

impl DataType {
    /// Whether a field of this type can receive a value of type `other`
    pub fn accepts(&self, other: DataType) -> bool {
        match (self, other) {
            (DataType::Any, _) => true,
            (DataType::Float, DataType::Integer) => true,
            (expected, actual) => *expected == actual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Any => "any",
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::List => "list",
            DataType::Dict => "dict",
            DataType::File => "file",
            DataType::FileBundle => "file_bundle",
            DataType::Table => "table",
            DataType::Array => "array",
            DataType::NetworkData => "network_data",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data_type = match s {
            "any" => DataType::Any,
            "string" => DataType::String,
            "integer" => DataType::Integer,
            "float" => DataType::Float,
            "boolean" => DataType::Boolean,
            "list" => DataType::List,
            "dict" => DataType::Dict,
            "file" | "csv_file" | "text_file" => DataType::File,
            "file_bundle" | "text_file_bundle" => DataType::FileBundle,
            "table" => DataType::Table,
            "array" => DataType::Array,
            "network_data" => DataType::NetworkData,
            other => return Err(format!("Unknown data type: {}", other)),
        };
        Ok(data_type)
    }
}

/// A file loaded into memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileValue {
    /// Path the file was imported from
    pub path: String,

    /// File name without directories
    pub file_name: String,

    /// File content (text)
    pub content: String,
}

/// A set of files imported from one folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBundle {
    /// Folder the bundle was imported from
    pub root: String,

    /// Files, sorted by path relative to `root`
    pub files: Vec<BundledFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundledFile {
    pub rel_path: String,
    pub file: FileValue,
}

/// Column-oriented table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Table {
    /// Number of rows (length of the first column)
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Nodes and edges assembled from tables
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// A value flowing through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Integer(i64),
    Float(#[serde(with = "float_repr")] f64),
    Boolean(bool),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    File(FileValue),
    FileBundle(FileBundle),
    Table(Table),
    Array(Vec<Value>),
    NetworkData(NetworkData),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::List(_) => DataType::List,
            Value::Dict(_) => DataType::Dict,
            Value::File(_) => DataType::File,
            Value::FileBundle(_) => DataType::FileBundle,
            Value::Table(_) => DataType::Table,
            Value::Array(_) => DataType::Array,
            Value::NetworkData(_) => DataType::NetworkData,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Items of a list or array value
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert an untyped JSON value into a typed value for a field of type `expected`.
    ///
    /// `null` yields `None`, meaning "use the field default".
    pub fn coerce(json: &serde_json::Value, expected: DataType) -> Result<Option<Value>, String> {
        use serde_json::Value as Json;

        let value = match (json, expected) {
            (Json::Null, _) => return Ok(None),
            (Json::Bool(b), _) => Value::Boolean(*b),
            (Json::Number(n), DataType::Float) => Value::Float(
                n.as_f64()
                    .ok_or_else(|| format!("Number out of range: {}", n))?,
            ),
            (Json::Number(n), _) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(
                    n.as_f64()
                        .ok_or_else(|| format!("Number out of range: {}", n))?,
                ),
            },
            (Json::String(s), DataType::Integer) => Value::Integer(
                s.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not an integer", s))?,
            ),
            (Json::String(s), DataType::Float) => Value::Float(
                s.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", s))?,
            ),
            (Json::String(s), DataType::Boolean) => Value::Boolean(
                s.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not a boolean", s))?,
            ),
            (Json::String(s), _) => Value::String(s.clone()),
            (Json::Array(items), _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = Value::coerce(item, DataType::Any)? {
                        values.push(value);
                    }
                }
                if expected == DataType::Array {
                    Value::Array(values)
                } else {
                    Value::List(values)
                }
            }
            (Json::Object(map), _) => {
                let mut values = BTreeMap::new();
                for (key, item) in map {
                    if let Some(value) = Value::coerce(item, DataType::Any)? {
                        values.insert(key.clone(), value);
                    }
                }
                Value::Dict(values)
            }
        };

        Ok(Some(value))
    }

    /// Convert a YAML value (from a workflow file or `--input`) into a typed value
    pub fn from_yaml(yaml: &serde_yaml::Value, expected: DataType) -> Result<Option<Value>, String> {
        let json = serde_json::to_value(yaml).map_err(|e| e.to_string())?;
        Value::coerce(&json, expected)
    }

    /// Short, single-line rendering for terminal output
    pub fn preview(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::List(items) => format!("list[{}]", items.len()),
            Value::Dict(map) => format!("dict{{{}}}", map.len()),
            Value::File(file) => format!("file {} ({} bytes)", file.path, file.content.len()),
            Value::FileBundle(bundle) => {
                format!("file_bundle {} ({} files)", bundle.root, bundle.files.len())
            }
            Value::Table(table) => format!(
                "table {} rows x {} columns [{}]",
                table.num_rows(),
                table.columns.len(),
                table.column_names().join(", ")
            ),
            Value::Array(items) => format!("array[{}]", items.len()),
            Value::NetworkData(network) => format!(
                "network_data {} nodes, {} edges",
                network.nodes.len(),
                network.edges.len()
            ),
        }
    }
}

impl Value {
    /// Structural equality where floats compare bit for bit, so `NaN` equals itself
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::List(a), Value::List(b)) | (Value::Array(a), Value::Array(b)) => same_items(a, b),
            (Value::Dict(a), Value::Dict(b)) => same_entries(a, b),
            (Value::Table(a), Value::Table(b)) => {
                a.columns.len() == b.columns.len()
                    && a.columns
                        .iter()
                        .zip(&b.columns)
                        .all(|(x, y)| x.name == y.name && same_items(&x.values, &y.values))
            }
            (Value::NetworkData(a), Value::NetworkData(b)) => {
                a.nodes.len() == b.nodes.len()
                    && a.edges.len() == b.edges.len()
                    && a.nodes.iter().zip(&b.nodes).all(|(x, y)| {
                        x.id == y.id && x.label == y.label && same_entries(&x.attributes, &y.attributes)
                    })
                    && a.edges.iter().zip(&b.edges).all(|(x, y)| {
                        x.source == y.source
                            && x.target == y.target
                            && same_entries(&x.attributes, &y.attributes)
                    })
            }
            _ => self == other,
        }
    }
}

/// [`Value::same_as`] over whole input maps
pub fn same_values(a: &ValueMap, b: &ValueMap) -> bool {
    same_entries(a, b)
}

fn same_items(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
}

fn same_entries(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && va.same_as(vb))
}

/// JSON has no literal for non-finite floats; they travel as `"NaN"`, `"inf"` and `"-inf"`
mod float_repr {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::custom(format!("invalid float: {}", other))),
            },
        }
    }
}
