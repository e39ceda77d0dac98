//! Built-in operations
//!
//! File onboarding, table handling, network assembly, date parsing and
//! text preprocessing modules.

mod date;
mod import;
mod network;
mod table;
mod text;

pub use date::ParseDateArrayModule;
pub use import::{ImportFileBundleModule, ImportFileModule};
pub use network::NetworkFromTablesModule;
pub use table::{parse_csv, CreateTableModule, CutColumnModule};
pub use text::{PreprocessTokensModule, StopwordsListModule, TokenizeTextsModule};

use crate::core::{Table, Value, ValueMap};
use crate::registry::{ModuleError, Operation, OperationRegistry, RegistryError};
use std::sync::Arc;

/// All built-in operations
pub fn builtin_operations() -> Vec<Operation> {
    vec![
        Operation::new(
            "import.file",
            "Import a single file from the local filesystem",
            Arc::new(ImportFileModule),
        ),
        Operation::new(
            "import.file_bundle",
            "Import all files below a folder",
            Arc::new(ImportFileBundleModule),
        ),
        Operation::new(
            "create.table",
            "Create a table from a csv file or a text file bundle",
            Arc::new(CreateTableModule),
        ),
        Operation::new(
            "table.cut_column",
            "Extract a single column of a table as an array",
            Arc::new(CutColumnModule),
        ),
        Operation::new(
            "create.network_data.from.tables",
            "Assemble network data from an edges table and an optional nodes table",
            Arc::new(NetworkFromTablesModule),
        ),
        Operation::new(
            "parse.date_array",
            "Parse a date out of every string of an array",
            Arc::new(ParseDateArrayModule),
        ),
        Operation::new(
            "create.stopwords_list",
            "Combine built-in stopword lists and custom words",
            Arc::new(StopwordsListModule),
        ),
        Operation::new(
            "tokenize.texts_array",
            "Split every text of an array into tokens",
            Arc::new(TokenizeTextsModule),
        ),
        Operation::new(
            "preprocess.tokens_array",
            "Normalize and filter tokens",
            Arc::new(PreprocessTokensModule),
        ),
    ]
}

/// Register the built-in operations
pub fn register_builtin(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    for operation in builtin_operations() {
        registry.register(operation)?;
    }
    Ok(())
}

fn required<'a>(inputs: &'a ValueMap, name: &str) -> Result<&'a Value, ModuleError> {
    inputs
        .get(name)
        .ok_or_else(|| ModuleError::MissingInput(name.to_string()))
}

fn string_input<'a>(inputs: &'a ValueMap, name: &str) -> Result<&'a str, ModuleError> {
    required(inputs, name)?
        .as_str()
        .ok_or_else(|| ModuleError::invalid_input(name, "expected a string"))
}

fn bool_input(inputs: &ValueMap, name: &str) -> Result<bool, ModuleError> {
    required(inputs, name)?
        .as_bool()
        .ok_or_else(|| ModuleError::invalid_input(name, "expected a boolean"))
}

fn items_input<'a>(inputs: &'a ValueMap, name: &str) -> Result<&'a [Value], ModuleError> {
    required(inputs, name)?
        .as_items()
        .ok_or_else(|| ModuleError::invalid_input(name, "expected a list or array"))
}

fn table_input<'a>(inputs: &'a ValueMap, name: &str) -> Result<&'a Table, ModuleError> {
    match required(inputs, name)? {
        Value::Table(table) => Ok(table),
        other => Err(ModuleError::invalid_input(
            name,
            format!("expected a table, got {}", other.data_type()),
        )),
    }
}

/// Text of a scalar cell
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn single(name: &str, value: Value) -> ValueMap {
    let mut outputs = ValueMap::new();
    outputs.insert(name.to_string(), value);
    outputs
}
