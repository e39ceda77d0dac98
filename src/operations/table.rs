//! Table creation and column extraction

use super::{single, string_input, table_input};
use crate::core::{Column, DataType, FieldSchema, FileBundle, StepConfig, Table, Value, ValueMap};
use crate::registry::{Module, ModuleError, ModuleSchema};
use async_trait::async_trait;
use tracing::warn;

/// `create.table`: onboard a csv file or a text file bundle as a table
///
/// The input field is named after `source_type` (`csv_file` or
/// `text_file_bundle`).
pub struct CreateTableModule;

impl CreateTableModule {
    fn source_type(config: &StepConfig) -> Result<&str, ModuleError> {
        if let Some(target) = config.target_type.as_deref() {
            if target != "table" {
                return Err(ModuleError::Config(format!(
                    "unsupported target_type '{}' (expected 'table')",
                    target
                )));
            }
        }
        match config.source_type.as_deref() {
            Some(source @ ("csv_file" | "text_file_bundle")) => Ok(source),
            Some(other) => Err(ModuleError::Config(format!(
                "unsupported source_type '{}' (expected csv_file or text_file_bundle)",
                other
            ))),
            None => Err(ModuleError::Config("source_type is required".to_string())),
        }
    }
}

#[async_trait]
impl Module for CreateTableModule {
    fn schema(&self, config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        let source = Self::source_type(config)?;
        let source_field = match source {
            "csv_file" => FieldSchema::new(source, DataType::File).with_doc("CSV file with a header row"),
            _ => FieldSchema::new(source, DataType::FileBundle).with_doc("Text files, one row each"),
        };
        Ok(ModuleSchema::new()
            .input(source_field)
            .output(FieldSchema::new("table", DataType::Table)))
    }

    async fn process(&self, config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let source = Self::source_type(config)?;
        let value = inputs
            .get(source)
            .ok_or_else(|| ModuleError::MissingInput(source.to_string()))?;

        let table = match value {
            Value::File(file) => parse_csv(&file.content, config.ignore_errors)
                .map_err(|e| ModuleError::invalid_input(source, format!("{}: {}", file.file_name, e)))?,
            Value::FileBundle(bundle) => bundle_table(bundle),
            other => {
                return Err(ModuleError::invalid_input(
                    source,
                    format!("unexpected {}", other.data_type()),
                ))
            }
        };

        Ok(single("table", Value::Table(table)))
    }
}

/// One row per file: `id`, `rel_path`, `file_name`, `content`
fn bundle_table(bundle: &FileBundle) -> Table {
    let mut columns: Vec<Column> = ["id", "rel_path", "file_name", "content"]
        .iter()
        .map(|name| Column {
            name: name.to_string(),
            values: Vec::with_capacity(bundle.files.len()),
        })
        .collect();

    for (id, bundled) in bundle.files.iter().enumerate() {
        columns[0].values.push(Value::Integer(id as i64));
        columns[1].values.push(Value::String(bundled.rel_path.clone()));
        columns[2].values.push(Value::String(bundled.file.file_name.clone()));
        columns[3].values.push(Value::String(bundled.file.content.clone()));
    }

    Table { columns }
}

/// Parse CSV text with a header row
///
/// Quoted fields may contain commas, newlines and doubled quotes. Cells
/// are typed as integer, float or string. Rows with the wrong number of
/// cells are an error, or are skipped when `skip_bad_rows` is set.
pub fn parse_csv(text: &str, skip_bad_rows: bool) -> Result<Table, String> {
    let mut records = split_records(text)?.into_iter();
    let header = records.next().ok_or_else(|| "empty csv file".to_string())?;

    let mut columns: Vec<Column> = header
        .into_iter()
        .map(|name| Column {
            name: name.trim().to_string(),
            values: Vec::new(),
        })
        .collect();

    for (index, record) in records.enumerate() {
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        if record.len() != columns.len() {
            let message = format!(
                "row {} has {} cells, expected {}",
                index + 2,
                record.len(),
                columns.len()
            );
            if skip_bad_rows {
                warn!("Skipping csv {}", message);
                continue;
            }
            return Err(message);
        }
        for (column, cell) in columns.iter_mut().zip(record) {
            column.values.push(typed_cell(cell));
        }
    }

    Ok(Table { columns })
}

fn typed_cell(cell: String) -> Value {
    let trimmed = cell.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = trimmed.parse::<f64>() {
        // "inf", "NaN" and overflowing literals such as "1e999" stay text
        if f.is_finite() {
            Value::Float(f)
        } else {
            Value::String(cell)
        }
    } else {
        Value::String(cell)
    }
}

fn split_records(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// `table.cut_column`: extract one column as an array
pub struct CutColumnModule;

#[async_trait]
impl Module for CutColumnModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("table", DataType::Table))
            .input(FieldSchema::new("column_name", DataType::String).with_doc("Column to extract"))
            .output(FieldSchema::new("array", DataType::Array)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let table = table_input(inputs, "table")?;
        let column_name = string_input(inputs, "column_name")?;

        let column = table.column(column_name).ok_or_else(|| {
            ModuleError::invalid_input(
                "column_name",
                format!(
                    "no column '{}' (available: {})",
                    column_name,
                    table.column_names().join(", ")
                ),
            )
        })?;

        Ok(single("array", Value::Array(column.values.clone())))
    }
}
