//! Date extraction from strings such as file names

use super::{bool_input, items_input, single};
use crate::core::{DataType, FieldSchema, StepConfig, Value, ValueMap};
use crate::registry::{Module, ModuleError, ModuleSchema};
use async_trait::async_trait;
use chrono::NaiveDate;

const FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y_%m_%d", "%Y.%m.%d", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%Y",
];

/// `parse.date_array`
///
/// Cuts `[min_index, max_index)` out of every string (character
/// positions), strips `remove_tokens` and parses what is left as a date.
pub struct ParseDateArrayModule;

#[async_trait]
impl Module for ParseDateArrayModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("array", DataType::Array).with_doc("Strings holding one date each"))
            .input(
                FieldSchema::new("min_index", DataType::Integer)
                    .with_doc("First character of the date")
                    .optional(),
            )
            .input(
                FieldSchema::new("max_index", DataType::Integer)
                    .with_doc("Character after the date")
                    .optional(),
            )
            .input(
                FieldSchema::new("remove_tokens", DataType::List)
                    .with_doc("Substrings removed before parsing")
                    .with_default(Value::List(vec![])),
            )
            .input(
                FieldSchema::new("force_non_null", DataType::Boolean)
                    .with_doc("Fail on items without a date; otherwise they map to an empty string")
                    .with_default(Value::Boolean(true)),
            )
            .output(FieldSchema::new("date_array", DataType::Array).with_doc("Dates as YYYY-MM-DD")))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let items = items_input(inputs, "array")?;
        let min = index_input(inputs, "min_index")?;
        let max = index_input(inputs, "max_index")?;
        if let (Some(min), Some(max)) = (min, max) {
            if max < min {
                return Err(ModuleError::invalid_input(
                    "max_index",
                    format!("{} is before min_index {}", max, min),
                ));
            }
        }
        let force_non_null = bool_input(inputs, "force_non_null")?;
        let remove_tokens = items_input(inputs, "remove_tokens")?
            .iter()
            .map(|token| {
                token
                    .as_str()
                    .ok_or_else(|| ModuleError::invalid_input("remove_tokens", "expected strings"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut dates = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let text = item.as_str().ok_or_else(|| {
                ModuleError::invalid_input(
                    "array",
                    format!("item {} is {}, expected a string", index, item.data_type()),
                )
            })?;
            match parse_date(text, min, max, &remove_tokens) {
                Some(date) => dates.push(Value::String(date.format("%Y-%m-%d").to_string())),
                None if force_non_null => {
                    return Err(ModuleError::invalid_input(
                        "array",
                        format!("no date in item {} ({:?})", index, text),
                    ))
                }
                None => dates.push(Value::String(String::new())),
            }
        }

        Ok(single("date_array", Value::Array(dates)))
    }
}

fn index_input(inputs: &ValueMap, name: &str) -> Result<Option<usize>, ModuleError> {
    let Some(value) = inputs.get(name) else {
        return Ok(None);
    };
    value
        .as_i64()
        .and_then(|i| usize::try_from(i).ok())
        .map(Some)
        .ok_or_else(|| ModuleError::invalid_input(name, "expected a non-negative integer"))
}

fn parse_date(text: &str, min: Option<usize>, max: Option<usize>, remove_tokens: &[&str]) -> Option<NaiveDate> {
    let start = min.unwrap_or(0);
    let len = max.map_or(usize::MAX, |max| max - start);
    let mut candidate: String = text.chars().skip(start).take(len).collect();
    for token in remove_tokens {
        candidate = candidate.replace(token, "");
    }
    let candidate = candidate.trim();

    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
}
