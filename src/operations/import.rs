//! File onboarding

use super::{single, string_input};
use crate::core::{BundledFile, DataType, FieldSchema, FileBundle, FileValue, StepConfig, Value, ValueMap};
use crate::registry::{Module, ModuleError, ModuleSchema};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `import.file`: read one text file
pub struct ImportFileModule;

#[async_trait]
impl Module for ImportFileModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("path", DataType::String).with_doc("Path to the file"))
            .output(FieldSchema::new("file", DataType::File).with_doc("The imported file")))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let path = string_input(inputs, "path")?;
        let file = read_file(Path::new(path)).await?;
        Ok(single("file", Value::File(file)))
    }
}

/// `import.file_bundle`: read every file below a folder
pub struct ImportFileBundleModule;

#[async_trait]
impl Module for ImportFileBundleModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("path", DataType::String).with_doc("Folder to import"))
            .input(
                FieldSchema::new("include_file_types", DataType::List)
                    .with_doc("File extensions to include, e.g. ['.txt']; all files if unset")
                    .optional(),
            )
            .output(FieldSchema::new("file_bundle", DataType::FileBundle)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let root = string_input(inputs, "path")?;
        let extensions: Option<Vec<String>> = match inputs.get("include_file_types") {
            Some(value) => Some(
                value
                    .as_items()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|ext| ext.trim_start_matches('.').to_lowercase())
                    .collect(),
            ),
            None => None,
        };

        let root_path = PathBuf::from(root);
        let mut paths = collect_files(&root_path).await?;
        paths.sort();

        let mut files = Vec::new();
        for path in paths {
            let included = match &extensions {
                Some(extensions) => path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains(&e.to_lowercase())),
                None => true,
            };
            if !included {
                continue;
            }

            let rel_path = path
                .strip_prefix(&root_path)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            files.push(BundledFile {
                rel_path,
                file: read_file(&path).await?,
            });
        }

        debug!("Imported {} files from {}", files.len(), root);
        Ok(single(
            "file_bundle",
            Value::FileBundle(FileBundle {
                root: root.to_string(),
                files,
            }),
        ))
    }
}

async fn read_file(path: &Path) -> Result<FileValue, ModuleError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(FileValue {
        path: path.to_string_lossy().into_owned(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content,
    })
}

/// Regular files below `root`, skipping hidden entries
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, ModuleError> {
    if !tokio::fs::metadata(root).await?.is_dir() {
        return Err(ModuleError::invalid_input(
            "path",
            format!("{} is not a folder", root.display()),
        ));
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}
