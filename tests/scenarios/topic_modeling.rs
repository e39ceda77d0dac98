//! Test: Topic Modeling - text corpus preparation from a folder of files

use crate::helpers::*;
use std::path::Path;
use std::sync::Arc;
use stepwire::core::config::WorkflowConfig;
use stepwire::core::{StepStatus, Value};
use stepwire::execution::SchedulingStrategy;
use stepwire::persistence::{InMemorySnapshotStore, SnapshotStore};
use stepwire::{OperationRegistry, Workflow, WorkflowError};

const TOPIC_MODELING: &str = r#"
alias: topic_modeling
doc: Tokenize and clean a corpus of newspaper texts, dated by file name
steps:
  - id: import_text_corpus
    operation: import.file_bundle
    config:
      constants: { include_file_types: [".txt"] }
  - id: create_text_corpus
    operation: create.table
    config: { source_type: text_file_bundle, target_type: table }
  - id: extract_texts_column
    operation: table.cut_column
    config:
      constants: { column_name: content }
  - id: extract_filename_column
    operation: table.cut_column
    config:
      constants: { column_name: file_name }
  - id: create_date_array
    operation: parse.date_array
  - id: create_stopwords_list
    operation: create.stopwords_list
  - id: tokenize_corpus
    operation: tokenize.texts_array
  - id: preprocess_corpus
    operation: preprocess.tokens_array
    config:
      defaults: { to_lowercase: true }
connections:
  - { target: create_text_corpus.text_file_bundle, source: import_text_corpus.file_bundle }
  - { target: extract_texts_column.table, source: create_text_corpus.table }
  - { target: extract_filename_column.table, source: create_text_corpus.table }
  - { target: create_date_array.array, source: extract_filename_column.array }
  - { target: tokenize_corpus.texts_array, source: extract_texts_column.array }
  - { target: preprocess_corpus.tokens_array, source: tokenize_corpus.tokens_array }
  - { target: preprocess_corpus.remove_stopwords, source: create_stopwords_list.stopwords_list }
input_aliases:
  text_corpus_folder_path: import_text_corpus.path
  date_parse_min: create_date_array.min_index
  date_parse_max: create_date_array.max_index
  date_force_non_null: create_date_array.force_non_null
  languages: create_stopwords_list.languages
  remove_all_numeric: preprocess_corpus.remove_all_numeric
  remove_short_tokens: preprocess_corpus.remove_short_tokens
  remove_stopwords: preprocess_corpus.remove_stopwords
output_aliases:
  preprocessed_tokens: preprocess_corpus.tokens_array
  date_array: create_date_array.date_array
inputs:
  date_parse_min: 11
  date_parse_max: 21
  languages: [italian]
  remove_all_numeric: true
  remove_short_tokens: 3
"#;

fn corpus(dir: &Path) {
    write_file(dir, "sole_24ore_1902-01-11.txt", "Il gatto e la volpe");
    write_file(dir, "sole_24ore_1902-01-12.txt", "La volpe corre nel bosco");
    write_file(dir, "volumes/sole_24ore_1917-10-20.txt", "Bosco 1902");
    write_file(dir, "notes.md", "not part of the corpus");
    write_file(dir, ".hidden.txt", "skipped");
}

async fn build(dir: &Path, strategy: SchedulingStrategy) -> Workflow {
    let registry = Arc::new(OperationRegistry::with_builtin_operations());
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
    let mut workflow = WorkflowConfig::from_yaml(TOPIC_MODELING)
        .unwrap()
        .build(registry, store, false)
        .await
        .unwrap()
        .with_strategy(strategy);
    workflow
        .set_input(
            "text_corpus_folder_path",
            Some(Value::String(dir.to_string_lossy().into_owned())),
        )
        .unwrap();
    workflow
}

fn date_array(workflow: &Workflow) -> Vec<String> {
    let outputs = workflow.current_output_values();
    let Some(Value::Array(dates)) = outputs.get("date_array") else {
        panic!("date_array not produced: {:?}", outputs);
    };
    dates.iter().map(|d| d.as_str().unwrap().to_string()).collect()
}

fn token_lists(workflow: &Workflow) -> Vec<Vec<String>> {
    let outputs = workflow.current_output_values();
    let Some(Value::Array(documents)) = outputs.get("preprocessed_tokens") else {
        panic!("preprocessed_tokens not produced: {:?}", outputs);
    };
    documents
        .iter()
        .map(|document| {
            document
                .as_items()
                .unwrap()
                .iter()
                .map(|t| t.as_str().unwrap().to_string())
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_corpus_preprocessing() {
    let dir = temp_dir("corpus");
    corpus(&dir);

    let mut workflow = build(&dir, SchedulingStrategy::Sequential).await;
    let summary = workflow.process_steps().await.unwrap();
    assert!(summary.failed.is_empty(), "failed: {:?}", summary.failed);

    assert_eq!(
        token_lists(&workflow),
        vec![
            vec!["gatto", "volpe"],
            vec!["volpe", "corre", "bosco"],
            vec!["bosco"],
        ]
    );

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let dir = temp_dir("corpus-parallel");
    corpus(&dir);

    let mut sequential = build(&dir, SchedulingStrategy::Sequential).await;
    let mut parallel = build(&dir, SchedulingStrategy::Parallel).await;
    let mut limited = build(&dir, SchedulingStrategy::LimitedParallel(2)).await;
    sequential.process_steps().await.unwrap();
    parallel.process_steps().await.unwrap();
    limited.process_steps().await.unwrap();

    assert_eq!(token_lists(&parallel), token_lists(&sequential));
    assert_eq!(token_lists(&limited), token_lists(&sequential));

    std::fs::remove_dir_all(dir).ok();
}

/// Changing the stopword languages re-runs only the stopword branch
#[tokio::test]
async fn test_changing_languages() {
    let dir = temp_dir("corpus-languages");
    corpus(&dir);

    let mut workflow = build(&dir, SchedulingStrategy::Sequential).await;
    workflow.process_steps().await.unwrap();

    workflow
        .set_input("languages", Some(Value::List(vec![])))
        .unwrap();
    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(summary.executed, vec!["create_stopwords_list", "preprocess_corpus"]);
    assert_eq!(
        token_lists(&workflow),
        vec![
            // "il", "la" and "e" are still shorter than 3 characters
            vec!["gatto", "volpe"],
            vec!["volpe", "corre", "nel", "bosco"],
            vec!["bosco"],
        ]
    );

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_dates_from_file_names() {
    let dir = temp_dir("corpus-dates");
    corpus(&dir);

    let mut workflow = build(&dir, SchedulingStrategy::Parallel).await;
    workflow.process_steps().await.unwrap();

    assert_eq!(date_array(&workflow), vec!["1902-01-11", "1902-01-12", "1917-10-20"]);

    std::fs::remove_dir_all(dir).ok();
}

/// A file name without a date fails the date branch, the tokens still come through
#[tokio::test]
async fn test_undated_file() {
    let dir = temp_dir("corpus-undated");
    corpus(&dir);
    write_file(&dir, "untitled_scan.txt", "Gatto");

    let mut workflow = build(&dir, SchedulingStrategy::Sequential).await;
    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(summary.failed, vec!["create_date_array"]);
    assert_step_status(&workflow, "preprocess_corpus", StepStatus::Resolved);
    assert_eq!(token_lists(&workflow).len(), 4);

    workflow.set_input("date_force_non_null", Some(Value::Boolean(false))).unwrap();
    let summary = workflow.process_steps().await.unwrap();
    assert_eq!(summary.executed, vec!["create_date_array"]);
    assert_eq!(
        date_array(&workflow),
        vec!["1902-01-11", "1902-01-12", "", "1917-10-20"]
    );

    std::fs::remove_dir_all(dir).ok();
}

/// `remove_stopwords` is aliased but fed by the stopword step
#[tokio::test]
async fn test_connected_alias_is_not_settable() {
    let dir = temp_dir("corpus-alias");
    corpus(&dir);

    let mut workflow = build(&dir, SchedulingStrategy::Sequential).await;
    let err = workflow
        .set_input("remove_stopwords", Some(Value::List(vec![])))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AlreadyConnected { ref existing, .. } if existing == "create_stopwords_list.stopwords_list"
    ));

    workflow.process_steps().await.unwrap();
    assert_eq!(token_lists(&workflow)[0], vec!["gatto", "volpe"]);

    std::fs::remove_dir_all(dir).ok();
}
