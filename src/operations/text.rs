//! Text preprocessing: stopwords, tokenization, token filters

use super::{bool_input, items_input, required, single};
use crate::core::{DataType, FieldSchema, StepConfig, Value, ValueMap};
use crate::registry::{Module, ModuleError, ModuleSchema};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:['’]\w+)*").expect("word pattern compiles"));

const ENGLISH: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more",
    "most", "my", "no", "not", "of", "on", "one", "only", "or", "other", "our", "out", "she", "so",
    "some", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to",
    "up", "was", "we", "were", "what", "when", "which", "who", "will", "with", "would", "you",
    "your",
];

const ITALIAN: &[&str] = &[
    "a", "ad", "al", "alla", "alle", "agli", "ai", "anche", "che", "chi", "ci", "come", "con",
    "da", "dal", "dalla", "dei", "del", "della", "delle", "dello", "degli", "di", "e", "ed", "è",
    "gli", "ha", "hanno", "i", "il", "in", "la", "le", "lo", "ma", "mi", "ne", "nei", "nel",
    "nella", "non", "o", "per", "più", "quale", "quando", "questa", "questo", "se", "si", "sono",
    "su", "sua", "sue", "suo", "sul", "sulla", "ti", "tra", "un", "una", "uno", "vi",
];

const GERMAN: &[&str] = &[
    "aber", "als", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "das", "dass", "dem",
    "den", "der", "des", "die", "du", "ein", "eine", "einem", "einen", "einer", "er", "es", "für",
    "hat", "ich", "im", "in", "ist", "mit", "nach", "nicht", "noch", "nur", "oder", "sich", "sie",
    "sind", "so", "um", "und", "von", "vor", "war", "was", "wie", "wir", "zu", "zum", "zur",
];

const FRENCH: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux", "il",
    "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "mes", "moi", "mon", "ne", "nous",
    "on", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa", "se", "ses", "son", "sur", "ta",
    "te", "tes", "toi", "ton", "tu", "un", "une", "vous",
];

fn builtin_stopwords(language: &str) -> Option<&'static [&'static str]> {
    match language.to_lowercase().as_str() {
        "english" => Some(ENGLISH),
        "italian" => Some(ITALIAN),
        "german" => Some(GERMAN),
        "french" => Some(FRENCH),
        _ => None,
    }
}

/// `create.stopwords_list`
pub struct StopwordsListModule;

#[async_trait]
impl Module for StopwordsListModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(
                FieldSchema::new("languages", DataType::List)
                    .with_doc("Languages whose built-in stopwords to include (english, italian, german, french)")
                    .optional(),
            )
            .input(
                FieldSchema::new("stopword_lists", DataType::List)
                    .with_doc("Additional stopwords, as words or lists of words")
                    .optional(),
            )
            .output(FieldSchema::new("stopwords_list", DataType::List).with_doc("Sorted, lowercased stopwords")))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let mut words = BTreeSet::new();

        if inputs.contains_key("languages") {
            for language in items_input(inputs, "languages")? {
                let name = language
                    .as_str()
                    .ok_or_else(|| ModuleError::invalid_input("languages", "expected language names"))?;
                let list = builtin_stopwords(name).ok_or_else(|| {
                    ModuleError::invalid_input("languages", format!("no stopwords for language '{}'", name))
                })?;
                words.extend(list.iter().map(|w| w.to_string()));
            }
        }

        if inputs.contains_key("stopword_lists") {
            for item in items_input(inputs, "stopword_lists")? {
                match item {
                    Value::String(word) => {
                        words.insert(word.to_lowercase());
                    }
                    Value::List(list) => {
                        for word in list {
                            let word = word.as_str().ok_or_else(|| {
                                ModuleError::invalid_input("stopword_lists", "stopwords must be strings")
                            })?;
                            words.insert(word.to_lowercase());
                        }
                    }
                    _ => {
                        return Err(ModuleError::invalid_input(
                            "stopword_lists",
                            "expected words or lists of words",
                        ))
                    }
                }
            }
        }

        Ok(single(
            "stopwords_list",
            Value::List(words.into_iter().map(Value::String).collect()),
        ))
    }
}

/// `tokenize.texts_array`: one token list per text
pub struct TokenizeTextsModule;

#[async_trait]
impl Module for TokenizeTextsModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        Ok(ModuleSchema::new()
            .input(FieldSchema::new("texts_array", DataType::Array))
            .input(
                FieldSchema::new("tokenize_by_word", DataType::Boolean)
                    .with_doc("Split into words, dropping punctuation; otherwise split on whitespace")
                    .with_default(Value::Boolean(true)),
            )
            .output(FieldSchema::new("tokens_array", DataType::Array)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let texts = items_input(inputs, "texts_array")?;
        let by_word = bool_input(inputs, "tokenize_by_word")?;

        let mut tokens_array = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let text = text.as_str().ok_or_else(|| {
                ModuleError::invalid_input(
                    "texts_array",
                    format!("item {} is {}, expected a string", index, text.data_type()),
                )
            })?;
            let tokens: Vec<Value> = if by_word {
                WORD.find_iter(text)
                    .map(|m| Value::String(m.as_str().to_string()))
                    .collect()
            } else {
                text.split_whitespace()
                    .map(|t| Value::String(t.to_string()))
                    .collect()
            };
            tokens_array.push(Value::List(tokens));
        }

        Ok(single("tokens_array", Value::Array(tokens_array)))
    }
}

/// `preprocess.tokens_array`: lowercase and filter token lists
pub struct PreprocessTokensModule;

#[async_trait]
impl Module for PreprocessTokensModule {
    fn schema(&self, _config: &StepConfig) -> Result<ModuleSchema, ModuleError> {
        let flag = |name: &str, doc: &str| {
            FieldSchema::new(name, DataType::Boolean)
                .with_default(Value::Boolean(false))
                .with_doc(doc)
        };

        Ok(ModuleSchema::new()
            .input(FieldSchema::new("tokens_array", DataType::Array))
            .input(flag("to_lowercase", "Lowercase all tokens"))
            .input(flag("remove_alphanumeric", "Remove tokens mixing letters and digits"))
            .input(flag("remove_non_alpha", "Remove tokens with non-alphabetic characters"))
            .input(flag("remove_all_numeric", "Remove tokens made only of digits"))
            .input(
                FieldSchema::new("remove_short_tokens", DataType::Integer)
                    .with_default(Value::Integer(0))
                    .with_doc("Remove tokens shorter than this many characters"),
            )
            .input(
                FieldSchema::new("remove_stopwords", DataType::List)
                    .with_doc("Words to remove (case-insensitive)")
                    .optional(),
            )
            .output(FieldSchema::new("tokens_array", DataType::Array)))
    }

    async fn process(&self, _config: &StepConfig, inputs: &ValueMap) -> Result<ValueMap, ModuleError> {
        let documents = items_input(inputs, "tokens_array")?;
        let to_lowercase = bool_input(inputs, "to_lowercase")?;
        let remove_alphanumeric = bool_input(inputs, "remove_alphanumeric")?;
        let remove_non_alpha = bool_input(inputs, "remove_non_alpha")?;
        let remove_all_numeric = bool_input(inputs, "remove_all_numeric")?;
        let min_length = required(inputs, "remove_short_tokens")?
            .as_i64()
            .ok_or_else(|| ModuleError::invalid_input("remove_short_tokens", "expected an integer"))?
            .max(0) as usize;

        let stopwords: HashSet<String> = match inputs.get("remove_stopwords") {
            Some(list) => list
                .as_items()
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase)
                .collect(),
            None => HashSet::new(),
        };

        let keep = |token: &str| -> bool {
            let has_alpha = token.chars().any(char::is_alphabetic);
            let has_digit = token.chars().any(|c| c.is_ascii_digit());

            !(remove_all_numeric && token.chars().all(|c| c.is_ascii_digit())
                || remove_alphanumeric && has_alpha && has_digit
                || remove_non_alpha && !token.chars().all(char::is_alphabetic)
                || token.chars().count() < min_length
                || stopwords.contains(&token.to_lowercase()))
        };

        let mut processed = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let tokens = document.as_items().ok_or_else(|| {
                ModuleError::invalid_input("tokens_array", format!("item {} is not a token list", index))
            })?;

            let mut kept = Vec::with_capacity(tokens.len());
            for token in tokens {
                let token = token
                    .as_str()
                    .ok_or_else(|| ModuleError::invalid_input("tokens_array", "tokens must be strings"))?;
                let token = if to_lowercase { token.to_lowercase() } else { token.to_string() };
                if keep(&token) {
                    kept.push(Value::String(token));
                }
            }
            processed.push(Value::List(kept));
        }

        Ok(single("tokens_array", Value::Array(processed)))
    }
}
