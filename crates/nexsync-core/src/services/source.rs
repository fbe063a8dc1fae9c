//! Record source seam and the data-directory implementation.
//!
//! Files are named `<MODEL>_data.json` (a JSON array, or an object with a
//! `records` array) or `<MODEL>_data.jsonl` (one object per line). The model
//! part may use the model name verbatim or with dots replaced by
//! underscores: `crm.lead_data.json` and `crm_lead_data.json` both work.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nexsync_models::RawRecord;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const DATA_SUFFIX: &str = "_data";
const EXTENSIONS: &[&str] = &["json", "jsonl"];

/// Produces raw records for a model.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Load all records of a model, from `file_path` when given.
    ///
    /// A missing or unreadable source is [`Error::FileNotFound`].
    async fn load(&self, model_name: &str, file_path: Option<&str>) -> Result<Vec<RawRecord>>;

    /// Model stems of every data file present, sorted
    async fn discover(&self) -> Result<Vec<String>>;
}

/// Reads record files from one directory.
#[derive(Debug, Clone)]
pub struct JsonRecordSource {
    data_dir: PathBuf,
}

impl JsonRecordSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Candidate file paths for a model, in lookup order
    fn candidates(&self, model_name: &str) -> Vec<PathBuf> {
        let mut stems = vec![model_name.to_string()];
        let underscored = model_name.replace('.', "_");
        if underscored != model_name {
            stems.push(underscored);
        }

        stems
            .iter()
            .flat_map(|stem| {
                EXTENSIONS
                    .iter()
                    .map(move |ext| self.data_dir.join(format!("{}{}.{}", stem, DATA_SUFFIX, ext)))
            })
            .collect()
    }

    async fn resolve(&self, model_name: &str, file_path: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = file_path {
            let direct = PathBuf::from(path);
            if fs::try_exists(&direct).await.unwrap_or(false) {
                return Ok(direct);
            }
            let in_data_dir = self.data_dir.join(path);
            if fs::try_exists(&in_data_dir).await.unwrap_or(false) {
                return Ok(in_data_dir);
            }
            return Err(Error::FileNotFound(path.to_string()));
        }

        for candidate in self.candidates(model_name) {
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }

        Err(Error::FileNotFound(format!(
            "No data file for {} in {}",
            model_name,
            self.data_dir.display()
        )))
    }
}

#[async_trait]
impl RecordSource for JsonRecordSource {
    async fn load(&self, model_name: &str, file_path: Option<&str>) -> Result<Vec<RawRecord>> {
        let path = self.resolve(model_name, file_path).await?;

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Error::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let records = if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            parse_lines(&content, &path)?
        } else {
            parse_document(&content, &path)?
        };

        debug!(
            model = %model_name,
            path = %path.display(),
            count = records.len(),
            "Records loaded"
        );
        Ok(records)
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.data_dir).await.map_err(|e| {
            Error::FileNotFound(format!("{}: {}", self.data_dir.display(), e))
        })?;

        let mut stems = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !EXTENSIONS.contains(&ext) {
                continue;
            }
            let Some(stem) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(DATA_SUFFIX))
                .filter(|s| !s.is_empty())
            else {
                continue;
            };
            if !stems.iter().any(|s| s == stem) {
                stems.push(stem.to_string());
            }
        }

        stems.sort();
        Ok(stems)
    }
}

fn parse_document(content: &str, path: &Path) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{}: expected an array or an object with a records array",
                    path.display()
                )))
            }
        },
        _ => {
            return Err(Error::InvalidInput(format!(
                "{}: expected an array or an object with a records array",
                path.display()
            )))
        }
    };

    Ok(into_records(items, path))
}

fn parse_lines(content: &str, path: &Path) -> Result<Vec<RawRecord>> {
    let items = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line).map_err(|e| {
                Error::InvalidInput(format!("{} line {}: {}", path.display(), index + 1, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(into_records(items, path))
}

/// Keeps object rows; anything else is dropped with a warning.
fn into_records(items: Vec<Value>, path: &Path) -> Vec<RawRecord> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Object(map) => Some(map),
            other => {
                warn!(
                    path = %path.display(),
                    index,
                    kind = %json_kind(&other),
                    "Skipping non-object row"
                );
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
