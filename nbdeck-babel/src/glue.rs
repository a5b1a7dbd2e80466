//! Glue registry
//!
//! Display outputs whose metadata carry `scrapbook.name` are published under that name so
//! other pages can embed them. The registry is shared by every document of a build and is
//! safe to fill from parallel workers.

use crate::notebook::Notebook;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlueEntry {
    pub docname: String,
    /// Notebook file the output was materialized in
    pub path: PathBuf,
    pub cell: usize,
    pub output: usize,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlueError {
    #[error("glue key '{0}' is not defined")]
    NotFound(String),
    #[error("glue key '{key}' is defined in several documents: {}", docnames.join(", "))]
    Ambiguous { key: String, docnames: Vec<String> },
}

#[derive(Debug, Default)]
pub struct GlueRegistry {
    entries: Mutex<BTreeMap<String, BTreeMap<String, GlueEntry>>>,
}

impl GlueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BTreeMap<String, GlueEntry>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the keys of `docname` with those defined in `notebook`.
    ///
    /// Returns the number of keys recorded for the document.
    pub fn add_notebook(&self, docname: &str, notebook: &Notebook, path: &Path) -> usize {
        let mut keys = BTreeMap::new();
        for cell in &notebook.cells {
            for (n, output) in cell.outputs.iter().enumerate() {
                let (Some(data), Some(metadata)) = (output.data(), output.metadata()) else {
                    continue;
                };
                let Some(key) = metadata
                    .get("scrapbook")
                    .and_then(|s| s.get("name"))
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                keys.insert(
                    key.to_string(),
                    GlueEntry {
                        docname: docname.to_string(),
                        path: path.to_path_buf(),
                        cell: cell.index,
                        output: n,
                        data: data.clone(),
                    },
                );
            }
        }

        let mut entries = self.lock();
        for key in keys.keys() {
            let clashes: Vec<&str> = entries
                .iter()
                .filter(|(other, defined)| other.as_str() != docname && defined.contains_key(key))
                .map(|(other, _)| other.as_str())
                .collect();
            if !clashes.is_empty() {
                tracing::warn!(
                    key = %key,
                    docname,
                    others = ?clashes,
                    "glue key defined in several documents"
                );
            }
        }
        let count = keys.len();
        if keys.is_empty() {
            entries.remove(docname);
        } else {
            entries.insert(docname.to_string(), keys);
        }
        count
    }

    pub fn resolve(&self, key: &str) -> Result<GlueEntry, GlueError> {
        let entries = self.lock();
        let mut found: Vec<&GlueEntry> =
            entries.values().filter_map(|keys| keys.get(key)).collect();
        match found.len() {
            0 => Err(GlueError::NotFound(key.to_string())),
            1 => Ok(found.remove(0).clone()),
            _ => Err(GlueError::Ambiguous {
                key: key.to_string(),
                docnames: found.iter().map(|entry| entry.docname.clone()).collect(),
            }),
        }
    }

    /// Keys defined by `docname`, sorted.
    pub fn keys(&self, docname: &str) -> Vec<String> {
        self.lock()
            .get(docname)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }
}
