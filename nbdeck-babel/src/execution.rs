//! Execution cache
//!
//!     Code cells are never run here. When execution is enabled, a cache collaborator looks
//!     up stored outputs for the notebook and returns a copy with those outputs attached.
//!     A miss returns the notebook unchanged.
//!
//!     [`DirectoryCache`] keys a notebook by the blake3 hash of its code cell sources, so
//!     editing markdown never invalidates a cache entry while editing code always does.

use crate::notebook::{CellKind, Notebook, Output};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Use the outputs stored in the notebook
    #[default]
    Off,
    /// Replace outputs with cached ones when the cache has an entry
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    pub mode: ExecutionMode,
    pub show_traceback: bool,
    pub cache_path: PathBuf,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Off,
            show_traceback: false,
            cache_path: PathBuf::from(".nbdeck/cache"),
        }
    }
}

pub trait ExecutionCache: Send + Sync {
    /// The notebook with cached outputs attached, or the input when nothing is cached.
    fn apply<'a>(&self, notebook: &'a Notebook, show_traceback: bool) -> Cow<'a, Notebook>;
}

/// Never changes the notebook.
pub struct NoExecution;

impl ExecutionCache for NoExecution {
    fn apply<'a>(&self, notebook: &'a Notebook, _show_traceback: bool) -> Cow<'a, Notebook> {
        Cow::Borrowed(notebook)
    }
}

/// Reads executed notebooks stored as `<dir>/<key>.ipynb`.
pub struct DirectoryCache {
    dir: PathBuf,
}

impl DirectoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, notebook: &Notebook) -> PathBuf {
        self.dir.join(format!("{}.ipynb", cache_key(notebook)))
    }

    /// Store an executed notebook under the key of its code sources.
    pub fn store(&self, executed: &Notebook) -> std::io::Result<PathBuf> {
        let path = self.entry_path(executed);
        fs::create_dir_all(&self.dir)?;
        let text = executed
            .to_ipynb_string()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        fs::write(&path, text)?;
        Ok(path)
    }
}

impl ExecutionCache for DirectoryCache {
    fn apply<'a>(&self, notebook: &'a Notebook, show_traceback: bool) -> Cow<'a, Notebook> {
        let path = self.entry_path(notebook);
        let Ok(text) = fs::read_to_string(&path) else {
            tracing::debug!(path = %path.display(), "execution cache miss");
            return Cow::Borrowed(notebook);
        };
        let cached = match Notebook::from_ipynb_str(&text) {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "ignoring unreadable cache entry"
                );
                return Cow::Borrowed(notebook);
            }
        };

        let mut merged = notebook.clone();
        let mut cached_code = cached.cells.iter().filter(|c| c.kind == CellKind::Code);
        for cell in merged.cells.iter_mut().filter(|c| c.kind == CellKind::Code) {
            let Some(hit) = cached_code.next() else {
                break;
            };
            cell.execution_count = hit.execution_count;
            cell.outputs = hit
                .outputs
                .iter()
                .map(|output| strip_traceback(output, show_traceback))
                .collect();
        }
        tracing::debug!(path = %path.display(), "execution cache hit");
        Cow::Owned(merged)
    }
}

/// Hex blake3 digest of the code cell sources, in order.
pub fn cache_key(notebook: &Notebook) -> String {
    let mut hasher = blake3::Hasher::new();
    for cell in notebook.cells.iter().filter(|c| c.kind == CellKind::Code) {
        hasher.update(cell.source.as_bytes());
        hasher.update(&[0]);
    }
    hex::encode(hasher.finalize().as_bytes())
}

fn strip_traceback(output: &Output, show_traceback: bool) -> Output {
    match output {
        Output::Error { ename, evalue, .. } if !show_traceback => Output::Error {
            ename: ename.clone(),
            evalue: evalue.clone(),
            traceback: Vec::new(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;
    use serde_json::Map;

    fn notebook(code: &str) -> Notebook {
        Notebook::new(
            vec![Cell::markdown("# Intro"), Cell::code(code)],
            Map::new(),
        )
    }

    #[test]
    fn key_ignores_markdown() {
        let mut a = notebook("1 + 1");
        let b = notebook("1 + 1");
        a.cells[0].source = "# Changed".to_string();
        assert_eq!(cache_key(&a), cache_key(&b));
        assert_ne!(cache_key(&a), cache_key(&notebook("1 + 2")));
        assert_eq!(cache_key(&a).len(), 64);
    }

    #[test]
    fn miss_borrows_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let nb = notebook("x");
        let cache = DirectoryCache::new(dir.path());
        assert!(matches!(cache.apply(&nb, false), Cow::Borrowed(_)));
        assert!(matches!(NoExecution.apply(&nb, false), Cow::Borrowed(_)));
    }

    #[test]
    fn hit_copies_outputs_and_strips_tracebacks() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path());

        let mut executed = notebook("1/0");
        executed.cells[1].execution_count = Some(7);
        executed.cells[1].outputs = vec![Output::Error {
            ename: "ZeroDivisionError".to_string(),
            evalue: "division by zero".to_string(),
            traceback: vec!["line 1".to_string()],
        }];
        cache.store(&executed).unwrap();

        let source = notebook("1/0");
        let merged = cache.apply(&source, false);
        assert_eq!(merged.cells[1].execution_count, Some(7));
        match &merged.cells[1].outputs[0] {
            Output::Error { traceback, .. } => assert!(traceback.is_empty()),
            other => panic!("unexpected {other:?}"),
        }

        let verbose = cache.apply(&source, true);
        match &verbose.cells[1].outputs[0] {
            Output::Error { traceback, .. } => assert_eq!(traceback.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
