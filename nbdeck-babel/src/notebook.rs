//! Notebook data model
//!
//!     A [`Notebook`] is an ordered list of [`Cell`]s plus a document-level metadata mapping.
//!     It is read once per document and never mutated by the conversion pipeline; the
//!     execution cache is the only collaborator that returns a modified copy.
//!
//!     The JSON (`.ipynb`, nbformat 4) reader lives here because the model mirrors that
//!     format closely. Text notebooks are read in `converters::text` and produce the same
//!     model, plus a `source_map` metadata entry.
//!
//!     Metadata mappings keep the key order of the source file (serde_json's
//!     `preserve_order`), so re-serialized cell metadata reads back the way it was written.

use crate::error::NotebookError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Tag spellings that exclude a cell from the output entirely.
pub const REMOVE_CELL_TAGS: [&str; 2] = ["remove-cell", "remove_cell"];

/// Mimetype under which notebooks store interactive widget state.
pub const WIDGET_STATE_MIMETYPE: &str = "application/vnd.jupyter.widget-state+json";

/// The only notebook format major version we read.
pub const NBFORMAT_MAJOR: u64 = 4;

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Code,
    Raw,
}

/// One output attached to a code cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: String,
        #[serde(deserialize_with = "multiline")]
        text: String,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u64>,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    /// The mime bundle of display-like outputs.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Output-level metadata of display-like outputs.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        match self {
            Output::DisplayData { metadata, .. } | Output::ExecuteResult { metadata, .. } => {
                Some(metadata)
            }
            _ => None,
        }
    }
}

/// A single notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub kind: CellKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub metadata: Map<String, Value>,
    /// Position of the cell within its notebook
    pub index: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Output>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<u64>,
}

impl Cell {
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            id: None,
            source: source.into(),
            metadata: Map::new(),
            index: 0,
            outputs: Vec::new(),
            execution_count: None,
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellKind::Markdown, source)
    }

    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    /// Replace the metadata with the entries of a JSON object. Non-objects are ignored.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let Value::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Source is empty once surrounding whitespace is trimmed.
    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// String entries of the `tags` metadata list.
    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Tagged with either spelling of the removal marker.
    pub fn is_removed(&self) -> bool {
        self.tags().iter().any(|tag| REMOVE_CELL_TAGS.contains(tag))
    }

    /// The metadata mapping serialized as compact JSON.
    pub fn metadata_json(&self) -> String {
        Value::Object(self.metadata.clone()).to_string()
    }

    fn to_ipynb_value(&self) -> Value {
        let mut cell = Map::new();
        cell.insert("cell_type".into(), serde_json::to_value(self.kind).unwrap_or(Value::Null));
        if let Some(id) = &self.id {
            cell.insert("id".into(), Value::String(id.clone()));
        }
        cell.insert("metadata".into(), Value::Object(self.metadata.clone()));
        cell.insert("source".into(), Value::String(self.source.clone()));
        if self.kind == CellKind::Code {
            cell.insert(
                "execution_count".into(),
                self.execution_count.map(Value::from).unwrap_or(Value::Null),
            );
            cell.insert(
                "outputs".into(),
                serde_json::to_value(&self.outputs).unwrap_or_else(|_| Value::Array(vec![])),
            );
        }
        Value::Object(cell)
    }
}

/// An ordered collection of cells plus document-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    pub metadata: Map<String, Value>,
    pub nbformat: u64,
    pub nbformat_minor: u64,
}

#[derive(Deserialize)]
struct RawNotebook {
    #[serde(default)]
    cells: Vec<RawCell>,
    #[serde(default)]
    metadata: Map<String, Value>,
    nbformat: u64,
    #[serde(default)]
    nbformat_minor: u64,
}

#[derive(Deserialize)]
struct RawCell {
    cell_type: CellKind,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(deserialize_with = "multiline")]
    source: String,
    #[serde(default)]
    outputs: Vec<Output>,
    #[serde(default)]
    execution_count: Option<u64>,
}

impl Notebook {
    /// Build a notebook, assigning each cell its index.
    pub fn new(cells: Vec<Cell>, metadata: Map<String, Value>) -> Self {
        let cells = cells
            .into_iter()
            .enumerate()
            .map(|(index, mut cell)| {
                cell.index = index;
                cell
            })
            .collect();
        Self {
            cells,
            metadata,
            nbformat: NBFORMAT_MAJOR,
            nbformat_minor: 5,
        }
    }

    /// Read an nbformat 4 JSON document.
    pub fn from_ipynb_str(source: &str) -> Result<Self, NotebookError> {
        let raw: RawNotebook = serde_json::from_str(source)?;
        if raw.nbformat != NBFORMAT_MAJOR {
            return Err(NotebookError::UnsupportedVersion(raw.nbformat));
        }
        let cells = raw
            .cells
            .into_iter()
            .map(|cell| Cell {
                kind: cell.cell_type,
                id: cell.id,
                source: cell.source,
                metadata: cell.metadata,
                index: 0,
                outputs: cell.outputs,
                execution_count: cell.execution_count,
            })
            .collect();
        let mut notebook = Self::new(cells, raw.metadata);
        notebook.nbformat_minor = raw.nbformat_minor;
        Ok(notebook)
    }

    /// The notebook as an nbformat 4 JSON value.
    pub fn to_ipynb_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "cells".into(),
            Value::Array(self.cells.iter().map(Cell::to_ipynb_value).collect()),
        );
        root.insert("metadata".into(), Value::Object(self.metadata.clone()));
        root.insert("nbformat".into(), Value::from(self.nbformat));
        root.insert("nbformat_minor".into(), Value::from(self.nbformat_minor));
        Value::Object(root)
    }

    pub fn to_ipynb_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_ipynb_value())
    }

    /// Zero-based start line of every cell, when the notebook was read from text.
    ///
    /// Only returned when it has exactly one entry per cell; anything else would
    /// misplace diagnostics, so callers fall back to pseudo line numbers.
    pub fn source_map(&self) -> Option<Vec<usize>> {
        let entries = self.metadata.get("source_map")?.as_array()?;
        let lines: Option<Vec<usize>> = entries
            .iter()
            .map(|v| v.as_u64().map(|n| n as usize))
            .collect();
        lines.filter(|lines| lines.len() == self.cells.len())
    }

    /// Name of the syntax lexer for code cells.
    ///
    /// Checked in order: `language_info.pygments_lexer`, `language_info.name`,
    /// `kernelspec.language`.
    pub fn lexer_name(&self) -> Option<String> {
        let lookup = |section: &str, key: &str| {
            self.metadata
                .get(section)
                .and_then(|s| s.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        lookup("language_info", "pygments_lexer")
            .or_else(|| lookup("language_info", "name"))
            .or_else(|| lookup("kernelspec", "language"))
    }

    /// Widget state stored in the notebook metadata, if it holds any widget.
    pub fn widget_state(&self) -> Option<&Value> {
        let widgets = self.metadata.get("widgets")?.get(WIDGET_STATE_MIMETYPE)?;
        let has_state = widgets
            .get("state")
            .and_then(Value::as_object)
            .is_some_and(|state| !state.is_empty());
        has_state.then_some(widgets)
    }
}

/// nbformat allows multiline strings as either a string or a list of lines.
fn multiline<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        Single(String),
        Lines(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::Single(text) => text,
        Multiline::Lines(lines) => lines.concat(),
    })
}

/// Text content of a mime bundle entry (string or list of lines).
pub fn mime_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(lines) => Some(lines.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}
