//! Notebook converters
//!
//! A converter decides whether it can read a document and turns its source into a
//! [`Notebook`]. Documents no converter accepts are treated as plain markup.

pub mod ipynb;
pub mod text;

pub use ipynb::IpynbConverter;
pub use text::TextNotebookConverter;

use crate::error::NotebookError;
use crate::markup::ParserConfig;
use crate::notebook::Notebook;
use std::path::Path;

pub trait NotebookConverter: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this converter reads the document at `path`, whose first lines are `lines`.
    fn accepts(&self, path: &Path, lines: &[&str]) -> bool;

    fn convert(&self, source: &str) -> Result<Notebook, NotebookError>;

    /// Parser options for the markdown cells of converted notebooks.
    fn parser_config(&self) -> ParserConfig;
}

/// Converters, tried in registration order.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: Vec<Box<dyn NotebookConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter, replacing one with the same name in place.
    pub fn register<C: NotebookConverter + 'static>(&mut self, converter: C) {
        match self
            .converters
            .iter()
            .position(|existing| existing.name() == converter.name())
        {
            Some(index) => self.converters[index] = Box::new(converter),
            None => self.converters.push(Box::new(converter)),
        }
    }

    /// First converter accepting the document.
    pub fn resolve(&self, path: &Path, lines: &[&str]) -> Option<&dyn NotebookConverter> {
        self.converters
            .iter()
            .find(|converter| converter.accepts(path, lines))
            .map(|converter| converter.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    pub fn with_defaults(config: ParserConfig) -> Self {
        let mut registry = Self::new();
        registry.register(IpynbConverter::new(config));
        registry.register(TextNotebookConverter::new(config));
        registry
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}
