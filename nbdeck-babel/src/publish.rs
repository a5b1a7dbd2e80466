//! Single-document publishing.
//!
//! Provides a high-level API for rendering one parsed document to an output format.
//! This module bridges the format registry and file I/O, handling both in-memory and
//! file-based output.
//!
//! Use this for one-off conversions where a single call should handle format selection,
//! page context defaults, serialization and optional file writing. Whole directories go
//! through [`crate::build::Builder`] instead.

use crate::error::FormatError;
use crate::page::PageContext;
use crate::registry::FormatRegistry;
use crate::tree::Document;
use std::fs;
use std::path::{Path, PathBuf};

/// Specifies how to publish a document.
///
/// ```ignore
/// let spec = PublishSpec::new(&document, "html")
///     .with_page(PageContext::new("deck", "Deck"))
///     .with_output_path("deck.html");
/// ```
///
/// If no output path is provided, the rendered text is returned in memory.
#[derive(Debug)]
pub struct PublishSpec<'a> {
    pub document: &'a Document,
    /// Target format name (e.g., "html", "latex").
    pub format: &'a str,
    /// Page context; derived from the document title when absent.
    pub page: Option<PageContext>,
    pub output: Option<PathBuf>,
}

impl<'a> PublishSpec<'a> {
    pub fn new(document: &'a Document, format: &'a str) -> Self {
        Self {
            document,
            format,
            page: None,
            output: None,
        }
    }

    pub fn with_page(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the output file path. If provided, content is written to disk.
    pub fn with_output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    fn page_context(&self) -> PageContext {
        match &self.page {
            Some(page) => page.clone(),
            None => {
                let pagename = self
                    .output
                    .as_deref()
                    .and_then(|path| path.file_stem())
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("index")
                    .to_string();
                let title = self.document.title().unwrap_or_else(|| pagename.clone());
                PageContext::new(pagename, title)
            }
        }
    }
}

/// The output from a successful publish operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishArtifact {
    InMemory(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub artifact: PublishArtifact,
}

/// Publishes a document according to the specification.
///
/// # Errors
///
/// Returns [`FormatError`] if the format is not registered, serialization fails or the
/// output file cannot be written.
pub fn publish(
    spec: PublishSpec<'_>,
    registry: &FormatRegistry,
) -> Result<PublishResult, FormatError> {
    let page = spec.page_context();
    let text = registry.serialize(spec.document, &page, spec.format)?;
    write_or_return_text(text, spec.output)
}

fn write_or_return_text(
    text: String,
    output: Option<PathBuf>,
) -> Result<PublishResult, FormatError> {
    if let Some(path) = output {
        write_to_path(path, text.into_bytes()).map(|path| PublishResult {
            artifact: PublishArtifact::File(path),
        })
    } else {
        Ok(PublishResult {
            artifact: PublishArtifact::InMemory(text),
        })
    }
}

fn write_to_path(path: PathBuf, bytes: Vec<u8>) -> Result<PathBuf, FormatError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| FormatError::SerializationError(err.to_string()))?;
    }
    fs::write(&path, &bytes)
        .map(|_| path.clone())
        .map_err(|err| FormatError::SerializationError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Inline;
    use crate::tree::{DocNode, Paragraph, Section};
    use tempfile::tempdir;

    fn sample_document() -> Document {
        Document {
            children: vec![DocNode::Section(Section {
                level: 1,
                title: vec![Inline::Text("Deck".to_string())],
                id: "deck".to_string(),
                children: vec![DocNode::Paragraph(Paragraph {
                    content: vec![Inline::Text("Paragraph text.".to_string())],
                })],
            })],
            ..Document::default()
        }
    }

    #[test]
    fn publishes_to_memory_when_no_output_path() {
        let doc = sample_document();
        let registry = FormatRegistry::with_defaults();
        let result = publish(PublishSpec::new(&doc, "html"), &registry).expect("publish");
        match result.artifact {
            PublishArtifact::InMemory(content) => {
                assert!(content.contains("Paragraph text."));
                assert!(content.contains("<title>Deck</title>"));
            }
            PublishArtifact::File(_) => panic!("expected in-memory artifact"),
        }
    }

    #[test]
    fn writes_to_disk_when_output_path_provided() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/output.txt");
        let doc = sample_document();
        let registry = FormatRegistry::with_defaults();
        let result = publish(
            PublishSpec::new(&doc, "text").with_output_path(&path),
            &registry,
        )
        .expect("publish");
        match result.artifact {
            PublishArtifact::File(p) => assert_eq!(p, path),
            PublishArtifact::InMemory(_) => panic!("expected file artifact"),
        }
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "Deck\n====\n\nParagraph text.\n");
    }

    #[test]
    fn unknown_format_is_reported() {
        let doc = sample_document();
        let registry = FormatRegistry::with_defaults();
        let err = publish(PublishSpec::new(&doc, "docx"), &registry).unwrap_err();
        assert!(matches!(err, FormatError::FormatNotFound(_)));
    }
}
