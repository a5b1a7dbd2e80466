//! Error and diagnostic types
//!
//! Fatal conditions are split by blast radius: [`ConversionFailure`] aborts a single
//! document, [`FormatError`] aborts a single serialization, and [`BuildError`] is reserved
//! for problems that stop a whole build (an unreadable source directory, for instance).
//! Everything else is a [`Diagnostic`]: reported with the document name and a best-effort
//! line number, never propagated.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during format operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// Format not found in registry
    #[error("Format '{0}' not found")]
    FormatNotFound(String),
    /// Error during serialization
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Format does not support the requested operation
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

/// Reasons a source text could not be read as a notebook.
#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid notebook front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
    #[error("unsupported nbformat version {0} (expected 4)")]
    UnsupportedVersion(u64),
    #[error("malformed text notebook at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// A document could not be converted to a notebook. Fatal for that document only.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{docname}:{line}: conversion to notebook failed: {reason}")]
pub struct ConversionFailure {
    pub docname: String,
    pub line: usize,
    pub reason: String,
}

/// Errors raised while writing notebook outputs to the build directory.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("output {cell}:{output} has undecodable {mime} data: {source}")]
    Decode {
        cell: usize,
        output: usize,
        mime: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("failed to serialize notebook: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that stop a build before any document is processed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Category of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A cell metadata payload is not valid JSON
    MalformedCellMetadata,
    /// No language hint found in the notebook metadata
    UnresolvedLanguageLexer,
    /// A link reference label was defined more than once
    DuplicateReference,
    /// A fenced block named a directive that is not registered
    UnknownDirective,
    /// The configured code cell renderer is not registered
    UnknownRenderer,
    /// Outputs could not be written to the build directory
    MaterializeFailed,
    /// The token stream did not nest correctly
    MalformedTokens,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::MalformedCellMetadata => "malformed-cell-metadata",
            DiagnosticKind::UnresolvedLanguageLexer => "unresolved-language-lexer",
            DiagnosticKind::DuplicateReference => "duplicate-reference",
            DiagnosticKind::UnknownDirective => "unknown-directive",
            DiagnosticKind::UnknownRenderer => "unknown-renderer",
            DiagnosticKind::MaterializeFailed => "materialize-failed",
            DiagnosticKind::MalformedTokens => "malformed-tokens",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem found while converting or rendering a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub docname: Option<String>,
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            docname: None,
            line,
            message: message.into(),
        }
    }

    /// Attach the document name, keeping one already set.
    pub fn in_document(mut self, docname: &str) -> Self {
        if self.docname.is_none() {
            self.docname = Some(docname.to_string());
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let docname = self.docname.as_deref().unwrap_or("<unknown>");
        match self.line {
            Some(line) => write!(f, "{docname}:{line}: WARNING: {} [{}]", self.message, self.kind),
            None => write!(f, "{docname}: WARNING: {} [{}]", self.message, self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_location() {
        let diag = Diagnostic::new(DiagnosticKind::DuplicateReference, Some(12), "dup 'x'")
            .in_document("intro");
        assert_eq!(
            diag.to_string(),
            "intro:12: WARNING: dup 'x' [duplicate-reference]"
        );
    }

    #[test]
    fn in_document_keeps_existing_name() {
        let diag = Diagnostic::new(DiagnosticKind::UnknownDirective, None, "m")
            .in_document("first")
            .in_document("second");
        assert_eq!(diag.docname.as_deref(), Some("first"));
    }

    #[test]
    fn conversion_failure_display() {
        let failure = ConversionFailure {
            docname: "nb".to_string(),
            line: 1,
            reason: "bad json".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "nb:1: conversion to notebook failed: bad json"
        );
    }
}
