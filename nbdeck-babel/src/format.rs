//! Format trait definition
//!
//! This module defines the core Format trait that all output formats implement.
//! A format turns a finished document tree plus its page context into text.

use crate::error::FormatError;
use crate::page::PageContext;
use crate::tree::{Document, RenderTarget};

/// Trait for output formats
///
/// # Examples
///
/// ```ignore
/// struct MyFormat;
///
/// impl Format for MyFormat {
///     fn name(&self) -> &str {
///         "my-format"
///     }
///
///     fn target(&self) -> RenderTarget {
///         RenderTarget::Text
///     }
///
///     fn serialize(&self, doc: &Document, page: &PageContext) -> Result<String, FormatError> {
///         todo!()
///     }
/// }
/// ```
pub trait Format: Send + Sync {
    /// The name of this format (e.g., "html", "latex")
    fn name(&self) -> &str;

    /// Optional description of this format
    fn description(&self) -> &str {
        ""
    }

    /// File extensions associated with this format, without the leading dot.
    ///
    /// The first one is used for output files.
    fn file_extensions(&self) -> &[&str] {
        &[]
    }

    /// Render target passed to nodes that draw themselves, such as metadata carriers.
    fn target(&self) -> RenderTarget;

    /// Serialize a document tree for the page described by `page`
    fn serialize(&self, doc: &Document, page: &PageContext) -> Result<String, FormatError>;
}
