//! HTML format implementation
//!
//! # Library Choice
//!
//! We use the `html5ever` + `rcdom` + `markup5ever` ecosystem for HTML serialization:
//! - `html5ever`: Browser-grade HTML5 serializer from the Servo project
//! - `markup5ever_rcdom`: Reference-counted DOM tree implementation
//!
//! # Element Mapping Table
//!
//! | Node             | HTML                                                      |
//! |------------------|-----------------------------------------------------------|
//! | Section          | `<section id=".." class="section level-N">` + `<hN>`      |
//! | Rubric           | `<p class="rubric">`                                      |
//! | Paragraph        | `<p>`                                                     |
//! | List             | `<ul>` / `<ol start="..">`, tight items without `<p>`     |
//! | LiteralBlock     | `<pre class="literal-block"><code class="language-..">`   |
//! | MathBlock        | `<div class="math">\[..\]</div>`                          |
//! | CellMeta         | `<script type="application/json" data-cell-meta="">`      |
//! | CodeCell         | `<div class="cell">` with `cell_input` / `cell_output`    |
//! | Footnotes        | `<section class="footnotes"><ol>`                         |
//! | WidgetState      | widget state `<script>`                                   |
//!
//! # Page Layout
//!
//! The content is placed directly in `<main id="main-content">` inside `<div class="page">`.
//! The presentation script relies on both: it hides `.page` and reads the carriers from
//! `#main-content`. Header buttons go in `<header class="page-header">`; registered
//! stylesheets are linked in the head and registered scripts at the end of the body,
//! both in registration order.

mod serializer;

pub use serializer::{serialize_body, serialize_to_html, HtmlOptions};

use crate::error::FormatError;
use crate::format::Format;
use crate::page::PageContext;
use crate::tree::{Document, RenderTarget};

/// Format implementation for HTML
#[derive(Default)]
pub struct HtmlFormat {
    options: HtmlOptions,
}

impl HtmlFormat {
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }
}

impl Format for HtmlFormat {
    fn name(&self) -> &str {
        "html"
    }

    fn description(&self) -> &str {
        "HTML5 page with embedded CSS"
    }

    fn file_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }

    fn target(&self) -> RenderTarget {
        RenderTarget::Html
    }

    fn serialize(&self, doc: &Document, page: &PageContext) -> Result<String, FormatError> {
        serializer::serialize_to_html(doc, page, &self.options)
    }
}
