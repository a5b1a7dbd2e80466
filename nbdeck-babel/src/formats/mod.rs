//! Format implementations
//!
//! This module contains the output formats that serialize a document tree.

pub mod common;
pub mod html;
pub mod latex;
pub mod man;
pub mod text;

pub use html::{HtmlFormat, HtmlOptions};
pub use latex::LatexFormat;
pub use man::ManFormat;
pub use text::TextFormat;
