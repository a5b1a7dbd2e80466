//! Common utilities for the text-based formats
//!
//! Shared by the text, LaTeX and man serializers, which all build their output as a list
//! of blocks separated by blank lines.

use crate::tree::{DisplayItem, RenderTarget};

/// The first representation of a display output that `target` can draw.
pub fn display_choice(items: &[DisplayItem], target: RenderTarget) -> Option<&DisplayItem> {
    items.iter().find(|item| match (item, target) {
        (_, RenderTarget::Html) => true,
        (DisplayItem::Latex { .. } | DisplayItem::Image { .. }, RenderTarget::Latex) => true,
        (DisplayItem::Text { .. }, _) => true,
        _ => false,
    })
}

/// Prefix the first line with `first` and every other non-empty line with `rest`.
pub fn indent(text: &str, first: &str, rest: &str) -> String {
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if i == 0 {
            out.push_str(first);
        } else if !line.is_empty() {
            out.push_str(rest);
        }
        out.push_str(line);
    }
    out
}
