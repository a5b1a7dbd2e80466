//! Code cell renderers
//!
//! A `CodeCell` token is opaque to the converter. The renderer named in the token turns it
//! into a [`CodeCellNode`], choosing which outputs to keep and in which representations.

use super::nodes::{CodeCellNode, DisplayItem, OutputNode};
use crate::convert::DEFAULT_RENDERER;
use crate::markup::CodeCellToken;
use crate::materialize::{data_uri, OutputHandle, IMAGE_MIMETYPES};
use crate::notebook::{mime_text, Output};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));

/// Tag hiding a code cell's source.
pub const REMOVE_INPUT_TAG: &str = "remove-input";
/// Tag hiding a code cell's outputs.
pub const REMOVE_OUTPUT_TAG: &str = "remove-output";

pub trait CellRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, token: &CodeCellToken, outputs: Option<&OutputHandle>) -> CodeCellNode;
}

/// Keeps every output, each as the list of representations found in its mime bundle.
pub struct DefaultCellRenderer;

impl CellRenderer for DefaultCellRenderer {
    fn name(&self) -> &str {
        DEFAULT_RENDERER
    }

    fn render(&self, token: &CodeCellToken, handle: Option<&OutputHandle>) -> CodeCellNode {
        let cell = &token.cell;
        let tags = cell.tags();
        let source = (!tags.contains(&REMOVE_INPUT_TAG)).then(|| cell.source.clone());
        let outputs = if tags.contains(&REMOVE_OUTPUT_TAG) {
            Vec::new()
        } else {
            cell.outputs
                .iter()
                .enumerate()
                .filter_map(|(n, output)| render_output(output, cell.index, n, handle))
                .collect()
        };

        CodeCellNode {
            cell_index: cell.index,
            source,
            lexer: token.lexer.clone(),
            renderer: token.renderer.clone(),
            execution_count: cell.execution_count,
            outputs,
        }
    }
}

fn render_output(
    output: &Output,
    cell: usize,
    n: usize,
    handle: Option<&OutputHandle>,
) -> Option<OutputNode> {
    match output {
        Output::Stream { name, text } => Some(OutputNode::Stream {
            name: name.clone(),
            text: text.clone(),
        }),
        Output::Error {
            ename,
            evalue,
            traceback,
        } => Some(OutputNode::Error {
            ename: ename.clone(),
            evalue: evalue.clone(),
            traceback: traceback
                .iter()
                .map(|line| ANSI_ESCAPE.replace_all(line, "").into_owned())
                .collect(),
        }),
        Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
            let mut items = Vec::new();
            if let Some(html) = data.get("text/html").and_then(mime_text) {
                items.push(DisplayItem::Html { content: html });
            }
            if let Some((mime, value)) = IMAGE_MIMETYPES
                .iter()
                .find_map(|mime| data.get(*mime).map(|value| (*mime, value)))
            {
                let src = handle
                    .and_then(|h| h.asset_src(cell, n, mime))
                    .unwrap_or_else(|| data_uri(mime, value));
                items.push(DisplayItem::Image {
                    src,
                    mime: mime.to_string(),
                });
            }
            if let Some(latex) = data.get("text/latex").and_then(mime_text) {
                items.push(DisplayItem::Latex { content: latex });
            }
            if let Some(text) = data.get("text/plain").and_then(mime_text) {
                items.push(DisplayItem::Text { content: text });
            }
            (!items.is_empty()).then_some(OutputNode::Display { items })
        }
    }
}

pub struct CellRendererRegistry {
    renderers: HashMap<String, Box<dyn CellRenderer>>,
}

impl CellRendererRegistry {
    pub fn new() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn register<R: CellRenderer + 'static>(&mut self, renderer: R) {
        self.renderers
            .insert(renderer.name().to_string(), Box::new(renderer));
    }

    pub fn get(&self, name: &str) -> Option<&dyn CellRenderer> {
        self.renderers.get(name).map(|r| r.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DefaultCellRenderer);
        registry
    }
}

impl Default for CellRendererRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;
    use serde_json::{json, Map, Value};

    fn bundle(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn token(cell: Cell) -> CodeCellToken {
        CodeCellToken {
            cell,
            lexer: Some("python".to_string()),
            renderer: DEFAULT_RENDERER.to_string(),
            map: [1, 1],
        }
    }

    #[test]
    fn display_items_are_ordered_by_preference() {
        let cell = Cell::code("df").with_outputs(vec![Output::ExecuteResult {
            execution_count: Some(1),
            data: bundle(json!({"text/plain": "frame", "text/html": "<table></table>"})),
            metadata: Map::new(),
        }]);
        let node = DefaultCellRenderer.render(&token(cell), None);
        assert_eq!(
            node.outputs,
            vec![OutputNode::Display {
                items: vec![
                    DisplayItem::Html {
                        content: "<table></table>".to_string()
                    },
                    DisplayItem::Text {
                        content: "frame".to_string()
                    },
                ]
            }]
        );
        assert_eq!(node.source.as_deref(), Some("df"));
    }

    #[test]
    fn images_use_materialized_paths() {
        let mut cell = Cell::code("plot()").with_outputs(vec![Output::DisplayData {
            data: bundle(json!({"image/png": "AAAA"})),
            metadata: Map::new(),
        }]);
        cell.index = 4;
        let handle = OutputHandle {
            notebook_path: "intro.ipynb".into(),
            assets_prefix: Some("_nb/intro".to_string()),
        };
        let node = DefaultCellRenderer.render(&token(cell.clone()), Some(&handle));
        assert_eq!(
            node.outputs,
            vec![OutputNode::Display {
                items: vec![DisplayItem::Image {
                    src: "_nb/intro/output_4_0.png".to_string(),
                    mime: "image/png".to_string()
                }]
            }]
        );

        let inline = DefaultCellRenderer.render(&token(cell), None);
        match &inline.outputs[0] {
            OutputNode::Display { items } => match &items[0] {
                DisplayItem::Image { src, .. } => assert_eq!(src, "data:image/png;base64,AAAA"),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tags_hide_input_and_output() {
        let cell = Cell::code("secret")
            .with_metadata(json!({"tags": ["remove-input", "remove-output"]}))
            .with_outputs(vec![Output::Stream {
                name: "stdout".to_string(),
                text: "x".to_string(),
            }]);
        let node = DefaultCellRenderer.render(&token(cell), None);
        assert_eq!(node.source, None);
        assert!(node.outputs.is_empty());
    }

    #[test]
    fn tracebacks_lose_ansi_colors() {
        let cell = Cell::code("1/0").with_outputs(vec![Output::Error {
            ename: "ZeroDivisionError".to_string(),
            evalue: "division by zero".to_string(),
            traceback: vec!["\u{1b}[0;31mZeroDivisionError\u{1b}[0m: boom".to_string()],
        }]);
        let node = DefaultCellRenderer.render(&token(cell), None);
        match &node.outputs[0] {
            OutputNode::Error { traceback, .. } => {
                assert_eq!(traceback[0], "ZeroDivisionError: boom")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
