//! Core data structures of the document tree.

use super::cell_meta::CellMetaNode;
use crate::markup::token::{plain_text, Inline};
use serde::Serialize;
use serde_json::{Map, Value};

/// A universal, format-neutral representation of a document node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocNode {
    Section(Section),
    /// A heading that cannot open a section (inside a list, quote or footnote)
    Rubric(Rubric),
    Paragraph(Paragraph),
    List(List),
    BlockQuote(BlockQuote),
    LiteralBlock(LiteralBlock),
    MathBlock { content: String },
    Raw(RawBlock),
    Transition,
    CellMeta(CellMetaNode),
    CodeCell(CodeCellNode),
    Footnotes { items: Vec<Footnote> },
    WidgetState { state: Value },
}

/// Represents the root of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    /// Notebook level metadata (front matter)
    pub info: Map<String, Value>,
    pub children: Vec<DocNode>,
}

impl Document {
    /// Plain text of the first section title.
    pub fn title(&self) -> Option<String> {
        self.children.iter().find_map(|node| match node {
            DocNode::Section(section) => Some(plain_text(&section.title)),
            _ => None,
        })
    }

    /// Visit every node depth first, in document order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a DocNode)) {
        walk_nodes(&self.children, visit);
    }

    /// Every metadata carrier, in document order.
    pub fn cell_metas(&self) -> Vec<&CellMetaNode> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let DocNode::CellMeta(meta) = node {
                found.push(meta);
            }
        });
        found
    }

    pub fn code_cells(&self) -> Vec<&CodeCellNode> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let DocNode::CodeCell(cell) = node {
                found.push(cell);
            }
        });
        found
    }
}

fn walk_nodes<'a>(nodes: &'a [DocNode], visit: &mut dyn FnMut(&'a DocNode)) {
    for node in nodes {
        visit(node);
        match node {
            DocNode::Section(section) => walk_nodes(&section.children, visit),
            DocNode::List(list) => {
                for item in &list.items {
                    walk_nodes(&item.children, visit);
                }
            }
            DocNode::BlockQuote(quote) => walk_nodes(&quote.children, visit),
            DocNode::Footnotes { items } => {
                for footnote in items {
                    walk_nodes(&footnote.children, visit);
                }
            }
            _ => {}
        }
    }
}

/// A heading together with the content it introduces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub level: u8,
    pub title: Vec<Inline>,
    /// Anchor, unique within the document
    pub id: String,
    pub children: Vec<DocNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rubric {
    pub level: u8,
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct List {
    pub ordered: bool,
    pub start: u64,
    /// Items hold bare inline content instead of paragraphs
    pub tight: bool,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListItem {
    pub children: Vec<DocNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockQuote {
    pub children: Vec<DocNode>,
}

/// Represents a block of verbatim text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteralBlock {
    pub language: Option<String>,
    pub content: String,
}

/// Markup passed through to formats that understand it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawBlock {
    pub format: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footnote {
    pub id: usize,
    pub label: String,
    pub children: Vec<DocNode>,
}

/// A code cell as drawn by a cell renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeCellNode {
    pub cell_index: usize,
    /// `None` when the input is hidden by a `remove-input` tag
    pub source: Option<String>,
    pub lexer: Option<String>,
    pub renderer: String,
    pub execution_count: Option<u64>,
    pub outputs: Vec<OutputNode>,
}

/// One notebook output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputNode {
    Stream {
        name: String,
        text: String,
    },
    /// Alternative representations, best first; a format draws the first it supports
    Display { items: Vec<DisplayItem> },
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mime_kind", rename_all = "snake_case")]
pub enum DisplayItem {
    Html { content: String },
    /// `src` is a path relative to the output root, or a `data:` URI
    Image { src: String, mime: String },
    Latex { content: String },
    Text { content: String },
}
