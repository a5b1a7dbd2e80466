//! Token stream representation
//!
//! The converter emits a flat, ordered `Vec<Token>`. Order is load-bearing: the tree builder
//! walks it front to back and the rendered reading order follows it exactly.

use crate::notebook::Cell;
use serde::Serialize;
use serde_json::{Map, Value};

/// Inclusive-exclusive line range `[start, end]`, 1-based once shifted into document space.
pub type LineRange = [usize; 2];

/// One unit of the intermediate representation.
///
/// This is a closed set: the tree builder pattern-matches every variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    /// Notebook metadata, always the first token
    FrontMatter {
        metadata: Map<String, Value>,
        map: LineRange,
    },
    /// A cell's metadata as a JSON string, emitted before the cell's content
    CellMeta { content: String, map: LineRange },
    /// A token produced by the markup parser for a markdown cell
    Markdown(BlockToken),
    /// An opaque code cell, rendered by a cell renderer
    CodeCell(CodeCellToken),
    /// Interactive widget state, always the last token
    WidgetState { state: Value, map: LineRange },
}

impl Token {
    pub fn map(&self) -> Option<LineRange> {
        match self {
            Token::FrontMatter { map, .. }
            | Token::CellMeta { map, .. }
            | Token::WidgetState { map, .. } => Some(*map),
            Token::Markdown(token) => token.map,
            Token::CodeCell(token) => Some(token.map),
        }
    }

    /// Short name used by token dumps and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::FrontMatter { .. } => "front_matter",
            Token::CellMeta { .. } => "cell_meta",
            Token::Markdown(token) => token.kind.name(),
            Token::CodeCell(_) => "nb_code_cell",
            Token::WidgetState { .. } => "jupyter_widget_state",
        }
    }

    pub fn as_markdown(&self) -> Option<&BlockToken> {
        match self {
            Token::Markdown(token) => Some(token),
            _ => None,
        }
    }
}

/// A code cell carried through the pipeline untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeCellToken {
    pub cell: Cell,
    /// Syntax lexer resolved from the notebook metadata; absent when no hint exists
    pub lexer: Option<String>,
    /// Identifier of the cell renderer that should draw this cell
    pub renderer: String,
    pub map: LineRange,
}

/// Whether a token opens, closes, or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nesting {
    Open,
    Close,
    SelfClosing,
}

/// Kinds of markup-derived tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Heading { level: u8 },
    Paragraph,
    BulletList,
    OrderedList { start: u64 },
    ListItem,
    Blockquote,
    /// Text awaiting the inline phase
    Inline,
    Fence,
    CodeBlock,
    HtmlBlock,
    Hr,
    MathBlock,
    /// A footnote definition as written, before the footnote tail moves it
    FootnoteReference { label: String },
    FootnoteBlock,
    Footnote { id: usize, label: String },
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Heading { .. } => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::BulletList => "bullet_list",
            BlockKind::OrderedList { .. } => "ordered_list",
            BlockKind::ListItem => "list_item",
            BlockKind::Blockquote => "blockquote",
            BlockKind::Inline => "inline",
            BlockKind::Fence => "fence",
            BlockKind::CodeBlock => "code_block",
            BlockKind::HtmlBlock => "html_block",
            BlockKind::Hr => "hr",
            BlockKind::MathBlock => "math_block",
            BlockKind::FootnoteReference { .. } => "footnote_reference",
            BlockKind::FootnoteBlock => "footnote_block",
            BlockKind::Footnote { .. } => "footnote",
        }
    }
}

/// A markup token, modelled on the block tokens of markdown-it style parsers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockToken {
    #[serde(flatten)]
    pub kind: BlockKind,
    pub nesting: Nesting,
    /// Container depth at which the token sits
    pub level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<LineRange>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub info: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub markup: String,
    /// Paragraphs inside tight lists are rendered without their wrapper
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Filled by the inline phase for `Inline` tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Inline>>,
}

impl BlockToken {
    pub fn new(kind: BlockKind, nesting: Nesting, level: usize) -> Self {
        Self {
            kind,
            nesting,
            level,
            map: None,
            content: String::new(),
            info: String::new(),
            markup: String::new(),
            hidden: false,
            children: None,
        }
    }

    pub fn open(kind: BlockKind, level: usize) -> Self {
        Self::new(kind, Nesting::Open, level)
    }

    pub fn close(kind: BlockKind, level: usize) -> Self {
        Self::new(kind, Nesting::Close, level)
    }

    pub fn leaf(kind: BlockKind, level: usize) -> Self {
        Self::new(kind, Nesting::SelfClosing, level)
    }

    pub fn with_map(mut self, start: usize, end: usize) -> Self {
        self.map = Some([start, end]);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    /// Move the line range by `offset` lines.
    pub fn shift(&mut self, offset: usize) {
        if let Some([start, end]) = self.map {
            self.map = Some([start + offset, end + offset]);
        }
    }
}

/// Inline content produced by the inline phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Inline {
    Text(String),
    Code(String),
    Emph(Vec<Inline>),
    Strong(Vec<Inline>),
    Link {
        href: String,
        title: Option<String>,
        children: Vec<Inline>,
    },
    Image {
        src: String,
        alt: String,
        title: Option<String>,
    },
    FootnoteRef {
        id: usize,
        label: String,
    },
    Math(String),
    Html(String),
    SoftBreak,
    HardBreak,
}

impl Inline {
    /// Plain text of the inline and its children.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_plain_text(std::slice::from_ref(self), &mut out);
        out
    }
}

/// Plain text of a run of inlines.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    collect_plain_text(inlines, &mut out);
    out
}

fn collect_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Code(text) | Inline::Math(text) => out.push_str(text),
            Inline::Emph(children) | Inline::Strong(children) => {
                collect_plain_text(children, out)
            }
            Inline::Link { children, .. } => collect_plain_text(children, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::FootnoteRef { id, .. } => out.push_str(&format!("[{}]", id + 1)),
            Inline::Html(_) => {}
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
        }
    }
}
