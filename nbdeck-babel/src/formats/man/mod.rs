//! Man page format (roff, `man` macros)
//!
//! Top-level sections become `.SH`, deeper ones `.SS`. Metadata carriers and non-text
//! outputs are dropped.

use super::common::display_choice;
use crate::error::FormatError;
use crate::format::Format;
use crate::markup::Inline;
use crate::page::PageContext;
use crate::tree::{DisplayItem, DocNode, Document, NodeVisit, OutputNode, RenderTarget};

pub struct ManFormat;

impl Format for ManFormat {
    fn name(&self) -> &str {
        "man"
    }

    fn description(&self) -> &str {
        "Manual page (roff)"
    }

    fn file_extensions(&self) -> &[&str] {
        &["1", "7", "man"]
    }

    fn target(&self) -> RenderTarget {
        RenderTarget::Man
    }

    fn serialize(&self, doc: &Document, page: &PageContext) -> Result<String, FormatError> {
        let title = page.title.to_uppercase().replace('"', "");
        let mut writer = ManWriter {
            out: format!(".TH \"{title}\" \"7\" \"\" \"nbdeck\"\n"),
            top_level: None,
        };
        writer.nodes(&doc.children);
        Ok(writer.out)
    }
}

struct ManWriter {
    out: String,
    /// Level of the shallowest section seen, rendered as `.SH`
    top_level: Option<u8>,
}

impl ManWriter {
    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn text_block(&mut self, text: &str) {
        for line in text.lines() {
            self.line(&escape_line(line));
        }
    }

    fn literal(&mut self, text: &str) {
        self.line(".PP");
        self.line(".nf");
        self.line(".RS 4");
        self.text_block(text.trim_end_matches('\n'));
        self.line(".RE");
        self.line(".fi");
    }

    fn nodes(&mut self, nodes: &[DocNode]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &DocNode) {
        match node {
            DocNode::Section(section) => {
                let top = *self.top_level.get_or_insert(section.level);
                let macro_name = if section.level <= top { ".SH" } else { ".SS" };
                let title = escape(&inline_text(&section.title));
                self.line(&format!("{macro_name} \"{}\"", title.replace('"', "")));
                self.nodes(&section.children);
            }
            DocNode::Rubric(rubric) => {
                self.line(".PP");
                self.line(&format!(".B \"{}\"", inline_text(&rubric.content).replace('"', "")));
            }
            DocNode::Paragraph(paragraph) => {
                self.line(".PP");
                self.text_block(&inline_text(&paragraph.content));
            }
            DocNode::List(list) => {
                for (n, item) in list.items.iter().enumerate() {
                    let marker = if list.ordered {
                        format!("{}.", list.start + n as u64)
                    } else {
                        "\\(bu".to_string()
                    };
                    self.line(&format!(".IP {marker} 4"));
                    for child in &item.children {
                        match child {
                            DocNode::Paragraph(paragraph) => {
                                self.text_block(&inline_text(&paragraph.content))
                            }
                            other => {
                                self.line(".RS 4");
                                self.node(other);
                                self.line(".RE");
                            }
                        }
                    }
                }
            }
            DocNode::BlockQuote(quote) => {
                self.line(".RS 4");
                self.nodes(&quote.children);
                self.line(".RE");
            }
            DocNode::LiteralBlock(literal) => self.literal(&literal.content),
            DocNode::MathBlock { content } => self.literal(content),
            DocNode::Raw(raw) => {
                if raw.format == "man" {
                    self.line(&raw.content);
                }
            }
            DocNode::Transition => {
                self.line(".PP");
                self.line("\\l'20'");
            }
            DocNode::CellMeta(meta) => match meta.visit(RenderTarget::Man) {
                NodeVisit::Raw(roff) => self.line(&roff),
                NodeVisit::Skip => {}
            },
            DocNode::CodeCell(cell) => {
                if let Some(source) = &cell.source {
                    self.literal(source);
                }
                for output in &cell.outputs {
                    match output {
                        OutputNode::Stream { text, .. } => self.literal(text),
                        OutputNode::Error { ename, evalue, .. } => {
                            self.literal(&format!("{ename}: {evalue}"))
                        }
                        OutputNode::Display { items } => {
                            if let Some(DisplayItem::Text { content }) =
                                display_choice(items, RenderTarget::Man)
                            {
                                self.literal(content);
                            }
                        }
                    }
                }
            }
            DocNode::Footnotes { items } => {
                self.line(".SH NOTES");
                for footnote in items {
                    self.line(&format!(".IP [{}] 4", footnote.id));
                    for child in &footnote.children {
                        match child {
                            DocNode::Paragraph(paragraph) => {
                                self.text_block(&inline_text(&paragraph.content))
                            }
                            other => self.node(other),
                        }
                    }
                }
            }
            DocNode::WidgetState { .. } => {}
        }
    }
}

fn inline_text(content: &[Inline]) -> String {
    let mut out = String::new();
    for inline in content {
        match inline {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Code(code) => out.push_str(&format!("\\fB{}\\fR", escape(code))),
            Inline::Emph(children) => out.push_str(&format!("\\fI{}\\fR", inline_text(children))),
            Inline::Strong(children) => {
                out.push_str(&format!("\\fB{}\\fR", inline_text(children)))
            }
            Inline::Link { href, children, .. } => {
                let label = inline_text(children);
                let target = escape(href);
                if label == target {
                    out.push_str(&target);
                } else {
                    out.push_str(&format!("{label} <{target}>"));
                }
            }
            Inline::Image { alt, .. } => out.push_str(&escape(alt)),
            Inline::FootnoteRef { id, .. } => out.push_str(&format!("[{id}]")),
            Inline::Math(math) => out.push_str(&escape(math)),
            Inline::Html(_) => {}
            Inline::SoftBreak | Inline::HardBreak => out.push('\n'),
        }
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\e").replace('-', "\\-")
}

/// Lines starting with a control character would be read as requests.
fn escape_line(line: &str) -> String {
    if line.starts_with('.') || line.starts_with('\'') {
        format!("\\&{line}")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CellMetaNode, Paragraph, Section};

    fn section(level: u8, title: &str, children: Vec<DocNode>) -> DocNode {
        DocNode::Section(Section {
            level,
            title: vec![Inline::Text(title.to_string())],
            id: title.to_lowercase(),
            children,
        })
    }

    #[test]
    fn renders_man_page() {
        let doc = Document {
            children: vec![
                DocNode::CellMeta(CellMetaNode::new(r#"{"slideshow":{}}"#)),
                section(
                    1,
                    "Name",
                    vec![
                        DocNode::Paragraph(Paragraph {
                            content: vec![Inline::Text("nbdeck - notebook decks".to_string())],
                        }),
                        section(2, "Options", vec![]),
                    ],
                ),
            ],
            ..Document::default()
        };
        let man = ManFormat
            .serialize(&doc, &PageContext::new("nbdeck", "nbdeck"))
            .unwrap();
        assert_eq!(
            man,
            ".TH \"NBDECK\" \"7\" \"\" \"nbdeck\"\n.SH \"Name\"\n.PP\nnbdeck \\- notebook decks\n.SS \"Options\"\n"
        );
    }

    #[test]
    fn control_lines_are_escaped() {
        assert_eq!(escape_line(".hidden"), "\\&.hidden");
        assert_eq!(escape_line("plain"), "plain");
    }
}
