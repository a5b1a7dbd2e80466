//! Plain text format
//!
//! Headings are underlined, lists and quotes are indented, code and literal blocks are
//! indented by four spaces. Metadata carriers, raw HTML and widget state are dropped.

use super::common::{display_choice, indent};
use crate::error::FormatError;
use crate::format::Format;
use crate::markup::Inline;
use crate::page::PageContext;
use crate::tree::{DisplayItem, DocNode, Document, NodeVisit, OutputNode, RenderTarget};

pub struct TextFormat;

impl Format for TextFormat {
    fn name(&self) -> &str {
        "text"
    }

    fn description(&self) -> &str {
        "Plain text"
    }

    fn file_extensions(&self) -> &[&str] {
        &["txt"]
    }

    fn target(&self) -> RenderTarget {
        RenderTarget::Text
    }

    fn serialize(&self, doc: &Document, _page: &PageContext) -> Result<String, FormatError> {
        let mut text = blocks(&doc.children).join("\n\n");
        text.push('\n');
        Ok(text)
    }
}

fn blocks(nodes: &[DocNode]) -> Vec<String> {
    nodes.iter().flat_map(block).collect()
}

fn block(node: &DocNode) -> Vec<String> {
    match node {
        DocNode::Section(section) => {
            let title = inline_text(&section.title);
            let rule = match section.level {
                1 => '=',
                2 => '-',
                _ => '~',
            };
            let underline = rule.to_string().repeat(title.chars().count());
            let mut out = vec![format!("{title}\n{underline}")];
            out.extend(blocks(&section.children));
            out
        }
        DocNode::Rubric(rubric) => vec![inline_text(&rubric.content)],
        DocNode::Paragraph(paragraph) => vec![inline_text(&paragraph.content)],
        DocNode::List(list) => {
            let items: Vec<String> = list
                .items
                .iter()
                .enumerate()
                .map(|(n, item)| {
                    let marker = if list.ordered {
                        format!("{}. ", list.start + n as u64)
                    } else {
                        "- ".to_string()
                    };
                    let separator = if list.tight { "\n" } else { "\n\n" };
                    let body = blocks(&item.children).join(separator);
                    indent(&body, &marker, &" ".repeat(marker.len()))
                })
                .collect();
            vec![items.join(if list.tight { "\n" } else { "\n\n" })]
        }
        DocNode::BlockQuote(quote) => {
            vec![indent(&blocks(&quote.children).join("\n\n"), "> ", "> ")]
        }
        DocNode::LiteralBlock(literal) => vec![indent(&literal.content, "    ", "    ")],
        DocNode::MathBlock { content } => vec![indent(content, "    ", "    ")],
        DocNode::Raw(raw) if raw.format == "text" => vec![raw.content.clone()],
        DocNode::Raw(_) | DocNode::WidgetState { .. } => Vec::new(),
        DocNode::Transition => vec!["----".to_string()],
        DocNode::CellMeta(meta) => match meta.visit(RenderTarget::Text) {
            NodeVisit::Raw(text) => vec![text],
            NodeVisit::Skip => Vec::new(),
        },
        DocNode::CodeCell(cell) => {
            let mut out = Vec::new();
            if let Some(source) = &cell.source {
                out.push(indent(source, "    ", "    "));
            }
            out.extend(cell.outputs.iter().filter_map(output));
            out
        }
        DocNode::Footnotes { items } => items
            .iter()
            .map(|footnote| {
                let marker = format!("[{}] ", footnote.id);
                indent(&blocks(&footnote.children).join("\n\n"), &marker, "    ")
            })
            .collect(),
    }
}

fn output(output: &OutputNode) -> Option<String> {
    match output {
        OutputNode::Stream { text, .. } => Some(text.trim_end().to_string()),
        OutputNode::Error { ename, evalue, .. } => Some(format!("{ename}: {evalue}")),
        OutputNode::Display { items } => match display_choice(items, RenderTarget::Text) {
            Some(DisplayItem::Text { content }) => Some(content.trim_end().to_string()),
            _ => None,
        },
    }
}

fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(text),
            Inline::Code(code) => {
                out.push('`');
                out.push_str(code);
                out.push('`');
            }
            Inline::Emph(children) => {
                out.push('*');
                out.push_str(&inline_text(children));
                out.push('*');
            }
            Inline::Strong(children) => {
                out.push_str("**");
                out.push_str(&inline_text(children));
                out.push_str("**");
            }
            Inline::Link { href, children, .. } => {
                let label = inline_text(children);
                if label == *href {
                    out.push_str(href);
                } else {
                    out.push_str(&format!("{label} <{href}>"));
                }
            }
            Inline::Image { alt, .. } => out.push_str(&format!("[image: {alt}]")),
            Inline::FootnoteRef { id, .. } => out.push_str(&format!("[{id}]")),
            Inline::Math(math) => {
                out.push('$');
                out.push_str(math);
                out.push('$');
            }
            Inline::Html(_) => {}
            Inline::SoftBreak | Inline::HardBreak => out.push('\n'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CellMetaNode, CodeCellNode, List, ListItem, Paragraph, Section};

    fn para(text: &str) -> DocNode {
        DocNode::Paragraph(Paragraph {
            content: vec![Inline::Text(text.to_string())],
        })
    }

    fn render(children: Vec<DocNode>) -> String {
        let doc = Document {
            children,
            ..Document::default()
        };
        TextFormat
            .serialize(&doc, &PageContext::new("index", "Index"))
            .unwrap()
    }

    #[test]
    fn carriers_are_skipped() {
        let text = render(vec![
            DocNode::CellMeta(CellMetaNode::new(r#"{"slideshow":{}}"#)),
            para("Hello"),
        ]);
        assert_eq!(text, "Hello\n");
    }

    #[test]
    fn sections_and_lists() {
        let text = render(vec![DocNode::Section(Section {
            level: 1,
            title: vec![Inline::Text("Deck".to_string())],
            id: "deck".to_string(),
            children: vec![DocNode::List(List {
                ordered: true,
                start: 3,
                tight: true,
                items: vec![
                    ListItem {
                        children: vec![para("one")],
                    },
                    ListItem {
                        children: vec![para("two")],
                    },
                ],
            })],
        })]);
        assert_eq!(text, "Deck\n====\n\n3. one\n4. two\n");
    }

    #[test]
    fn code_cells_show_source_and_text_outputs() {
        let text = render(vec![DocNode::CodeCell(CodeCellNode {
            cell_index: 0,
            source: Some("print(1)".to_string()),
            lexer: None,
            renderer: "default".to_string(),
            execution_count: Some(1),
            outputs: vec![
                OutputNode::Stream {
                    name: "stdout".to_string(),
                    text: "1\n".to_string(),
                },
                OutputNode::Display {
                    items: vec![DisplayItem::Html {
                        content: "<b>only html</b>".to_string(),
                    }],
                },
            ],
        })]);
        assert_eq!(text, "    print(1)\n\n1\n");
    }
}
