//! LaTeX format
//!
//! Produces a standalone `article` document. Section levels map to `\section`,
//! `\subsection`, `\subsubsection` and `\paragraph`. Code and outputs are set verbatim;
//! LaTeX outputs are passed through and materialized images are included with
//! `\includegraphics`. Metadata carriers and HTML content are dropped.

use super::common::display_choice;
use crate::error::FormatError;
use crate::format::Format;
use crate::markup::Inline;
use crate::page::PageContext;
use crate::tree::{DisplayItem, DocNode, Document, NodeVisit, OutputNode, RenderTarget};

pub struct LatexFormat;

impl Format for LatexFormat {
    fn name(&self) -> &str {
        "latex"
    }

    fn description(&self) -> &str {
        "Standalone LaTeX article"
    }

    fn file_extensions(&self) -> &[&str] {
        &["tex", "latex"]
    }

    fn target(&self) -> RenderTarget {
        RenderTarget::Latex
    }

    fn serialize(&self, doc: &Document, page: &PageContext) -> Result<String, FormatError> {
        let mut writer = LatexWriter {
            out: String::new(),
            root_prefix: &page.root_prefix,
        };
        writer.nodes(&doc.children);

        Ok(format!(
            "\\documentclass{{article}}\n\
             \\usepackage[utf8]{{inputenc}}\n\
             \\usepackage{{amsmath}}\n\
             \\usepackage{{graphicx}}\n\
             \\usepackage{{hyperref}}\n\
             \\title{{{}}}\n\
             \\begin{{document}}\n\
             \\maketitle\n\n\
             {}\
             \\end{{document}}\n",
            escape(&page.title),
            writer.out
        ))
    }
}

struct LatexWriter<'a> {
    out: String,
    root_prefix: &'a str,
}

impl LatexWriter<'_> {
    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn verbatim(&mut self, text: &str) {
        self.line("\\begin{verbatim}");
        self.line(text.trim_end_matches('\n'));
        self.line("\\end{verbatim}\n");
    }

    fn nodes(&mut self, nodes: &[DocNode]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &DocNode) {
        match node {
            DocNode::Section(section) => {
                let command = match section.level {
                    1 => "section",
                    2 => "subsection",
                    3 => "subsubsection",
                    _ => "paragraph",
                };
                let title = inlines(&section.title);
                self.line(&format!("\\{command}{{{title}}}\\label{{{}}}\n", section.id));
                self.nodes(&section.children);
            }
            DocNode::Rubric(rubric) => {
                self.line(&format!("\\textbf{{{}}}\n", inlines(&rubric.content)));
            }
            DocNode::Paragraph(paragraph) => {
                self.line(&format!("{}\n", inlines(&paragraph.content)));
            }
            DocNode::List(list) => {
                let env = if list.ordered { "enumerate" } else { "itemize" };
                self.line(&format!("\\begin{{{env}}}"));
                if list.ordered && list.start != 1 {
                    self.line(&format!("\\setcounter{{enumi}}{{{}}}", list.start - 1));
                }
                for item in &list.items {
                    self.out.push_str("\\item ");
                    self.nodes(&item.children);
                }
                self.line(&format!("\\end{{{env}}}\n"));
            }
            DocNode::BlockQuote(quote) => {
                self.line("\\begin{quote}");
                self.nodes(&quote.children);
                self.line("\\end{quote}\n");
            }
            DocNode::LiteralBlock(literal) => self.verbatim(&literal.content),
            DocNode::MathBlock { content } => {
                self.line(&format!("\\[\n{}\n\\]\n", content.trim()));
            }
            DocNode::Raw(raw) => {
                if raw.format == "latex" {
                    self.line(&raw.content);
                }
            }
            DocNode::Transition => {
                self.line("\\par\\noindent\\rule{\\linewidth}{0.4pt}\n");
            }
            DocNode::CellMeta(meta) => match meta.visit(RenderTarget::Latex) {
                NodeVisit::Raw(latex) => self.line(&latex),
                NodeVisit::Skip => {}
            },
            DocNode::CodeCell(cell) => {
                if let Some(source) = &cell.source {
                    self.verbatim(source);
                }
                for output in &cell.outputs {
                    self.output(output);
                }
            }
            DocNode::Footnotes { items } => {
                self.line("\\section*{Notes}");
                self.line("\\begin{description}");
                for footnote in items {
                    self.out.push_str(&format!("\\item[{}] ", footnote.id));
                    self.nodes(&footnote.children);
                }
                self.line("\\end{description}\n");
            }
            DocNode::WidgetState { .. } => {}
        }
    }

    fn output(&mut self, output: &OutputNode) {
        match output {
            OutputNode::Stream { text, .. } => self.verbatim(text),
            OutputNode::Error { ename, evalue, .. } => {
                self.verbatim(&format!("{ename}: {evalue}"))
            }
            OutputNode::Display { items } => match display_choice(items, RenderTarget::Latex) {
                Some(DisplayItem::Latex { content }) => self.line(&format!("{content}\n")),
                Some(DisplayItem::Image { src, .. }) if !src.starts_with("data:") => {
                    let path = format!("{}{src}", self.root_prefix);
                    self.line(&format!("\\includegraphics[width=\\linewidth]{{{path}}}\n"));
                }
                Some(DisplayItem::Text { content }) => self.verbatim(content),
                _ => {}
            },
        }
    }
}

fn inlines(content: &[Inline]) -> String {
    let mut out = String::new();
    for inline in content {
        match inline {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Code(code) => out.push_str(&format!("\\texttt{{{}}}", escape(code))),
            Inline::Emph(children) => out.push_str(&format!("\\emph{{{}}}", inlines(children))),
            Inline::Strong(children) => {
                out.push_str(&format!("\\textbf{{{}}}", inlines(children)))
            }
            Inline::Link { href, children, .. } => out.push_str(&format!(
                "\\href{{{}}}{{{}}}",
                href.replace('%', "\\%").replace('#', "\\#"),
                inlines(children)
            )),
            Inline::Image { alt, .. } => out.push_str(&escape(alt)),
            Inline::FootnoteRef { id, .. } => out.push_str(&format!("\\textsuperscript{{{id}}}")),
            Inline::Math(math) => out.push_str(&format!("${math}$")),
            Inline::Html(_) => {}
            Inline::SoftBreak => out.push('\n'),
            Inline::HardBreak => out.push_str("\\\\\n"),
        }
    }
    out
}

/// Escape LaTeX special characters in text
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}
