//! HTML serialization
//!
//! Converts document trees to semantic HTML5 pages with embedded CSS.
//! Pipeline: Document → RcDom → HTML string → page wrapper
//!
//! Raw markup (cell metadata carriers, HTML outputs, inline HTML) must come out byte for
//! byte. It is kept out of the DOM: the builder leaves a numbered comment in its place and
//! the comment is swapped for the markup after serialization.

use crate::error::FormatError;
use crate::markup::Inline;
use crate::page::PageContext;
use crate::tree::{
    CodeCellNode, DisplayItem, DocNode, Document, List, NodeVisit, OutputNode, RenderTarget,
};
use html5ever::{
    ns, serialize, serialize::SerializeOpts, serialize::TraversalScope, Attribute, LocalName,
    QualName,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cell::{Cell, RefCell};
use std::default::Default;
use std::rc::Rc;

const RAW_MARKER: &str = "nbdeck-raw:";

static RAW_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--nbdeck-raw:(\d+)-->").expect("valid regex"));

/// Options for HTML serialization
#[derive(Debug, Clone, Default)]
pub struct HtmlOptions {
    /// Optional custom CSS to append after the baseline CSS
    pub custom_css: Option<String>,
}

impl HtmlOptions {
    pub fn with_custom_css(mut self, css: String) -> Self {
        self.custom_css = Some(css);
        self
    }
}

/// Serialize a document to a complete HTML page
pub fn serialize_to_html(
    doc: &Document,
    page: &PageContext,
    options: &HtmlOptions,
) -> Result<String, FormatError> {
    let body = serialize_body(doc, page)?;
    Ok(wrap_in_document(&body, page, options))
}

/// Serialize only the document content, without the page wrapper
pub fn serialize_body(doc: &Document, page: &PageContext) -> Result<String, FormatError> {
    let mut builder = DomBuilder {
        raw: Vec::new(),
        root_prefix: page.root_prefix.clone(),
    };
    let dom = RcDom::default();
    let container = create_element("div", vec![]);
    builder.nodes(&container, &doc.children);
    dom.document.children.borrow_mut().push(container);

    let html = serialize_dom(&dom)?;
    let raw = builder.raw;
    Ok(RAW_PLACEHOLDER
        .replace_all(&html, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| raw.get(n))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned())
}

struct DomBuilder {
    raw: Vec<String>,
    root_prefix: String,
}

impl DomBuilder {
    fn raw(&mut self, parent: &Handle, markup: String) {
        let marker = format!("{RAW_MARKER}{}", self.raw.len());
        self.raw.push(markup);
        append(parent, create_comment(&marker));
    }

    fn nodes(&mut self, parent: &Handle, nodes: &[DocNode]) {
        for node in nodes {
            self.node(parent, node);
        }
    }

    fn node(&mut self, parent: &Handle, node: &DocNode) {
        match node {
            DocNode::Section(section) => {
                let class = format!("section level-{}", section.level);
                let element = create_element(
                    "section",
                    vec![("id", section.id.as_str()), ("class", class.as_str())],
                );
                let heading = create_element(&format!("h{}", section.level.clamp(1, 6)), vec![]);
                self.inlines(&heading, &section.title);
                append(&element, heading);
                self.nodes(&element, &section.children);
                append(parent, element);
            }
            DocNode::Rubric(rubric) => {
                let element = create_element("p", vec![("class", "rubric")]);
                self.inlines(&element, &rubric.content);
                append(parent, element);
            }
            DocNode::Paragraph(paragraph) => {
                let element = create_element("p", vec![]);
                self.inlines(&element, &paragraph.content);
                append(parent, element);
            }
            DocNode::List(list) => self.list(parent, list),
            DocNode::BlockQuote(quote) => {
                let element = create_element("blockquote", vec![]);
                self.nodes(&element, &quote.children);
                append(parent, element);
            }
            DocNode::LiteralBlock(block) => {
                let language = block.language.as_deref().map(|l| format!("language-{l}"));
                append(parent, preformatted("literal-block", language.as_deref(), &block.content));
            }
            DocNode::MathBlock { content } => {
                let element = create_element("div", vec![("class", "math")]);
                append(&element, create_text(&format!("\\[{content}\\]")));
                append(parent, element);
            }
            DocNode::Raw(raw) => {
                if raw.format == "html" {
                    self.raw(parent, raw.content.clone());
                }
            }
            DocNode::Transition => append(parent, create_element("hr", vec![])),
            DocNode::CellMeta(meta) => match meta.visit(RenderTarget::Html) {
                NodeVisit::Raw(markup) => self.raw(parent, markup),
                NodeVisit::Skip => {}
            },
            DocNode::CodeCell(cell) => self.code_cell(parent, cell),
            DocNode::Footnotes { items } => {
                let section = create_element("section", vec![("class", "footnotes")]);
                let list = create_element("ol", vec![]);
                for footnote in items {
                    let id = format!("fn-{}", footnote.id);
                    let item = create_element("li", vec![("id", id.as_str())]);
                    self.nodes(&item, &footnote.children);
                    append(&list, item);
                }
                append(&section, list);
                append(parent, section);
            }
            DocNode::WidgetState { state } => {
                self.raw(
                    parent,
                    format!(
                        "<script type=\"{}\">{state}</script>",
                        crate::notebook::WIDGET_STATE_MIMETYPE
                    ),
                );
            }
        }
    }

    fn list(&mut self, parent: &Handle, list: &List) {
        let start = list.start.to_string();
        let mut attrs = Vec::new();
        if list.ordered && list.start != 1 {
            attrs.push(("start", start.as_str()));
        }
        let element = create_element(if list.ordered { "ol" } else { "ul" }, attrs);
        for item in &list.items {
            let li = create_element("li", vec![]);
            for child in &item.children {
                match child {
                    DocNode::Paragraph(paragraph) if list.tight => {
                        self.inlines(&li, &paragraph.content)
                    }
                    other => self.node(&li, other),
                }
            }
            append(&element, li);
        }
        append(parent, element);
    }

    fn code_cell(&mut self, parent: &Handle, cell: &CodeCellNode) {
        let index = cell.cell_index.to_string();
        let wrapper = create_element(
            "div",
            vec![("class", "cell"), ("data-cell-index", index.as_str())],
        );
        if let Some(source) = &cell.source {
            let input = create_element("div", vec![("class", "cell_input")]);
            let language = cell.lexer.as_deref().map(|l| format!("language-{l}"));
            append(&input, preformatted("code", language.as_deref(), source));
            append(&wrapper, input);
        }
        if !cell.outputs.is_empty() {
            let outputs = create_element("div", vec![("class", "cell_output")]);
            for output in &cell.outputs {
                self.output(&outputs, output);
            }
            append(&wrapper, outputs);
        }
        append(parent, wrapper);
    }

    fn output(&mut self, parent: &Handle, output: &OutputNode) {
        match output {
            OutputNode::Stream { name, text } => {
                let class = format!("output stream-{name}");
                append(parent, preformatted(&class, None, text));
            }
            OutputNode::Error {
                ename,
                evalue,
                traceback,
            } => {
                let text = if traceback.is_empty() {
                    format!("{ename}: {evalue}")
                } else {
                    traceback.join("\n")
                };
                append(parent, preformatted("output traceback", None, &text));
            }
            // Every display representation has an HTML rendering, so the first one wins
            OutputNode::Display { items } => match items.first() {
                Some(DisplayItem::Html { content }) => self.raw(parent, content.clone()),
                Some(DisplayItem::Image { src, mime }) => {
                    let src = if src.starts_with("data:") {
                        src.clone()
                    } else {
                        format!("{}{src}", self.root_prefix)
                    };
                    let img = create_element(
                        "img",
                        vec![
                            ("src", src.as_str()),
                            ("class", "output"),
                            ("data-mime", mime.as_str()),
                        ],
                    );
                    append(parent, img);
                }
                Some(DisplayItem::Latex { content }) => {
                    let element = create_element("div", vec![("class", "output math")]);
                    append(&element, create_text(content));
                    append(parent, element);
                }
                Some(DisplayItem::Text { content }) => {
                    append(parent, preformatted("output text_plain", None, content));
                }
                None => {}
            },
        }
    }

    fn inlines(&mut self, parent: &Handle, inlines: &[Inline]) {
        for inline in inlines {
            self.inline(parent, inline);
        }
    }

    fn inline(&mut self, parent: &Handle, inline: &Inline) {
        match inline {
            Inline::Text(text) => append(parent, create_text(text)),
            Inline::Code(code) => {
                let element = create_element("code", vec![]);
                append(&element, create_text(code));
                append(parent, element);
            }
            Inline::Emph(children) => {
                let element = create_element("em", vec![]);
                self.inlines(&element, children);
                append(parent, element);
            }
            Inline::Strong(children) => {
                let element = create_element("strong", vec![]);
                self.inlines(&element, children);
                append(parent, element);
            }
            Inline::Link {
                href,
                title,
                children,
            } => {
                let mut attrs = vec![("href", href.as_str())];
                if let Some(title) = title {
                    attrs.push(("title", title.as_str()));
                }
                let element = create_element("a", attrs);
                self.inlines(&element, children);
                append(parent, element);
            }
            Inline::Image { src, alt, title } => {
                let mut attrs = vec![("src", src.as_str()), ("alt", alt.as_str())];
                if let Some(title) = title {
                    attrs.push(("title", title.as_str()));
                }
                append(parent, create_element("img", attrs));
            }
            Inline::FootnoteRef { id, .. } => {
                let href = format!("#fn-{id}");
                let anchor_id = format!("fnref-{id}");
                let sup = create_element("sup", vec![("class", "footnote-ref")]);
                let anchor = create_element(
                    "a",
                    vec![("href", href.as_str()), ("id", anchor_id.as_str())],
                );
                append(&anchor, create_text(&format!("[{id}]")));
                append(&sup, anchor);
                append(parent, sup);
            }
            Inline::Math(math) => {
                let element = create_element("span", vec![("class", "math")]);
                append(&element, create_text(&format!("\\({math}\\)")));
                append(parent, element);
            }
            Inline::Html(html) => self.raw(parent, html.clone()),
            Inline::SoftBreak => append(parent, create_text("\n")),
            Inline::HardBreak => append(parent, create_element("br", vec![])),
        }
    }
}

/// `<pre class="..."><code class="...">text</code></pre>`
fn preformatted(class: &str, code_class: Option<&str>, text: &str) -> Handle {
    let pre = create_element("pre", vec![("class", class)]);
    let code = create_element("code", code_class.map(|c| vec![("class", c)]).unwrap_or_default());
    append(&code, create_text(text));
    append(&pre, code);
    pre
}

fn append(parent: &Handle, child: Handle) {
    parent.children.borrow_mut().push(child);
}

/// Create an HTML element with attributes
fn create_element(tag: &str, attrs: Vec<(&str, &str)>) -> Handle {
    let qual_name = QualName::new(None, ns!(html), LocalName::from(tag));
    let attributes = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.to_string().into(),
        })
        .collect();

    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Element {
            name: qual_name,
            attrs: RefCell::new(attributes),
            template_contents: Default::default(),
            mathml_annotation_xml_integration_point: false,
        },
    })
}

/// Create a text node
fn create_text(text: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Text {
            contents: RefCell::new(text.to_string().into()),
        },
    })
}

/// Create a comment node
fn create_comment(text: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Comment {
            contents: text.to_string().into(),
        },
    })
}

/// Serialize the children of the DOM's container element
fn serialize_dom(dom: &RcDom) -> Result<String, FormatError> {
    let mut output = Vec::new();

    let container = dom
        .document
        .children
        .borrow()
        .first()
        .ok_or_else(|| FormatError::SerializationError("Empty document".to_string()))?
        .clone();

    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    for child in container.children.borrow().iter() {
        let serializable = SerializableHandle::from(child.clone());
        serialize(&mut output, &serializable, opts.clone()).map_err(|e| {
            FormatError::SerializationError(format!("HTML serialization failed: {e}"))
        })?;
        output.push(b'\n');
    }

    String::from_utf8(output)
        .map_err(|e| FormatError::SerializationError(format!("UTF-8 conversion failed: {e}")))
}

/// Wrap the content in a complete HTML page
fn wrap_in_document(body_html: &str, page: &PageContext, options: &HtmlOptions) -> String {
    let baseline_css = include_str!("../../../css/baseline.css");
    let custom_css = options.custom_css.as_deref().unwrap_or("");
    let escaped_title = html_escape(&page.title);

    let stylesheets: String = page
        .stylesheets()
        .map(|path| {
            format!(
                "  <link rel=\"stylesheet\" href=\"{}\">\n",
                html_escape(&page.static_url(path))
            )
        })
        .collect();
    let scripts: String = page
        .scripts()
        .map(|path| {
            format!(
                "<script src=\"{}\"></script>\n",
                html_escape(&page.static_url(path))
            )
        })
        .collect();
    let buttons: String = page
        .header_buttons
        .iter()
        .map(|button| {
            let icon = format!("<i class=\"{}\"></i>", html_escape(&button.icon));
            let tooltip = html_escape(&button.tooltip);
            match button.kind.as_str() {
                "link" => format!(
                    "  <a class=\"header-button\" href=\"{}\" title=\"{tooltip}\">{icon}</a>\n",
                    html_escape(&button.action)
                ),
                _ => format!(
                    "  <button class=\"header-button\" onclick=\"{}\" title=\"{tooltip}\">{icon}</button>\n",
                    html_escape(&button.action)
                ),
            }
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <meta name="generator" content="nbdeck">
  <title>{escaped_title}</title>
  <style>
{baseline_css}
{custom_css}
  </style>
{stylesheets}</head>
<body>
<div class="page">
<header class="page-header">
{buttons}</header>
<main id="main-content">
{body_html}</main>
</div>
{scripts}</body>
</html>
"#
    )
}

/// Escape HTML special characters in text
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::HeaderButton;
    use crate::tree::{CellMetaNode, Paragraph, Section};

    fn text(s: &str) -> Vec<Inline> {
        vec![Inline::Text(s.to_string())]
    }

    fn page() -> PageContext {
        PageContext::new("guide/deck", "Deck & Co")
    }

    #[test]
    fn carrier_is_emitted_byte_for_byte() {
        let doc = Document {
            children: vec![
                DocNode::CellMeta(CellMetaNode::new(r#"{"slideshow":{"slide_type":"slide"}}"#)),
                DocNode::Paragraph(Paragraph { content: text("a < b") }),
            ],
            ..Document::default()
        };
        let body = serialize_body(&doc, &page()).unwrap();
        assert!(body.contains(
            r#"<script type="application/json" data-cell-meta="">{"slideshow":{"slide_type":"slide"}}</script>"#
        ));
        assert!(body.contains("<p>a &lt; b</p>"));
    }

    #[test]
    fn sections_nest_with_headings() {
        let doc = Document {
            children: vec![DocNode::Section(Section {
                level: 2,
                title: text("Intro"),
                id: "intro".to_string(),
                children: vec![DocNode::Paragraph(Paragraph { content: text("Body") })],
            })],
            ..Document::default()
        };
        let body = serialize_body(&doc, &page()).unwrap();
        assert!(body.contains(r#"<section id="intro" class="section level-2"><h2>Intro</h2><p>Body</p></section>"#));
    }

    #[test]
    fn page_wrapper_draws_context() {
        let mut context = page();
        context.add_css_file("fix-theme.css");
        context.add_js_file("present.js");
        context.header_buttons.push(HeaderButton {
            kind: "javascript".to_string(),
            action: "startPresentation()".to_string(),
            tooltip: "Start presenting".to_string(),
            icon: "fas fa-chart-bar".to_string(),
        });
        let html =
            serialize_to_html(&Document::default(), &context, &HtmlOptions::default()).unwrap();
        assert!(html.contains("<title>Deck &amp; Co</title>"));
        assert!(html.contains(r#"<link rel="stylesheet" href="../_static/fix-theme.css">"#));
        assert!(html.contains(r#"<script src="../_static/present.js"></script>"#));
        assert!(html.contains(r#"onclick="startPresentation()""#));
        assert!(html.contains(r#"<div class="page">"#));
        assert!(html.contains(r#"<main id="main-content">"#));
    }

    #[test]
    fn custom_css_is_appended() {
        let options = HtmlOptions::default().with_custom_css(".mine { color: red; }".to_string());
        let html = serialize_to_html(&Document::default(), &page(), &options).unwrap();
        assert!(html.contains(".mine { color: red; }"));
        assert!(html.contains(".cell_output"));
    }

    #[test]
    fn inline_html_passes_through() {
        let doc = Document {
            children: vec![DocNode::Paragraph(Paragraph {
                content: vec![Inline::Html("<kbd>".to_string()), Inline::Text("x".to_string())],
            })],
            ..Document::default()
        };
        let body = serialize_body(&doc, &page()).unwrap();
        assert!(body.contains("<p><kbd>x</p>"));
    }
}
