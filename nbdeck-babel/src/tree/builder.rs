//! Builds the nested document tree from the flat token stream.
//!
//! # The High-Level Concept
//!
//! The token stream is flat: containers are expressed as open and close tokens. The builder
//! walks it front to back with a stack of open containers. An open token pushes a new
//! container, a close token pops it and attaches it to the container below, and leaf tokens
//! attach directly to the container on top.
//!
//! # Auto-Closing Sections
//!
//! Markdown headings have no close marker, so sections are opened and closed implicitly.
//! A heading at the document or section level closes every open section at the same or a
//! deeper level and then opens a new one. Whatever is still open at the end of the stream,
//! or when the footnote block starts, is closed automatically. Headings inside lists, block
//! quotes or footnotes cannot open sections and become rubrics.
//!
//! # Notebook Tokens
//!
//! - `FrontMatter` becomes the document info.
//! - `CellMeta` runs the `cell_meta` directive, which yields one carrier node.
//! - `CodeCell` is handed to the cell renderer named in the token.
//! - `WidgetState` is attached to the document root.
//!
//! A malformed stream never aborts the build: mismatched close tokens are reported as
//! diagnostics and skipped.

use super::code_cell::CellRendererRegistry;
use super::nodes::*;
use crate::convert::DEFAULT_RENDERER;
use crate::directive::{directive_name, DirectiveRegistry, CELL_META_DIRECTIVE};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::markup::token::{plain_text, BlockKind, BlockToken, Inline, Nesting, Token};
use crate::materialize::OutputHandle;
use std::collections::{HashMap, HashSet};

/// A finished tree plus everything worth reporting about it.
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct TreeBuilder<'a> {
    directives: &'a DirectiveRegistry,
    renderers: &'a CellRendererRegistry,
    outputs: Option<&'a OutputHandle>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(directives: &'a DirectiveRegistry, renderers: &'a CellRendererRegistry) -> Self {
        Self {
            directives,
            renderers,
            outputs: None,
        }
    }

    /// Refer to materialized output files instead of inlining images.
    pub fn with_outputs(mut self, handle: &'a OutputHandle) -> Self {
        self.outputs = Some(handle);
        self
    }

    pub fn build(&self, tokens: &[Token]) -> BuiltTree {
        let mut state = BuildState::default();

        for token in tokens {
            if let Some([start, _]) = token.map() {
                if start > 0 {
                    state.line = Some(start);
                }
            }
            match token {
                Token::FrontMatter { metadata, .. } => {
                    state.document.info = metadata.clone();
                }
                Token::CellMeta { content, .. } => {
                    let lines: Vec<&str> = content.lines().collect();
                    self.run_directive(&mut state, CELL_META_DIRECTIVE, "", &lines, None);
                }
                Token::CodeCell(code) => {
                    let renderer = match self.renderers.get(&code.renderer) {
                        Some(renderer) => renderer,
                        None => {
                            if state.unknown_renderers.insert(code.renderer.clone()) {
                                state.warn(
                                    DiagnosticKind::UnknownRenderer,
                                    format!(
                                        "unknown code cell renderer '{}', using \
                                         '{DEFAULT_RENDERER}'",
                                        code.renderer
                                    ),
                                );
                            }
                            match self.renderers.get(DEFAULT_RENDERER) {
                                Some(renderer) => renderer,
                                None => continue,
                            }
                        }
                    };
                    let node = renderer.render(code, self.outputs);
                    state.add(DocNode::CodeCell(node));
                }
                Token::WidgetState { state: widgets, .. } => {
                    state.close_sections(0);
                    state.add(DocNode::WidgetState {
                        state: widgets.clone(),
                    });
                }
                Token::Markdown(block) => self.block(&mut state, block),
            }
        }

        state.close_sections(0);
        while let Some(open) = state.stack.last().map(StackNode::type_name) {
            state.warn(
                DiagnosticKind::MalformedTokens,
                format!("unclosed {open} at end of document"),
            );
            state.pop_into_parent();
        }

        BuiltTree {
            document: state.document,
            diagnostics: state.diagnostics,
        }
    }

    fn block(&self, state: &mut BuildState, block: &BlockToken) {
        match (&block.kind, block.nesting) {
            (BlockKind::Heading { .. }, Nesting::Open) => {
                state.pending = Some(Pending::new(false));
            }
            (BlockKind::Paragraph, Nesting::Open) => {
                state.pending = Some(Pending::new(block.hidden));
            }
            (BlockKind::Inline, _) => {
                let content = block
                    .children
                    .clone()
                    .unwrap_or_else(|| vec![Inline::Text(block.content.clone())]);
                match state.pending.as_mut() {
                    Some(pending) => pending.content = content,
                    None => state.add(DocNode::Paragraph(Paragraph { content })),
                }
            }
            (BlockKind::Heading { level }, Nesting::Close) => {
                let content = state.pending.take().map(|p| p.content).unwrap_or_default();
                if state.at_section_level() {
                    state.close_sections(*level);
                    let id = state.unique_id(&plain_text(&content));
                    state.stack.push(StackNode::Section {
                        level: *level,
                        title: content,
                        id,
                        children: Vec::new(),
                    });
                } else {
                    state.add(DocNode::Rubric(Rubric {
                        level: *level,
                        content,
                    }));
                }
            }
            (BlockKind::Paragraph, Nesting::Close) => {
                let pending = state.pending.take();
                let hidden = pending.as_ref().is_some_and(|p| p.hidden);
                let content = pending.map(|p| p.content).unwrap_or_default();
                if hidden {
                    if let Some(StackNode::ListItem { tight, .. }) = state.stack.last_mut() {
                        *tight = true;
                    }
                }
                state.add(DocNode::Paragraph(Paragraph { content }));
            }
            (BlockKind::BulletList, Nesting::Open) => state.stack.push(StackNode::List {
                ordered: false,
                start: 1,
                tight: false,
                items: Vec::new(),
            }),
            (BlockKind::OrderedList { start }, Nesting::Open) => {
                state.stack.push(StackNode::List {
                    ordered: true,
                    start: *start,
                    tight: false,
                    items: Vec::new(),
                })
            }
            (BlockKind::ListItem, Nesting::Open) => state.stack.push(StackNode::ListItem {
                children: Vec::new(),
                tight: false,
            }),
            (BlockKind::Blockquote, Nesting::Open) => state.stack.push(StackNode::BlockQuote {
                children: Vec::new(),
            }),
            (BlockKind::FootnoteBlock, Nesting::Open) => {
                state.close_sections(0);
                state.stack.push(StackNode::Footnotes { items: Vec::new() });
            }
            (BlockKind::Footnote { id, label }, Nesting::Open) => {
                state.stack.push(StackNode::Footnote {
                    id: *id,
                    label: label.clone(),
                    children: Vec::new(),
                })
            }
            (BlockKind::BulletList | BlockKind::OrderedList { .. }, Nesting::Close) => {
                state.close("List")
            }
            (BlockKind::ListItem, Nesting::Close) => state.close("ListItem"),
            (BlockKind::Blockquote, Nesting::Close) => state.close("BlockQuote"),
            (BlockKind::FootnoteBlock, Nesting::Close) => state.close("Footnotes"),
            (BlockKind::Footnote { .. }, Nesting::Close) => state.close("Footnote"),
            (BlockKind::Fence, _) => self.fence(state, block),
            (BlockKind::CodeBlock, _) => state.add(DocNode::LiteralBlock(LiteralBlock {
                language: None,
                content: block.content.clone(),
            })),
            (BlockKind::HtmlBlock, _) => state.add(DocNode::Raw(RawBlock {
                format: "html".to_string(),
                content: block.content.clone(),
            })),
            (BlockKind::Hr, _) => state.add(DocNode::Transition),
            (BlockKind::MathBlock, _) => state.add(DocNode::MathBlock {
                content: block.content.clone(),
            }),
            (BlockKind::FootnoteReference { label }, _) => {
                tracing::debug!(label = %label, "footnote definition left in stream");
            }
            (kind, nesting) => state.warn(
                DiagnosticKind::MalformedTokens,
                format!("unexpected {:?} {} token", nesting, kind.name()),
            ),
        }
    }

    fn fence(&self, state: &mut BuildState, block: &BlockToken) {
        let lines: Vec<&str> = block.content.lines().collect();
        match directive_name(&block.info) {
            Some((name, arguments)) => {
                self.run_directive(state, name, arguments, &lines, Some(&block.content))
            }
            None => {
                let language = block
                    .info
                    .split_whitespace()
                    .next()
                    .map(str::to_string);
                state.add(DocNode::LiteralBlock(LiteralBlock {
                    language,
                    content: block.content.clone(),
                }));
            }
        }
    }

    fn run_directive(
        &self,
        state: &mut BuildState,
        name: &str,
        arguments: &str,
        lines: &[&str],
        raw: Option<&str>,
    ) {
        match self.directives.get(name) {
            Some(directive) => {
                for node in directive.run(arguments, lines) {
                    state.add(node);
                }
            }
            None => {
                state.warn(
                    DiagnosticKind::UnknownDirective,
                    format!("unknown directive type '{name}'"),
                );
                state.add(DocNode::LiteralBlock(LiteralBlock {
                    language: None,
                    content: raw.map(str::to_string).unwrap_or_else(|| lines.concat()),
                }));
            }
        }
    }
}

/// A heading or paragraph waiting for its inline content.
#[derive(Debug)]
struct Pending {
    hidden: bool,
    content: Vec<Inline>,
}

impl Pending {
    fn new(hidden: bool) -> Self {
        Self {
            hidden,
            content: Vec::new(),
        }
    }
}

/// Represents a node being built on the stack
#[derive(Debug)]
enum StackNode {
    Section {
        level: u8,
        title: Vec<Inline>,
        id: String,
        children: Vec<DocNode>,
    },
    List {
        ordered: bool,
        start: u64,
        tight: bool,
        items: Vec<ListItem>,
    },
    ListItem {
        children: Vec<DocNode>,
        /// Holds a paragraph of a tight list
        tight: bool,
    },
    BlockQuote {
        children: Vec<DocNode>,
    },
    Footnotes {
        items: Vec<Footnote>,
    },
    Footnote {
        id: usize,
        label: String,
        children: Vec<DocNode>,
    },
}

/// What a popped stack node turns into.
enum Finished {
    Node(DocNode),
    Item(ListItem, bool),
    Footnote(Footnote),
}

impl StackNode {
    fn type_name(&self) -> &'static str {
        match self {
            StackNode::Section { .. } => "Section",
            StackNode::List { .. } => "List",
            StackNode::ListItem { .. } => "ListItem",
            StackNode::BlockQuote { .. } => "BlockQuote",
            StackNode::Footnotes { .. } => "Footnotes",
            StackNode::Footnote { .. } => "Footnote",
        }
    }

    fn finish(self) -> Finished {
        match self {
            StackNode::Section {
                level,
                title,
                id,
                children,
            } => Finished::Node(DocNode::Section(Section {
                level,
                title,
                id,
                children,
            })),
            StackNode::List {
                ordered,
                start,
                tight,
                items,
            } => Finished::Node(DocNode::List(List {
                ordered,
                start,
                tight,
                items,
            })),
            StackNode::ListItem { children, tight } => {
                Finished::Item(ListItem { children }, tight)
            }
            StackNode::BlockQuote { children } => {
                Finished::Node(DocNode::BlockQuote(BlockQuote { children }))
            }
            StackNode::Footnotes { items } => Finished::Node(DocNode::Footnotes { items }),
            StackNode::Footnote {
                id,
                label,
                children,
            } => Finished::Footnote(Footnote {
                id,
                label,
                children,
            }),
        }
    }

    /// Attach a finished child. Hands the child back when this node cannot hold it.
    fn attach(&mut self, child: Finished) -> Result<(), Finished> {
        match (self, child) {
            (StackNode::List { items, tight, .. }, Finished::Item(item, item_tight)) => {
                items.push(item);
                *tight |= item_tight;
                Ok(())
            }
            (StackNode::Footnotes { items }, Finished::Footnote(footnote)) => {
                items.push(footnote);
                Ok(())
            }
            (
                StackNode::Section { children, .. }
                | StackNode::ListItem { children, .. }
                | StackNode::BlockQuote { children }
                | StackNode::Footnote { children, .. },
                Finished::Node(node),
            ) => {
                children.push(node);
                Ok(())
            }
            (_, child) => Err(child),
        }
    }
}

#[derive(Default)]
struct BuildState {
    document: Document,
    /// Open containers; the document root is implicit below them
    stack: Vec<StackNode>,
    pending: Option<Pending>,
    diagnostics: Vec<Diagnostic>,
    ids: HashMap<String, usize>,
    unknown_renderers: HashSet<String>,
    line: Option<usize>,
}

impl BuildState {
    fn warn(&mut self, kind: DiagnosticKind, message: String) {
        self.diagnostics.push(Diagnostic::new(kind, self.line, message));
    }

    /// Attach a node to the innermost container that accepts it.
    fn add(&mut self, node: DocNode) {
        self.attach(Finished::Node(node));
    }

    fn attach(&mut self, mut child: Finished) {
        for open in self.stack.iter_mut().rev() {
            match open.attach(child) {
                Ok(()) => return,
                Err(rejected) => child = rejected,
            }
        }
        let node = match child {
            Finished::Node(node) => node,
            Finished::Item(item, tight) => DocNode::List(List {
                ordered: false,
                start: 1,
                tight,
                items: vec![item],
            }),
            Finished::Footnote(footnote) => DocNode::Footnotes {
                items: vec![footnote],
            },
        };
        self.document.children.push(node);
    }

    fn at_section_level(&self) -> bool {
        matches!(self.stack.last(), None | Some(StackNode::Section { .. }))
    }

    /// Close open sections at `level` or deeper; `0` closes all of them.
    fn close_sections(&mut self, level: u8) {
        while let Some(StackNode::Section { level: open, .. }) = self.stack.last() {
            if *open < level {
                break;
            }
            self.pop_into_parent();
        }
    }

    fn close(&mut self, expected: &str) {
        let matches = self
            .stack
            .last()
            .is_some_and(|top| top.type_name() == expected);
        if matches {
            self.pop_into_parent();
        } else {
            let found = self.stack.last().map(StackNode::type_name).unwrap_or("Document");
            self.warn(
                DiagnosticKind::MalformedTokens,
                format!("close of {expected} while {found} is open"),
            );
        }
    }

    fn pop_into_parent(&mut self) {
        if let Some(node) = self.stack.pop() {
            self.attach(node.finish());
        }
    }

    fn unique_id(&mut self, title: &str) -> String {
        let base = slugify(title);
        let count = self.ids.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;
        id
    }
}

/// Lowercase anchor made of alphanumerics separated by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{markup_to_tokens, notebook_to_tokens};
    use crate::markup::ParserConfig;
    use crate::notebook::{Cell, Notebook};
    use serde_json::{json, Map};

    fn build(tokens: &[Token]) -> BuiltTree {
        let directives = DirectiveRegistry::with_defaults();
        let renderers = CellRendererRegistry::with_defaults();
        TreeBuilder::new(&directives, &renderers).build(tokens)
    }

    fn markdown(source: &str) -> BuiltTree {
        build(&markup_to_tokens(source, &ParserConfig::default()).tokens)
    }

    #[test]
    fn headings_nest_into_sections() {
        let tree = markdown("# One\n\ntext\n\n## Two\n\nmore\n\n# Three\n");
        let doc = &tree.document;
        assert_eq!(doc.children.len(), 2);
        match &doc.children[0] {
            DocNode::Section(section) => {
                assert_eq!(section.id, "one");
                assert_eq!(section.children.len(), 2);
                assert!(matches!(&section.children[1], DocNode::Section(s) if s.level == 2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(doc.title().as_deref(), Some("One"));
        assert!(tree.diagnostics.is_empty());
    }

    #[test]
    fn duplicate_titles_get_unique_ids() {
        let tree = markdown("# A\n\n# A\n");
        let ids: Vec<_> = tree
            .document
            .children
            .iter()
            .filter_map(|n| match n {
                DocNode::Section(s) => Some(s.id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "a-1"]);
    }

    #[test]
    fn tight_lists_are_flagged() {
        let tree = markdown("- a\n- b\n\n1. x\n\n2. y\n");
        let lists: Vec<_> = tree
            .document
            .children
            .iter()
            .filter_map(|n| match n {
                DocNode::List(l) => Some((l.ordered, l.tight, l.items.len())),
                _ => None,
            })
            .collect();
        assert_eq!(lists, vec![(false, true, 2), (true, false, 2)]);
    }

    #[test]
    fn heading_in_quote_is_a_rubric() {
        let tree = markdown("> # Quoted\n");
        match &tree.document.children[0] {
            DocNode::BlockQuote(quote) => {
                assert!(matches!(&quote.children[0], DocNode::Rubric(r) if r.level == 1))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_directive_is_reported_and_kept_literal() {
        let tree = markdown("```{mystery} arg\nbody\n```\n");
        assert_eq!(tree.diagnostics.len(), 1);
        assert_eq!(tree.diagnostics[0].kind, DiagnosticKind::UnknownDirective);
        assert_eq!(tree.diagnostics[0].line, Some(1));
        assert!(matches!(
            &tree.document.children[0],
            DocNode::LiteralBlock(b) if b.content == "body\n"
        ));
    }

    #[test]
    fn cell_meta_fence_runs_directive() {
        let tree = markdown("```{cell_meta}\n{\"slideshow\": {}}\n```\n");
        assert_eq!(tree.document.cell_metas().len(), 1);
        assert_eq!(tree.document.cell_metas()[0].metadata, "{\"slideshow\": {}}");
    }

    #[test]
    fn notebook_tokens_build_carriers_and_cells() {
        let notebook = Notebook::new(
            vec![
                Cell::markdown("# Title")
                    .with_metadata(json!({"slideshow": {"slide_type": "slide"}})),
                Cell::code("x = 1"),
            ],
            match json!({"kernelspec": {"language": "python"}}) {
                serde_json::Value::Object(map) => map,
                _ => Map::new(),
            },
        );
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), "default");
        let tree = build(&conversion.tokens);
        let doc = &tree.document;

        assert_eq!(doc.info.get("kernelspec"), Some(&json!({"language": "python"})));
        assert!(matches!(&doc.children[0], DocNode::CellMeta(_)));
        match &doc.children[1] {
            DocNode::Section(section) => {
                assert!(matches!(&section.children[0], DocNode::CellMeta(_)));
                assert!(matches!(
                    &section.children[1],
                    DocNode::CodeCell(c) if c.lexer.as_deref() == Some("python")
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(doc.cell_metas().len(), 2);
        assert_eq!(doc.code_cells().len(), 1);
    }

    #[test]
    fn unknown_renderer_falls_back_once() {
        let notebook = Notebook::new(vec![Cell::code("a"), Cell::code("b")], Map::new());
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), "fancy");
        let tree = build(&conversion.tokens);
        let unknown: Vec<_> = tree
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnknownRenderer)
            .collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(tree.document.code_cells().len(), 2);
    }

    #[test]
    fn footnotes_close_open_sections() {
        let tree = markdown("# T\n\nSee[^n].\n\n[^n]: Note.\n");
        let last = tree.document.children.last().unwrap();
        match last {
            DocNode::Footnotes { items } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].label, "n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stray_close_is_reported() {
        let tokens = vec![Token::Markdown(BlockToken::close(BlockKind::ListItem, 0))];
        let tree = build(&tokens);
        assert_eq!(tree.diagnostics[0].kind, DiagnosticKind::MalformedTokens);
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  "), "section");
        assert_eq!(slugify("Über Größe"), "über-größe");
    }
}
