//! Shared helpers for the integration tests.

use nbdeck_babel::markup::{Inline, Token};
use nbdeck_babel::notebook::Notebook;
use std::path::PathBuf;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|err| panic!("failed to read fixture {name}: {err}"))
}

pub fn load_notebook(name: &str) -> Notebook {
    Notebook::from_ipynb_str(&load_fixture(name)).expect("fixture is a valid notebook")
}

/// Payloads of the carrier tokens, in stream order.
pub fn carriers(tokens: &[Token]) -> Vec<&str> {
    tokens
        .iter()
        .filter_map(|token| match token {
            Token::CellMeta { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

pub fn code_cell_count(tokens: &[Token]) -> usize {
    tokens
        .iter()
        .filter(|token| matches!(token, Token::CodeCell(_)))
        .count()
}

/// Every inline node of the stream, depth first.
pub fn inlines(tokens: &[Token]) -> Vec<&Inline> {
    fn walk<'a>(nodes: &'a [Inline], out: &mut Vec<&'a Inline>) {
        for node in nodes {
            out.push(node);
            match node {
                Inline::Emph(children)
                | Inline::Strong(children)
                | Inline::Link { children, .. } => walk(children, out),
                _ => {}
            }
        }
    }

    let mut out = Vec::new();
    for token in tokens {
        if let Some(children) = token.as_markdown().and_then(|block| block.children.as_ref()) {
            walk(children, &mut out);
        }
    }
    out
}

/// Raw text of all markdown tokens.
pub fn markdown_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(Token::as_markdown)
        .map(|block| block.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
