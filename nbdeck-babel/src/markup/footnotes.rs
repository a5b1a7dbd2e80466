//! Footnote tail
//!
//! Footnote definitions stay in place through the block and inline phases. Afterwards
//! they are pulled out of the stream and re-emitted in a single footnote block at the end,
//! ordered by first reference. Definitions that are never referenced are dropped.

use super::env::{normalize_label, ReferenceEnv};
use super::token::{BlockKind, BlockToken, Nesting, Token};
use std::collections::HashMap;

/// Move footnote definitions into a trailing footnote block.
pub fn collect_footnotes(tokens: Vec<Token>, env: &ReferenceEnv) -> Vec<Token> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut definitions: HashMap<String, (BlockToken, Vec<Token>)> = HashMap::new();
    let mut current: Option<(String, BlockToken, Vec<Token>)> = None;

    for token in tokens {
        let footnote = match &token {
            Token::Markdown(block) => match &block.kind {
                BlockKind::FootnoteReference { label } => Some((label.clone(), block.nesting)),
                _ => None,
            },
            _ => None,
        };

        match footnote {
            Some((label, Nesting::Open)) if current.is_none() => {
                if let Token::Markdown(open) = token {
                    current = Some((label, open, Vec::new()));
                }
            }
            Some((label, Nesting::Close))
                if current.as_ref().is_some_and(|(open, _, _)| *open == label) =>
            {
                if let Some((label, open, body)) = current.take() {
                    definitions
                        .entry(normalize_label(&label))
                        .or_insert((open, body));
                }
            }
            _ => match current.as_mut() {
                Some((_, _, body)) => body.push(token),
                None => kept.push(token),
            },
        }
    }

    if let Some((label, _, _)) = current {
        tracing::debug!(label = %label, "unterminated footnote definition");
    }

    let referenced: Vec<(usize, &String)> = env
        .footnote_order
        .iter()
        .enumerate()
        .filter(|(_, label)| definitions.contains_key(*label))
        .collect();
    if referenced.is_empty() {
        return kept;
    }

    kept.push(Token::Markdown(BlockToken::open(BlockKind::FootnoteBlock, 0)));
    for (id, key) in referenced {
        let Some((open, body)) = definitions.remove(key) else {
            continue;
        };
        let label = match &open.kind {
            BlockKind::FootnoteReference { label } => label.clone(),
            _ => key.clone(),
        };
        let kind = BlockKind::Footnote { id, label };
        let mut footnote_open = BlockToken::open(kind.clone(), 1);
        footnote_open.map = open.map;
        kept.push(Token::Markdown(footnote_open));
        kept.extend(body);
        kept.push(Token::Markdown(BlockToken::close(kind, 1)));
    }
    kept.push(Token::Markdown(BlockToken::close(BlockKind::FootnoteBlock, 0)));
    kept
}
