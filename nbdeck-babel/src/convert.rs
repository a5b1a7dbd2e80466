//! Notebook to token stream conversion
//!
//!     A notebook is converted in two passes that share one [`ReferenceEnv`]:
//!
//!     1. Every cell, in order, produces a `CellMeta` token followed by its content. Markdown
//!        cells go through the block phase only, so their `Inline` tokens keep raw text.
//!        Code cells become a single opaque `CodeCell` token. Raw cells contribute their
//!        `CellMeta` token only.
//!     2. The inline phase and the footnote tail then run once over the whole stream.
//!
//!     Running the inline phase after all cells is what lets a reference used in one cell
//!     resolve against a definition in a later cell.
//!
//! Line numbers
//!
//!     Text notebooks record a `source_map` with the 0-based start line of each cell, which
//!     gives exact 1-based document lines. JSON notebooks have no such mapping, so each cell
//!     starts at a pseudo line `(index + 1) * PSEUDO_LINE_STRIDE + 1`. Those numbers only
//!     identify the cell, but they are strictly increasing and never overlap between cells.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::markup::{
    collect_footnotes, run_inline_phase, BlockParser, CodeCellToken, ParserConfig, ReferenceEnv,
    Token,
};
use crate::notebook::{CellKind, Notebook};
use serde::Serialize;

/// Distance between the pseudo start lines of consecutive cells.
pub const PSEUDO_LINE_STRIDE: usize = 10_000;

/// Identifier of the built-in code cell renderer.
pub const DEFAULT_RENDERER: &str = "default";

/// Result of converting one document.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub env: ReferenceEnv,
    pub tokens: Vec<Token>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts a notebook into an ordered token stream.
pub fn notebook_to_tokens(
    notebook: &Notebook,
    config: &ParserConfig,
    renderer: &str,
) -> Conversion {
    let parser = BlockParser::new(config);
    let mut env = ReferenceEnv::new();
    let mut diagnostics = Vec::new();
    let mut tokens = Vec::new();

    let source_map = notebook.source_map();
    let lexer = notebook.lexer_name();
    let mut lexer_reported = false;
    let mut next_free_line = 0;

    for (index, cell) in notebook.cells.iter().enumerate() {
        if cell.is_empty() || cell.is_removed() {
            continue;
        }

        let start_line = match &source_map {
            Some(lines) => lines[index] + 1,
            None => pseudo_start_line(index).max(next_free_line + 1),
        };

        tokens.push(Token::CellMeta {
            content: cell.metadata_json(),
            map: [start_line, start_line],
        });

        let mut cell_end = start_line;
        match cell.kind {
            CellKind::Markdown => {
                let blocks = parser.parse(&cell.source, &mut env);
                for mut block in blocks {
                    block.shift(start_line);
                    if let Some([_, end]) = block.map {
                        cell_end = cell_end.max(end);
                    }
                    tokens.push(Token::Markdown(block));
                }
                env.fix_duplicate_maps(start_line);
            }
            CellKind::Code => {
                if lexer.is_none() && !lexer_reported {
                    lexer_reported = true;
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnresolvedLanguageLexer,
                        Some(start_line),
                        "no language_info or kernelspec language in notebook metadata; \
                         code cells are rendered without highlighting",
                    ));
                }
                tokens.push(Token::CodeCell(CodeCellToken {
                    cell: cell.clone(),
                    lexer: lexer.clone(),
                    renderer: renderer.to_string(),
                    map: [start_line, start_line],
                }));
            }
            CellKind::Raw => {}
        }
        next_free_line = cell_end;
    }

    run_inline_phase(&mut tokens, &mut env, config);
    let mut tokens = collect_footnotes(tokens, &env);

    tokens.insert(
        0,
        Token::FrontMatter {
            metadata: notebook.metadata.clone(),
            map: [0, 0],
        },
    );
    if let Some(state) = notebook.widget_state() {
        tokens.push(Token::WidgetState {
            state: state.clone(),
            map: [0, 0],
        });
    }

    diagnostics.extend(duplicate_diagnostics(&env));
    tracing::debug!(
        cells = notebook.cells.len(),
        tokens = tokens.len(),
        "converted notebook to tokens"
    );

    Conversion {
        env,
        tokens,
        diagnostics,
    }
}

/// Converts a plain markdown document, used when the source is not a notebook.
pub fn markup_to_tokens(source: &str, config: &ParserConfig) -> Conversion {
    let mut env = ReferenceEnv::new();
    let mut tokens: Vec<Token> = BlockParser::new(config)
        .parse(source, &mut env)
        .into_iter()
        .map(|mut block| {
            block.shift(1);
            Token::Markdown(block)
        })
        .collect();
    env.fix_duplicate_maps(1);

    run_inline_phase(&mut tokens, &mut env, config);
    let tokens = collect_footnotes(tokens, &env);
    let diagnostics = duplicate_diagnostics(&env);

    Conversion {
        env,
        tokens,
        diagnostics,
    }
}

/// Pseudo start line of the cell at `index`, used without a source map.
pub fn pseudo_start_line(index: usize) -> usize {
    (index + 1) * PSEUDO_LINE_STRIDE + 1
}

fn duplicate_diagnostics(env: &ReferenceEnv) -> Vec<Diagnostic> {
    env.duplicate_refs
        .iter()
        .map(|dup| {
            Diagnostic::new(
                DiagnosticKind::DuplicateReference,
                dup.map.map(|[start, _]| start),
                format!(
                    "duplicate reference definition '{}' (ignored target {})",
                    dup.label, dup.href
                ),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;
    use serde_json::{json, Map};

    fn metadata(value: serde_json::Value) -> Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn carrier_precedes_cell_content() {
        let notebook = Notebook::new(
            vec![
                Cell::markdown("# Title"),
                Cell::code("x = 1").with_metadata(json!({"tags": ["hide"]})),
            ],
            metadata(json!({"kernelspec": {"language": "python"}})),
        );
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
        let names: Vec<_> = conversion.tokens.iter().map(Token::kind_name).collect();
        assert_eq!(
            names,
            vec![
                "front_matter",
                "cell_meta",
                "heading",
                "inline",
                "heading",
                "cell_meta",
                "nb_code_cell"
            ]
        );
        match &conversion.tokens[5] {
            Token::CellMeta { content, map } => {
                assert_eq!(content, r#"{"tags":["hide"]}"#);
                assert_eq!(*map, [20_001, 20_001]);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &conversion.tokens[6] {
            Token::CodeCell(code) => {
                assert_eq!(code.lexer.as_deref(), Some("python"));
                assert_eq!(code.renderer, "default");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(conversion.diagnostics.is_empty());
    }

    #[test]
    fn source_map_gives_document_lines() {
        let mut notebook = Notebook::new(
            vec![Cell::markdown("intro"), Cell::markdown("para\n\nmore")],
            Map::new(),
        );
        notebook
            .metadata
            .insert("source_map".into(), json!([3, 7]));
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
        let maps: Vec<_> = conversion
            .tokens
            .iter()
            .filter(|t| t.kind_name() == "cell_meta")
            .filter_map(Token::map)
            .collect();
        assert_eq!(maps, vec![[4, 4], [8, 8]]);
        let more = conversion
            .tokens
            .iter()
            .filter_map(Token::as_markdown)
            .find(|b| b.content == "more")
            .unwrap();
        assert_eq!(more.map, Some([10, 11]));
    }

    #[test]
    fn missing_lexer_is_a_single_warning() {
        let notebook = Notebook::new(vec![Cell::code("a"), Cell::code("b")], Map::new());
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
        assert_eq!(conversion.diagnostics.len(), 1);
        assert_eq!(
            conversion.diagnostics[0].kind,
            DiagnosticKind::UnresolvedLanguageLexer
        );
    }

    #[test]
    fn raw_cells_only_carry_metadata() {
        let notebook = Notebook::new(vec![Cell::new(CellKind::Raw, "raw text")], Map::new());
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
        let names: Vec<_> = conversion.tokens.iter().map(Token::kind_name).collect();
        assert_eq!(names, vec!["front_matter", "cell_meta"]);
    }

    #[test]
    fn long_cells_push_the_next_pseudo_line() {
        let long = "line\n".repeat(PSEUDO_LINE_STRIDE + 5);
        let notebook = Notebook::new(
            vec![Cell::markdown(long), Cell::markdown("next")],
            Map::new(),
        );
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
        let starts: Vec<usize> = conversion
            .tokens
            .iter()
            .filter(|t| t.kind_name() == "cell_meta")
            .filter_map(|t| t.map().map(|[start, _]| start))
            .collect();
        let first_end = conversion
            .tokens
            .iter()
            .filter_map(Token::as_markdown)
            .filter_map(|b| b.map)
            .map(|[_, end]| end)
            .next()
            .unwrap();
        assert!(starts[1] > first_end);
    }

    #[test]
    fn duplicate_reference_is_reported_at_document_line() {
        let notebook = Notebook::new(
            vec![Cell::markdown("[a]: /one"), Cell::markdown("[a]: /two")],
            Map::new(),
        );
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
        let dup = conversion
            .diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::DuplicateReference)
            .unwrap();
        assert_eq!(dup.line, Some(pseudo_start_line(1)));
    }

    #[test]
    fn markup_fallback_uses_one_based_lines() {
        let conversion = markup_to_tokens("# A\n\ntext\n", &ParserConfig::default());
        assert_eq!(conversion.tokens[0].map(), Some([1, 2]));
        assert_eq!(conversion.tokens[3].map(), Some([3, 4]));
    }
}
