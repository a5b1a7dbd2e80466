//! Notebook to token stream conversion, driven by fixtures.

use crate::common::{carriers, code_cell_count, inlines, load_fixture, load_notebook, markdown_text};
use nbdeck_babel::convert::{notebook_to_tokens, DEFAULT_RENDERER};
use nbdeck_babel::converters::{NotebookConverter, TextNotebookConverter};
use nbdeck_babel::error::DiagnosticKind;
use nbdeck_babel::markup::{Inline, ParserConfig, Token};
use nbdeck_babel::notebook::{Cell, Notebook};
use serde_json::{json, Map, Value};

fn tokens_for(notebook: &Notebook) -> Vec<Token> {
    notebook_to_tokens(notebook, &ParserConfig::default(), DEFAULT_RENDERER).tokens
}

#[test]
fn test_three_cell_deck_has_one_carrier_per_cell() {
    let notebook = load_notebook("three_cells.ipynb");
    let tokens = tokens_for(&notebook);

    assert_eq!(
        carriers(&tokens),
        vec!["{}", "{}", r#"{"slideshow":{"slide_type":"slide"}}"#]
    );
    assert_eq!(code_cell_count(&tokens), 1);
}

#[test]
fn test_carrier_opens_every_cell() {
    let notebook = load_notebook("three_cells.ipynb");
    let tokens = tokens_for(&notebook);
    let kinds: Vec<&str> = tokens.iter().map(Token::kind_name).collect();

    assert_eq!(kinds[0], "front_matter");
    assert_eq!(kinds[1], "cell_meta");
    assert_eq!(kinds[2], "heading");
    let code = kinds.iter().position(|k| *k == "nb_code_cell").unwrap();
    assert_eq!(kinds[code - 1], "cell_meta");
    let last_carrier = kinds.iter().rposition(|k| *k == "cell_meta").unwrap();
    assert_eq!(kinds[last_carrier + 1], "heading");
}

#[test]
fn test_whitespace_and_removed_cells_emit_nothing() {
    let notebook = load_notebook("skipped_cells.ipynb");
    let tokens = tokens_for(&notebook);

    assert_eq!(carriers(&tokens).len(), 2);
    assert_eq!(code_cell_count(&tokens), 1);
    let text = markdown_text(&tokens);
    assert!(text.contains("Kept"));
    assert!(!text.contains("Hidden prose"));
    for token in &tokens {
        if let Token::CodeCell(code) = token {
            assert_eq!(code.cell.source, "visible = 1");
        }
    }
}

#[test]
fn test_references_resolve_against_later_cells() {
    let notebook = load_notebook("forward_refs.ipynb");
    let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);
    let found = inlines(&conversion.tokens);

    let link = found
        .iter()
        .find_map(|inline| match inline {
            Inline::Link { href, title, .. } => Some((href.clone(), title.clone())),
            _ => None,
        })
        .expect("reference link resolved");
    assert_eq!(link.0, "https://example.org/docs");
    assert_eq!(link.1.as_deref(), Some("Docs"));

    assert!(found
        .iter()
        .any(|inline| matches!(inline, Inline::FootnoteRef { label, .. } if label == "n")));
    assert!(conversion.diagnostics.is_empty());
}

#[test]
fn test_footnotes_are_collected_at_the_end() {
    let notebook = load_notebook("forward_refs.ipynb");
    let tokens = tokens_for(&notebook);
    let kinds: Vec<&str> = tokens.iter().map(Token::kind_name).collect();

    assert_eq!(kinds.last(), Some(&"footnote_block"));
    let block = kinds.iter().position(|k| *k == "footnote_block").unwrap();
    assert!(kinds[..block].iter().all(|k| *k != "footnote_reference"));
}

#[test]
fn test_missing_lexer_is_absent_not_an_error() {
    let notebook = Notebook::new(vec![Cell::code("x = 1")], Map::new());
    let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);

    let code = conversion
        .tokens
        .iter()
        .find_map(|token| match token {
            Token::CodeCell(code) => Some(code),
            _ => None,
        })
        .unwrap();
    assert_eq!(code.lexer, None);
    assert_eq!(conversion.diagnostics.len(), 1);
    assert_eq!(
        conversion.diagnostics[0].kind,
        DiagnosticKind::UnresolvedLanguageLexer
    );
}

#[test]
fn test_lexer_prefers_pygments_name() {
    let notebook = load_notebook("three_cells.ipynb");
    let tokens = tokens_for(&notebook);
    let lexer = tokens.iter().find_map(|token| match token {
        Token::CodeCell(code) => code.lexer.clone(),
        _ => None,
    });
    assert_eq!(lexer.as_deref(), Some("ipython3"));
}

#[test]
fn test_text_notebook_uses_document_lines() {
    let source = load_fixture("deck.md");
    let converter = TextNotebookConverter::new(ParserConfig::default());
    let notebook = converter.convert(&source).unwrap();
    let tokens = tokens_for(&notebook);

    let carrier_lines: Vec<usize> = tokens
        .iter()
        .filter(|token| matches!(token, Token::CellMeta { .. }))
        .filter_map(|token| token.map().map(|[start, _]| start))
        .collect();
    assert_eq!(carrier_lines, vec![11, 17, 19]);

    let results = tokens
        .iter()
        .filter_map(Token::as_markdown)
        .find(|block| block.kind.name() == "heading" && block.map.is_some_and(|[s, _]| s > 11))
        .unwrap();
    assert_eq!(results.map, Some([17, 18]));
}

#[test]
fn test_front_matter_comes_first_and_widget_state_last() {
    let mut metadata = Map::new();
    metadata.insert(
        "widgets".to_string(),
        json!({
            "application/vnd.jupyter.widget-state+json": {
                "state": {"abc": {"model_name": "IntSliderModel"}},
                "version_major": 2,
                "version_minor": 0
            }
        }),
    );
    let notebook = Notebook::new(vec![Cell::markdown("hello")], metadata);
    let tokens = tokens_for(&notebook);

    assert!(matches!(tokens.first(), Some(Token::FrontMatter { .. })));
    match tokens.last() {
        Some(Token::WidgetState { state, .. }) => {
            assert!(state.get("state").and_then(Value::as_object).is_some())
        }
        other => panic!("expected widget state, got {other:?}"),
    }
}
