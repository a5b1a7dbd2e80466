//! CLI-specific transforms
//!
//! This module defines the views available to `nbdeck inspect`. Each transform is a
//! stage + format combination (e.g., "tokens-json", "tree-json").
//!
//! ## Stages
//!
//! 1. **Conversion** - Source text → Token stream
//!    - `tokens-*`: The flat stream, carriers included
//!    - `env-json`: Reference environment shared by all cells
//!
//! 2. **Assembly** - Tokens → Document tree
//!    - `tree-json`: JSON representation
//!
//! 3. **Checks**
//!    - `diagnostics`: Warnings collected while converting, one per line

use nbdeck_babel::adapter::{DocumentTarget, NotebookParser};
use nbdeck_babel::markup::Token;

/// All available CLI transforms (stage + format combinations)
pub const AVAILABLE_TRANSFORMS: &[&str] = &[
    "tokens-json",
    "tokens-simple",
    "tree-json",
    "env-json",
    "diagnostics",
];

pub const DEFAULT_TRANSFORM: &str = "tokens-simple";

/// Execute a named transform on a source file.
///
/// ```ignore
/// let parser = NotebookParser::new(ParserConfig::default());
/// let target = DocumentTarget::from_path(Path::new("deck.ipynb"));
/// let output = execute_transform(&source, &target, "tokens-json", &parser)?;
/// ```
pub fn execute_transform(
    source: &str,
    target: &DocumentTarget,
    transform_name: &str,
    parser: &NotebookParser,
) -> Result<String, String> {
    let parsed = parser
        .parse(source, target)
        .map_err(|e| format!("Transform failed: {e}"))?;

    match transform_name {
        "tokens-json" => serde_json::to_string_pretty(&parsed.conversion.tokens)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        "tokens-simple" => Ok(tokens_to_simple(&parsed.conversion.tokens)),
        "tree-json" => serde_json::to_string_pretty(&parsed.document)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        "env-json" => serde_json::to_string_pretty(&parsed.conversion.env)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        "diagnostics" => Ok(parsed
            .diagnostics
            .iter()
            .map(|diagnostic| format!("{diagnostic}\n"))
            .collect()),
        _ => Err(format!(
            "Unknown transform '{transform_name}'. Available: {}",
            AVAILABLE_TRANSFORMS.join(", ")
        )),
    }
}

/// One line per token: nesting level, kind and line range.
pub fn tokens_to_simple(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let level = token.as_markdown().map(|block| block.level).unwrap_or(0);
        out.push_str(&"  ".repeat(level));
        out.push_str(token.kind_name());
        if let Some([start, end]) = token.map() {
            out.push_str(&format!(" [{start}, {end}]"));
        }
        if let Token::CellMeta { content, .. } = token {
            out.push(' ');
            out.push_str(content);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbdeck_babel::markup::ParserConfig;

    const NOTEBOOK: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "metadata": {"slideshow": {"slide_type": "slide"}}, "source": "# Deck"},
            {"cell_type": "code", "metadata": {}, "outputs": [], "execution_count": null, "source": "x = 1"}
        ],
        "metadata": {"kernelspec": {"language": "python", "name": "python3"}},
        "nbformat": 4,
        "nbformat_minor": 5
    }"##;

    fn run(transform: &str) -> Result<String, String> {
        let parser = NotebookParser::new(ParserConfig::default());
        execute_transform(
            NOTEBOOK,
            &DocumentTarget::new("deck", "deck.ipynb"),
            transform,
            &parser,
        )
    }

    #[test]
    fn simple_tokens_show_carriers() {
        let output = run("tokens-simple").unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "front_matter [0, 0]");
        assert_eq!(
            lines[1],
            r#"cell_meta [10001, 10001] {"slideshow":{"slide_type":"slide"}}"#
        );
        assert!(lines.last().unwrap().starts_with("nb_code_cell [20001, 20001]"));
    }

    #[test]
    fn json_transforms_parse_back() {
        for transform in ["tokens-json", "tree-json", "env-json"] {
            let output = run(transform).unwrap();
            assert!(serde_json::from_str::<serde_json::Value>(&output).is_ok());
        }
    }

    #[test]
    fn unknown_transform_is_an_error() {
        let err = run("ast-tag").unwrap_err();
        assert!(err.contains("Unknown transform"));
    }
}
