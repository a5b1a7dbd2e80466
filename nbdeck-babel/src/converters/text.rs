//! Text notebooks
//!
//!     A text notebook is a markdown file whose YAML front matter has a `kernelspec` key.
//!     The front matter becomes the notebook metadata. The body is split into cells:
//!
//!         +++ {"slideshow": {"slide_type": "slide"}}     starts a markdown cell, with
//!                                                        optional JSON metadata
//!         ```{code-cell} python                           a code cell; `:key: value` lines
//!         :tags: [remove-input]                           or a `---` YAML block at the top
//!         print(1)                                        become its metadata
//!         ```
//!
//!     `{raw-cell}` fences work like `{code-cell}` ones. Text outside fences and separators
//!     belongs to the surrounding markdown cell.
//!
//!     The 0-based start line of every cell is stored in the `source_map` metadata entry so
//!     that diagnostics point at real lines of the file.

use super::{has_extension, NotebookConverter};
use crate::error::NotebookError;
use crate::markup::ParserConfig;
use crate::notebook::{Cell, CellKind, Notebook};
use serde_json::{Map, Value};
use std::path::Path;

const CELL_BREAK: &str = "+++";

pub struct TextNotebookConverter {
    config: ParserConfig,
}

impl TextNotebookConverter {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }
}

impl NotebookConverter for TextNotebookConverter {
    fn name(&self) -> &str {
        "text-notebook"
    }

    fn accepts(&self, path: &Path, lines: &[&str]) -> bool {
        if !has_extension(path, &["md", "markdown"]) {
            return false;
        }
        if lines.first().map(|line| line.trim_end()) != Some("---") {
            return false;
        }
        lines
            .iter()
            .skip(1)
            .take_while(|line| line.trim_end() != "---")
            .any(|line| line.starts_with("kernelspec:"))
    }

    fn convert(&self, source: &str) -> Result<Notebook, NotebookError> {
        let lines: Vec<&str> = source.lines().collect();
        let (mut metadata, body_start) = read_front_matter(&lines)?;

        let mut reader = CellReader::default();
        reader.read(&lines, body_start)?;

        metadata.insert(
            "source_map".to_string(),
            Value::Array(reader.source_map.into_iter().map(Value::from).collect()),
        );
        Ok(Notebook::new(reader.cells, metadata))
    }

    fn parser_config(&self) -> ParserConfig {
        self.config
    }
}

fn malformed(line: usize, message: impl Into<String>) -> NotebookError {
    NotebookError::Malformed {
        line,
        message: message.into(),
    }
}

/// Metadata from the front matter, and the index of the first body line.
fn read_front_matter(lines: &[&str]) -> Result<(Map<String, Value>, usize), NotebookError> {
    if lines.first().map(|line| line.trim_end()) != Some("---") {
        return Ok((Map::new(), 0));
    }
    let close = lines
        .iter()
        .skip(1)
        .position(|line| line.trim_end() == "---")
        .map(|offset| offset + 1)
        .ok_or_else(|| malformed(1, "unterminated front matter"))?;

    let yaml = lines[1..close].join("\n");
    if yaml.trim().is_empty() {
        return Ok((Map::new(), close + 1));
    }
    match serde_yaml::from_str::<Value>(&yaml)? {
        Value::Object(map) => Ok((map, close + 1)),
        _ => Err(malformed(2, "front matter is not a mapping")),
    }
}

struct PendingMarkdown<'a> {
    start: usize,
    lines: Vec<&'a str>,
    metadata: Map<String, Value>,
    /// Opened by a cell break, so kept even when empty
    explicit: bool,
}

#[derive(Default)]
struct CellReader {
    cells: Vec<Cell>,
    source_map: Vec<usize>,
}

impl CellReader {
    fn read<'a>(&mut self, lines: &[&'a str], start: usize) -> Result<(), NotebookError> {
        let mut pending: Option<PendingMarkdown<'a>> = None;
        let mut index = start;

        while index < lines.len() {
            let line = lines[index];

            if let Some(rest) = line.strip_prefix(CELL_BREAK) {
                self.flush(pending.take());
                pending = Some(PendingMarkdown {
                    start: index + 1,
                    lines: Vec::new(),
                    metadata: break_metadata(rest, index + 1)?,
                    explicit: true,
                });
                index += 1;
                continue;
            }

            if let Some((width, kind)) = cell_fence(line) {
                self.flush(pending.take());
                let close = lines[index + 1..]
                    .iter()
                    .position(|candidate| is_closing_fence(candidate, width))
                    .map(|offset| index + 1 + offset)
                    .ok_or_else(|| malformed(index + 1, "unclosed cell fence"))?;
                let (metadata, content) = cell_options(&lines[index + 1..close], index + 2)?;

                let mut cell = Cell::new(kind, content.join("\n"));
                cell.metadata = metadata;
                self.cells.push(cell);
                self.source_map.push(index);
                index = close + 1;
                continue;
            }

            pending
                .get_or_insert_with(|| PendingMarkdown {
                    start: index,
                    lines: Vec::new(),
                    metadata: Map::new(),
                    explicit: false,
                })
                .lines
                .push(line);
            index += 1;
        }

        self.flush(pending);
        Ok(())
    }

    fn flush(&mut self, pending: Option<PendingMarkdown<'_>>) {
        let Some(mut markdown) = pending else {
            return;
        };
        let leading = markdown
            .lines
            .iter()
            .take_while(|line| line.trim().is_empty())
            .count();
        markdown.lines.drain(..leading);
        while markdown.lines.last().is_some_and(|line| line.trim().is_empty()) {
            markdown.lines.pop();
        }
        if markdown.lines.is_empty() && !markdown.explicit {
            return;
        }

        let mut cell = Cell::markdown(markdown.lines.join("\n"));
        cell.metadata = markdown.metadata;
        self.cells.push(cell);
        self.source_map.push(markdown.start + leading);
    }
}

/// JSON metadata following a cell break marker.
fn break_metadata(rest: &str, line: usize) -> Result<Map<String, Value>, NotebookError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(rest) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(malformed(line, "cell metadata must be a JSON object")),
        Err(err) => Err(malformed(line, format!("invalid cell metadata: {err}"))),
    }
}

/// Backtick count and cell kind of a `{code-cell}` or `{raw-cell}` opening fence.
fn cell_fence(line: &str) -> Option<(usize, CellKind)> {
    let width = line.chars().take_while(|c| *c == '`').count();
    if width < 3 {
        return None;
    }
    let rest = line[width..].trim_start();
    if rest.starts_with("{code-cell}") {
        Some((width, CellKind::Code))
    } else if rest.starts_with("{raw-cell}") {
        Some((width, CellKind::Raw))
    } else {
        None
    }
}

fn is_closing_fence(line: &str, width: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= width && trimmed.chars().all(|c| c == '`')
}

/// Split a fence body into its option metadata and its content lines.
///
/// `first_line` is the 1-based line number of the body's first line.
fn cell_options<'a>(
    body: &[&'a str],
    first_line: usize,
) -> Result<(Map<String, Value>, Vec<&'a str>), NotebookError> {
    if body.first().map(|line| line.trim_end()) == Some("---") {
        let close = body
            .iter()
            .skip(1)
            .position(|line| line.trim_end() == "---")
            .map(|offset| offset + 1)
            .ok_or_else(|| malformed(first_line, "unterminated cell options block"))?;
        let yaml = body[1..close].join("\n");
        let metadata = if yaml.trim().is_empty() {
            Map::new()
        } else {
            match serde_yaml::from_str::<Value>(&yaml)? {
                Value::Object(map) => map,
                _ => return Err(malformed(first_line, "cell options are not a mapping")),
            }
        };
        return Ok((metadata, body[close + 1..].to_vec()));
    }

    let mut metadata = Map::new();
    let mut consumed = 0;
    for (offset, line) in body.iter().enumerate() {
        let Some(option) = line.strip_prefix(':') else {
            break;
        };
        let (key, value) = option
            .split_once(':')
            .ok_or_else(|| malformed(first_line + offset, "expected ':key: value'"))?;
        let value = value.trim();
        let value = if value.is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str::<Value>(value)?
        };
        metadata.insert(key.trim().to_string(), value);
        consumed = offset + 1;
    }

    let mut content = &body[consumed..];
    if consumed > 0 {
        while content.first().is_some_and(|line| line.trim().is_empty()) {
            content = &content[1..];
        }
    }
    Ok((metadata, content.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "---
kernelspec:
  display_name: Python 3
  language: python
  name: python3
---

# Deck

Intro text.

+++ {\"slideshow\": {\"slide_type\": \"slide\"}}

## Second

```{code-cell} python
:tags: [remove-input]

print(1)
```
";

    fn convert(source: &str) -> Result<Notebook, NotebookError> {
        TextNotebookConverter::new(ParserConfig::default()).convert(source)
    }

    #[test]
    fn splits_cells_and_records_source_map() {
        let nb = convert(SAMPLE).unwrap();
        let kinds: Vec<_> = nb.cells.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CellKind::Markdown, CellKind::Markdown, CellKind::Code]);

        assert_eq!(nb.cells[0].source, "# Deck\n\nIntro text.");
        assert_eq!(nb.cells[1].source, "## Second");
        assert_eq!(
            Value::Object(nb.cells[1].metadata.clone()),
            json!({"slideshow": {"slide_type": "slide"}})
        );
        assert_eq!(nb.cells[2].source, "print(1)");
        assert_eq!(nb.cells[2].tags(), vec!["remove-input"]);

        assert_eq!(nb.source_map(), Some(vec![7, 13, 15]));
        assert_eq!(nb.lexer_name().as_deref(), Some("python"));
    }

    #[test]
    fn yaml_option_block() {
        let nb = convert("```{code-cell}\n---\ntags: [a, b]\n---\nx = 1\n```\n").unwrap();
        assert_eq!(nb.cells[0].source, "x = 1");
        assert_eq!(nb.cells[0].tags(), vec!["a", "b"]);
    }

    #[test]
    fn raw_cells_and_empty_breaks() {
        let nb = convert("+++\n\n```{raw-cell}\n<b>raw</b>\n```\n").unwrap();
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.cells[0].source, "");
        assert_eq!(nb.cells[1].kind, CellKind::Raw);
    }

    #[test]
    fn errors_carry_line_numbers() {
        match convert("text\n+++ {broken\n") {
            Err(NotebookError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
        match convert("```{code-cell}\nx\n") {
            Err(NotebookError::Malformed { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(convert("---\nkernelspec: {}\n").is_err());
    }

    #[test]
    fn accepts_needs_kernelspec_front_matter() {
        let converter = TextNotebookConverter::new(ParserConfig::default());
        let lines: Vec<&str> = SAMPLE.lines().collect();
        assert!(converter.accepts(Path::new("deck.md"), &lines));
        assert!(!converter.accepts(Path::new("deck.txt"), &lines));
        assert!(!converter.accepts(Path::new("deck.md"), &["---", "title: x", "---"]));
    }
}
