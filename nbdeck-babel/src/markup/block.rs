//! Block phase
//!
//!     Turns the source of one markdown cell into block tokens. Inline content is left as
//!     raw text in `Inline` tokens; link and footnote definitions go into the shared
//!     [`ReferenceEnv`] instead of the token stream.
//!
//!     This is a deliberately small grammar: ATX and setext headings, paragraphs, fenced and
//!     indented code, `$$` math, block quotes, bullet and ordered lists, thematic breaks,
//!     HTML blocks, link reference definitions and footnote definitions. Line ranges are
//!     cell-local and 0-based; the converter shifts them into document coordinates.
//!
//!     Containers recurse: a block quote or list item strips its prefix from each line and
//!     parses the remainder with the line offset of its first line, so every produced token
//!     keeps an exact line range.

use super::env::{LinkDefinition, ReferenceEnv};
use super::token::{BlockKind, BlockToken};
use super::ParserConfig;
use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {0,3})(`{3,}|~{3,})[ \t]*(.*?)[ \t]*$").expect("valid regex"));
static THEMATIC_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}(?:(?:\*[ \t]*){3,}|(?:-[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("valid regex")
});
static SETEXT_UNDERLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(=+|-+)[ \t]*$").expect("valid regex"));
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {0,3})([-+*])( *)(.*)$").expect("valid regex"));
static ORDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {0,3})(\d{1,9})([.)])( *)(.*)$").expect("valid regex"));
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}> ?(.*)$").expect("valid regex"));
static REFERENCE_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^ {0,3}\[([^\]\^][^\]]*)\]:[ \t]*(<[^>]*>|\S+)(?:[ \t]+("[^"]*"|'[^']*'|\([^)]*\)))?[ \t]*$"#,
    )
    .expect("valid regex")
});
static FOOTNOTE_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}\[\^([^\]\s]+)\]:[ \t]?(.*)$").expect("valid regex"));
static HTML_BLOCK_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}<(?:[A-Za-z][A-Za-z0-9-]*(?:[\s/>]|$)|/[A-Za-z][A-Za-z0-9-]*\s*>|!--|\?|![A-Za-z])")
        .expect("valid regex")
});

/// A list item marker found at the start of a line.
#[derive(Debug, Clone)]
struct ListMarker {
    ordered: bool,
    /// Bullet character, or the delimiter of an ordered marker
    symbol: char,
    start: u64,
    markup: String,
    content_indent: usize,
    rest: String,
}

impl ListMarker {
    fn continues(&self, other: &ListMarker) -> bool {
        self.ordered == other.ordered && self.symbol == other.symbol
    }
}

pub struct BlockParser<'a> {
    config: &'a ParserConfig,
}

impl<'a> BlockParser<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self { config }
    }

    /// Parse `source` into block tokens with cell-local line ranges.
    pub fn parse(&self, source: &str, env: &mut ReferenceEnv) -> Vec<BlockToken> {
        let lines: Vec<String> = source.lines().map(expand_leading_tabs).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut out = Vec::new();
        self.parse_lines(&refs, 0, 0, env, &mut out);
        out
    }

    fn parse_lines(
        &self,
        lines: &[&str],
        first: usize,
        level: usize,
        env: &mut ReferenceEnv,
        out: &mut Vec<BlockToken>,
    ) {
        let mut i = 0;
        while i < lines.len() {
            if is_blank(lines[i]) {
                i += 1;
                continue;
            }

            let next = self
                .fence(lines, i, first, level, out)
                .or_else(|| self.math_block(lines, i, first, level, out))
                .or_else(|| indented_code(lines, i, first, level, out))
                .or_else(|| atx_heading_block(lines, i, first, level, out))
                .or_else(|| thematic_break(lines, i, first, level, out))
                .or_else(|| self.blockquote(lines, i, first, level, env, out))
                .or_else(|| self.list(lines, i, first, level, env, out))
                .or_else(|| self.footnote_definition(lines, i, first, level, env, out))
                .or_else(|| reference_definition(lines, i, first, env))
                .or_else(|| self.html_block(lines, i, first, level, out))
                .unwrap_or_else(|| self.paragraph(lines, i, first, level, out));
            i = next;
        }
    }

    fn fence(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        out: &mut Vec<BlockToken>,
    ) -> Option<usize> {
        let caps = FENCE_OPEN.captures(lines[i])?;
        let indent = caps[1].len();
        let marker = caps[2].to_string();
        let info = caps[3].to_string();
        if marker.starts_with('`') && info.contains('`') {
            return None;
        }
        let symbol = marker.chars().next()?;

        let mut content = String::new();
        let mut j = i + 1;
        let mut closed = false;
        while j < lines.len() {
            if is_closing_fence(lines[j], symbol, marker.len()) {
                closed = true;
                break;
            }
            content.push_str(strip_indent(lines[j], indent));
            content.push('\n');
            j += 1;
        }
        let end = if closed { j + 1 } else { j };

        out.push(
            BlockToken::leaf(BlockKind::Fence, level)
                .with_map(first + i, first + end)
                .with_content(content)
                .with_info(info)
                .with_markup(marker),
        );
        Some(end)
    }

    fn math_block(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        out: &mut Vec<BlockToken>,
    ) -> Option<usize> {
        if !self.config.dollarmath || indent_of(lines[i]) > 3 {
            return None;
        }
        let rest = lines[i].trim().strip_prefix("$$")?;

        if let Some(inner) = rest.strip_suffix("$$") {
            out.push(
                BlockToken::leaf(BlockKind::MathBlock, level)
                    .with_map(first + i, first + i + 1)
                    .with_content(inner.trim())
                    .with_markup("$$"),
            );
            return Some(i + 1);
        }

        let mut body = vec![rest.trim().to_string()];
        let mut j = i + 1;
        let mut end = lines.len();
        while j < lines.len() {
            let line = lines[j].trim_end();
            if let Some(last) = line.strip_suffix("$$") {
                body.push(last.to_string());
                end = j + 1;
                break;
            }
            body.push(line.to_string());
            j += 1;
        }
        let content = body.join("\n").trim_matches('\n').to_string();
        out.push(
            BlockToken::leaf(BlockKind::MathBlock, level)
                .with_map(first + i, first + end)
                .with_content(content)
                .with_markup("$$"),
        );
        Some(end)
    }

    fn blockquote(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        env: &mut ReferenceEnv,
        out: &mut Vec<BlockToken>,
    ) -> Option<usize> {
        let caps = BLOCKQUOTE.captures(lines[i])?;
        let mut inner = vec![caps[1].to_string()];
        let mut j = i + 1;
        while j < lines.len() {
            if let Some(caps) = BLOCKQUOTE.captures(lines[j]) {
                inner.push(caps[1].to_string());
            } else if !is_blank(lines[j])
                && inner.last().is_some_and(|l| !is_blank(l))
                && !self.starts_block(lines[j])
            {
                // lazy continuation of a quoted paragraph
                inner.push(lines[j].trim_start().to_string());
            } else {
                break;
            }
            j += 1;
        }

        out.push(
            BlockToken::open(BlockKind::Blockquote, level)
                .with_map(first + i, first + j)
                .with_markup(">"),
        );
        let refs: Vec<&str> = inner.iter().map(String::as_str).collect();
        self.parse_lines(&refs, first + i, level + 1, env, out);
        out.push(BlockToken::close(BlockKind::Blockquote, level).with_markup(">"));
        Some(j)
    }

    fn list(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        env: &mut ReferenceEnv,
        out: &mut Vec<BlockToken>,
    ) -> Option<usize> {
        let first_marker = list_marker(lines[i])?;
        let mut items: Vec<(usize, usize, ListMarker, Vec<String>)> = Vec::new();
        let mut tight = true;
        let mut j = i;

        loop {
            let Some(marker) = list_marker(lines[j]) else {
                break;
            };
            let item_start = j;
            let mut item_lines = vec![marker.rest.clone()];
            let mut previous_blank = false;
            j += 1;
            while j < lines.len() {
                let line = lines[j];
                if is_blank(line) {
                    item_lines.push(String::new());
                    previous_blank = true;
                } else if indent_of(line) >= marker.content_indent {
                    item_lines.push(strip_indent(line, marker.content_indent).to_string());
                    previous_blank = false;
                } else if !previous_blank && !self.starts_block(line) {
                    item_lines.push(line.trim_start().to_string());
                } else {
                    break;
                }
                j += 1;
            }

            let mut trailing_blanks = 0;
            while item_lines.len() > 1 && item_lines.last().is_some_and(|l| is_blank(l)) {
                item_lines.pop();
                trailing_blanks += 1;
            }
            if item_lines.iter().any(|l| is_blank(l)) {
                tight = false;
            }
            items.push((item_start, j - trailing_blanks, marker, item_lines));

            let continues = j < lines.len()
                && list_marker(lines[j]).is_some_and(|next| next.continues(&first_marker));
            if !continues {
                break;
            }
            if trailing_blanks > 0 {
                tight = false;
            }
        }

        let list_end = items.last().map(|(_, end, _, _)| *end).unwrap_or(i + 1);
        let kind = if first_marker.ordered {
            BlockKind::OrderedList {
                start: first_marker.start,
            }
        } else {
            BlockKind::BulletList
        };
        let markup = first_marker.symbol.to_string();

        out.push(
            BlockToken::open(kind.clone(), level)
                .with_map(first + i, first + list_end)
                .with_markup(markup.clone()),
        );
        for (start, end, marker, item_lines) in items {
            out.push(
                BlockToken::open(BlockKind::ListItem, level + 1)
                    .with_map(first + start, first + end)
                    .with_markup(marker.markup.clone()),
            );
            let refs: Vec<&str> = item_lines.iter().map(String::as_str).collect();
            let mut inner = Vec::new();
            self.parse_lines(&refs, first + start, level + 2, env, &mut inner);
            if tight {
                for token in inner.iter_mut() {
                    if token.kind == BlockKind::Paragraph && token.level == level + 2 {
                        token.hidden = true;
                    }
                }
            }
            out.extend(inner);
            out.push(
                BlockToken::close(BlockKind::ListItem, level + 1).with_markup(marker.markup),
            );
        }
        out.push(BlockToken::close(kind, level).with_markup(markup));
        Some(list_end)
    }

    fn footnote_definition(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        env: &mut ReferenceEnv,
        out: &mut Vec<BlockToken>,
    ) -> Option<usize> {
        if !self.config.footnotes {
            return None;
        }
        let caps = FOOTNOTE_DEFINITION.captures(lines[i])?;
        let label = caps[1].to_string();
        let mut body = vec![caps[2].to_string()];
        let mut j = i + 1;
        while j < lines.len() {
            let line = lines[j];
            if is_blank(line) {
                body.push(String::new());
            } else if indent_of(line) >= 4 {
                body.push(strip_indent(line, 4).to_string());
            } else if body.last().is_some_and(|l| !is_blank(l))
                && !self.starts_block(line)
                && !FOOTNOTE_DEFINITION.is_match(line)
            {
                body.push(line.trim_start().to_string());
            } else {
                break;
            }
            j += 1;
        }
        while body.len() > 1 && body.last().is_some_and(|l| is_blank(l)) {
            body.pop();
            j -= 1;
        }

        env.define_footnote(&label, Some([first + i, first + j]));
        let kind = BlockKind::FootnoteReference { label };
        out.push(BlockToken::open(kind.clone(), level).with_map(first + i, first + j));
        let refs: Vec<&str> = body.iter().map(String::as_str).collect();
        self.parse_lines(&refs, first + i, level + 1, env, out);
        out.push(BlockToken::close(kind, level));
        Some(j)
    }

    fn html_block(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        out: &mut Vec<BlockToken>,
    ) -> Option<usize> {
        if !self.config.html || !HTML_BLOCK_START.is_match(lines[i]) {
            return None;
        }
        let comment = lines[i].trim_start().starts_with("<!--");
        let mut j = i;
        let mut body = Vec::new();
        while j < lines.len() {
            if comment {
                body.push(lines[j]);
                j += 1;
                if lines[j - 1].contains("-->") {
                    break;
                }
            } else {
                if is_blank(lines[j]) {
                    break;
                }
                body.push(lines[j]);
                j += 1;
            }
        }

        let mut content = body.join("\n");
        content.push('\n');
        out.push(
            BlockToken::leaf(BlockKind::HtmlBlock, level)
                .with_map(first + i, first + j)
                .with_content(content),
        );
        Some(j)
    }

    fn paragraph(
        &self,
        lines: &[&str],
        i: usize,
        first: usize,
        level: usize,
        out: &mut Vec<BlockToken>,
    ) -> usize {
        let mut text = vec![lines[i].trim_start()];
        let mut j = i + 1;
        while j < lines.len() {
            let line = lines[j];
            if is_blank(line) {
                break;
            }
            if let Some(caps) = SETEXT_UNDERLINE.captures(line) {
                let heading_level = if caps[1].starts_with('=') { 1 } else { 2 };
                let content = text.join("\n").trim().to_string();
                push_heading(out, heading_level, content, first + i, first + j + 1, level);
                return j + 1;
            }
            if self.interrupts_paragraph(line) {
                break;
            }
            text.push(line.trim_start());
            j += 1;
        }

        let content = text.join("\n").trim_end().to_string();
        out.push(BlockToken::open(BlockKind::Paragraph, level).with_map(first + i, first + j));
        out.push(
            BlockToken::leaf(BlockKind::Inline, level + 1)
                .with_map(first + i, first + j)
                .with_content(content),
        );
        out.push(BlockToken::close(BlockKind::Paragraph, level));
        j
    }

    /// Lines that end a paragraph without a blank line in between.
    fn interrupts_paragraph(&self, line: &str) -> bool {
        if atx_heading(line).is_some()
            || FENCE_OPEN.is_match(line)
            || THEMATIC_BREAK.is_match(line)
            || BLOCKQUOTE.is_match(line)
        {
            return true;
        }
        if self.config.html && HTML_BLOCK_START.is_match(line) {
            return true;
        }
        if self.config.dollarmath && indent_of(line) < 4 && line.trim_start().starts_with("$$") {
            return true;
        }
        match list_marker(line) {
            Some(marker) => {
                !marker.rest.trim().is_empty() && (!marker.ordered || marker.start == 1)
            }
            None => false,
        }
    }

    /// Lines that cannot be lazy continuation text.
    fn starts_block(&self, line: &str) -> bool {
        self.interrupts_paragraph(line) || list_marker(line).is_some()
    }
}

fn indented_code(
    lines: &[&str],
    i: usize,
    first: usize,
    level: usize,
    out: &mut Vec<BlockToken>,
) -> Option<usize> {
    if indent_of(lines[i]) < 4 {
        return None;
    }
    let mut j = i;
    while j < lines.len() && (is_blank(lines[j]) || indent_of(lines[j]) >= 4) {
        j += 1;
    }
    while j > i && is_blank(lines[j - 1]) {
        j -= 1;
    }
    let mut content = String::new();
    for line in &lines[i..j] {
        content.push_str(strip_indent(line, 4));
        content.push('\n');
    }
    out.push(
        BlockToken::leaf(BlockKind::CodeBlock, level)
            .with_map(first + i, first + j)
            .with_content(content),
    );
    Some(j)
}

fn atx_heading_block(
    lines: &[&str],
    i: usize,
    first: usize,
    level: usize,
    out: &mut Vec<BlockToken>,
) -> Option<usize> {
    let (heading_level, content) = atx_heading(lines[i])?;
    push_heading(out, heading_level, content, first + i, first + i + 1, level);
    Some(i + 1)
}

fn push_heading(
    out: &mut Vec<BlockToken>,
    heading_level: u8,
    content: String,
    start: usize,
    end: usize,
    level: usize,
) {
    let kind = BlockKind::Heading {
        level: heading_level,
    };
    let markup = "#".repeat(heading_level as usize);
    out.push(
        BlockToken::open(kind.clone(), level)
            .with_map(start, end)
            .with_markup(markup.clone()),
    );
    out.push(
        BlockToken::leaf(BlockKind::Inline, level + 1)
            .with_map(start, end)
            .with_content(content),
    );
    out.push(BlockToken::close(kind, level).with_markup(markup));
}

fn thematic_break(
    lines: &[&str],
    i: usize,
    first: usize,
    level: usize,
    out: &mut Vec<BlockToken>,
) -> Option<usize> {
    if !THEMATIC_BREAK.is_match(lines[i]) {
        return None;
    }
    let markup: String = lines[i].trim().chars().filter(|c| !c.is_whitespace()).collect();
    out.push(
        BlockToken::leaf(BlockKind::Hr, level)
            .with_map(first + i, first + i + 1)
            .with_markup(markup),
    );
    Some(i + 1)
}

fn reference_definition(
    lines: &[&str],
    i: usize,
    first: usize,
    env: &mut ReferenceEnv,
) -> Option<usize> {
    let caps = REFERENCE_DEFINITION.captures(lines[i])?;
    let label = caps[1].to_string();
    let raw_href = &caps[2];
    let href = raw_href
        .strip_prefix('<')
        .and_then(|h| h.strip_suffix('>'))
        .unwrap_or(raw_href)
        .to_string();
    let title = caps
        .get(3)
        .map(|t| t.as_str())
        .map(|t| t[1..t.len() - 1].to_string());

    if !env.define_reference(&label, LinkDefinition { href, title }, [first + i, first + i + 1]) {
        tracing::debug!(label = %label, line = first + i, "ignoring repeated reference definition");
    }
    Some(i + 1)
}

/// Level and text of an ATX heading line.
fn atx_heading(line: &str) -> Option<(u8, String)> {
    if indent_of(line) > 3 {
        return None;
    }
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let mut text = rest.trim();
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() {
        text = "";
    } else if without_closing.ends_with([' ', '\t']) {
        text = without_closing.trim_end();
    }
    Some((hashes as u8, text.to_string()))
}

fn list_marker(line: &str) -> Option<ListMarker> {
    if let Some(caps) = BULLET.captures(line) {
        if THEMATIC_BREAK.is_match(line) {
            return None;
        }
        let spaces = caps[3].len();
        let rest = caps[4].to_string();
        if spaces == 0 && !rest.is_empty() {
            return None;
        }
        let symbol = caps[2].chars().next()?;
        return Some(marker_from_parts(
            false,
            symbol,
            1,
            caps[2].to_string(),
            caps[1].len(),
            spaces,
            rest,
        ));
    }
    let caps = ORDERED.captures(line)?;
    let spaces = caps[4].len();
    let rest = caps[5].to_string();
    if spaces == 0 && !rest.is_empty() {
        return None;
    }
    let start = caps[2].parse().ok()?;
    let symbol = caps[3].chars().next()?;
    let markup = format!("{}{}", &caps[2], &caps[3]);
    Some(marker_from_parts(
        true,
        symbol,
        start,
        markup,
        caps[1].len(),
        spaces,
        rest,
    ))
}

fn marker_from_parts(
    ordered: bool,
    symbol: char,
    start: u64,
    markup: String,
    indent: usize,
    spaces: usize,
    rest: String,
) -> ListMarker {
    let width = indent + markup.len();
    // more than four spaces after the marker start an indented code block
    let (content_indent, rest) = if rest.is_empty() {
        (width + 1, rest)
    } else if spaces > 4 {
        (width + 1, format!("{}{}", " ".repeat(spaces - 1), rest))
    } else {
        (width + spaces, rest)
    };
    ListMarker {
        ordered,
        symbol,
        start,
        markup,
        content_indent,
        rest,
    }
}

fn is_closing_fence(line: &str, symbol: char, min_len: usize) -> bool {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return false;
    }
    let run = trimmed.chars().take_while(|c| *c == symbol).count();
    run >= min_len && trimmed[run..].trim().is_empty()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn strip_indent(line: &str, width: usize) -> &str {
    let available = indent_of(line).min(width);
    &line[available..]
}

fn expand_leading_tabs(line: &str) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let prefix = &line[..line.len() - body.len()];
    if !prefix.contains('\t') {
        return line.to_string();
    }
    let mut expanded = String::new();
    for ch in prefix.chars() {
        if ch == '\t' {
            let pad = 4 - expanded.len() % 4;
            expanded.push_str(&" ".repeat(pad));
        } else {
            expanded.push(ch);
        }
    }
    expanded.push_str(body);
    expanded
}
