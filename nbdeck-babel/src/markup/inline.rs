//! Inline phase
//!
//!     Runs once per document, after every cell went through the block phase, so reference
//!     links and footnote references resolve against definitions from any cell.
//!
//!     Scanning produces a flat list of inline pieces and emphasis delimiter runs; emphasis
//!     is then resolved with the usual delimiter matching (flanking rules plus the rule of
//!     three) and the pieces collapse into [`Inline`] trees.

use super::env::ReferenceEnv;
use super::token::{plain_text, BlockKind, Inline, Token};
use super::ParserConfig;
use once_cell::sync::Lazy;
use regex::Regex;

static AUTOLINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<([A-Za-z][A-Za-z0-9.+-]{1,31}:[^<>\s]*)>").expect("valid regex")
});
static EMAIL_AUTOLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([^\s<>@]+@[^\s<>@]+\.[^\s<>@]+)>").expect("valid regex"));
static INLINE_HTML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:<!--[\s\S]*?-->|</?[A-Za-z][A-Za-z0-9-]*(?:\s+[A-Za-z_:][\w.:-]*(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*\s*/?>)"#)
        .expect("valid regex")
});

/// Fill the children of every pending `Inline` token in order.
pub fn run_inline_phase(tokens: &mut [Token], env: &mut ReferenceEnv, config: &ParserConfig) {
    for token in tokens.iter_mut() {
        if let Token::Markdown(block) = token {
            if block.kind == BlockKind::Inline && block.children.is_none() {
                block.children = Some(parse_inline(&block.content, env, config));
            }
        }
    }
}

/// Parse one run of inline text.
pub fn parse_inline(source: &str, env: &mut ReferenceEnv, config: &ParserConfig) -> Vec<Inline> {
    let mut scanner = Scanner {
        chars: source.chars().collect(),
        pos: 0,
        text: String::new(),
        pieces: Vec::new(),
        env,
        config,
    };
    scanner.run();
    resolve_emphasis(scanner.pieces)
}

#[derive(Debug)]
enum Piece {
    Inline(Inline),
    Delim {
        ch: char,
        count: usize,
        /// Length of the run before any of it was used
        orig: usize,
        can_open: bool,
        can_close: bool,
    },
}

type LinkTarget = (String, Option<String>, usize);

struct Scanner<'s> {
    chars: Vec<char>,
    pos: usize,
    text: String,
    pieces: Vec<Piece>,
    env: &'s mut ReferenceEnv,
    config: &'s ParserConfig,
}

impl Scanner<'_> {
    fn run(&mut self) {
        while let Some(ch) = self.peek(0) {
            let consumed = match ch {
                '\\' => {
                    self.escape();
                    true
                }
                '`' => {
                    self.code_span();
                    true
                }
                '*' | '_' => {
                    self.delimiter_run(ch);
                    true
                }
                '!' if self.peek(1) == Some('[') => self.image(),
                '[' => self.bracket(),
                '<' => self.angle(),
                '$' if self.config.dollarmath => self.math(),
                '\n' => {
                    self.line_break(false);
                    true
                }
                _ => false,
            };
            if !consumed {
                self.text.push(ch);
                self.pos += 1;
            }
        }
        self.flush_text();
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.pieces.push(Piece::Inline(Inline::Text(text)));
        }
    }

    fn push(&mut self, inline: Inline) {
        self.flush_text();
        self.pieces.push(Piece::Inline(inline));
    }

    fn escape(&mut self) {
        match self.peek(1) {
            Some('\n') => {
                self.pos += 1;
                self.line_break(true);
            }
            Some(c) if c.is_ascii_punctuation() => {
                self.text.push(c);
                self.pos += 2;
            }
            _ => {
                self.text.push('\\');
                self.pos += 1;
            }
        }
    }

    fn line_break(&mut self, forced: bool) {
        let kept = self.text.trim_end_matches(' ').len();
        let trailing = self.text.len() - kept;
        self.text.truncate(kept);
        let inline = if forced || trailing >= 2 {
            Inline::HardBreak
        } else {
            Inline::SoftBreak
        };
        self.push(inline);
        self.pos += 1;
        while self.peek(0) == Some(' ') {
            self.pos += 1;
        }
    }

    fn code_span(&mut self) {
        let start = self.pos;
        let run = self.run_length(start, '`');
        let mut i = start + run;
        while i < self.chars.len() {
            if self.chars[i] == '`' {
                let closing = self.run_length(i, '`');
                if closing == run {
                    let raw: String = self.chars[start + run..i].iter().collect();
                    let mut content = raw.replace('\n', " ");
                    if content.len() >= 2
                        && content.starts_with(' ')
                        && content.ends_with(' ')
                        && !content.trim().is_empty()
                    {
                        content = content[1..content.len() - 1].to_string();
                    }
                    self.push(Inline::Code(content));
                    self.pos = i + run;
                    return;
                }
                i += closing;
            } else {
                i += 1;
            }
        }
        self.text.push_str(&"`".repeat(run));
        self.pos = start + run;
    }

    fn run_length(&self, from: usize, ch: char) -> usize {
        self.chars[from..].iter().take_while(|c| **c == ch).count()
    }

    fn delimiter_run(&mut self, ch: char) {
        let start = self.pos;
        let count = self.run_length(start, ch);
        let before = start.checked_sub(1).map(|i| self.chars[i]);
        let after = self.chars.get(start + count).copied();
        let (left, right) = flanking(before, after);
        let (can_open, can_close) = if ch == '*' {
            (left, right)
        } else {
            (
                left && (!right || before.is_some_and(|c| c.is_ascii_punctuation())),
                right && (!left || after.is_some_and(|c| c.is_ascii_punctuation())),
            )
        };
        self.flush_text();
        self.pieces.push(Piece::Delim {
            ch,
            count,
            orig: count,
            can_open,
            can_close,
        });
        self.pos = start + count;
    }

    fn bracket(&mut self) -> bool {
        let open = self.pos;
        let Some(close) = self.matching_bracket(open) else {
            return false;
        };
        let label: String = self.chars[open + 1..close].iter().collect();

        if self.config.footnotes {
            if let Some(name) = label.strip_prefix('^') {
                if !name.is_empty()
                    && !name.contains(char::is_whitespace)
                    && self.env.has_footnote(name)
                {
                    let id = self.env.footnote_id(name);
                    self.push(Inline::FootnoteRef {
                        id,
                        label: name.to_string(),
                    });
                    self.pos = close + 1;
                    return true;
                }
            }
        }

        let Some((href, title, end)) = self.link_target(close, &label) else {
            return false;
        };
        let children = parse_inline(&label, self.env, self.config);
        self.push(Inline::Link {
            href,
            title,
            children,
        });
        self.pos = end;
        true
    }

    fn image(&mut self) -> bool {
        let open = self.pos + 1;
        let Some(close) = self.matching_bracket(open) else {
            return false;
        };
        let label: String = self.chars[open + 1..close].iter().collect();
        let Some((src, title, end)) = self.link_target(close, &label) else {
            return false;
        };
        let alt = plain_text(&parse_inline(&label, self.env, self.config));
        self.push(Inline::Image { src, alt, title });
        self.pos = end;
        true
    }

    /// Destination following a closing bracket: inline, full, collapsed or shortcut.
    fn link_target(&self, close: usize, label: &str) -> Option<LinkTarget> {
        let after = close + 1;
        match self.chars.get(after) {
            Some('(') => {
                if let Some(target) = self.inline_destination(after + 1) {
                    return Some(target);
                }
            }
            Some('[') => {
                if let Some(end) = self.matching_bracket(after) {
                    let reference: String = self.chars[after + 1..end].iter().collect();
                    let key = if reference.trim().is_empty() {
                        label
                    } else {
                        reference.as_str()
                    };
                    return self
                        .env
                        .lookup_reference(key)
                        .map(|def| (def.href.clone(), def.title.clone(), end + 1));
                }
            }
            _ => {}
        }
        self.env
            .lookup_reference(label)
            .map(|def| (def.href.clone(), def.title.clone(), close + 1))
    }

    fn inline_destination(&self, start: usize) -> Option<LinkTarget> {
        let chars = &self.chars;
        let mut i = skip_whitespace(chars, start);
        let mut href = String::new();

        if chars.get(i) == Some(&'<') {
            i += 1;
            loop {
                match chars.get(i) {
                    Some('>') => break,
                    Some('\n') | Some('<') | None => return None,
                    Some(&c) => href.push(c),
                }
                i += 1;
            }
            i += 1;
        } else {
            let mut depth = 0usize;
            while let Some(&c) = chars.get(i) {
                if c.is_whitespace() || c.is_control() {
                    break;
                }
                if c == '\\' && chars.get(i + 1).is_some_and(|n| n.is_ascii_punctuation()) {
                    href.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if c == '(' {
                    depth += 1;
                } else if c == ')' {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                href.push(c);
                i += 1;
            }
        }

        let before_title = i;
        i = skip_whitespace(chars, i);
        let mut title = None;
        if i > before_title {
            let closing = match chars.get(i) {
                Some('"') => Some('"'),
                Some('\'') => Some('\''),
                Some('(') => Some(')'),
                _ => None,
            };
            if let Some(closing) = closing {
                let mut j = i + 1;
                let mut text = String::new();
                while let Some(&c) = chars.get(j) {
                    if c == closing {
                        break;
                    }
                    if c == '\\' && chars.get(j + 1).is_some_and(|n| n.is_ascii_punctuation()) {
                        text.push(chars[j + 1]);
                        j += 2;
                        continue;
                    }
                    text.push(c);
                    j += 1;
                }
                if chars.get(j) != Some(&closing) {
                    return None;
                }
                title = Some(text);
                i = skip_whitespace(chars, j + 1);
            }
        }

        (chars.get(i) == Some(&')')).then(|| (href, title, i + 1))
    }

    fn matching_bracket(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = open;
        while i < self.chars.len() {
            match self.chars[i] {
                '\\' => {
                    i += 2;
                    continue;
                }
                '[' => depth += 1,
                ']' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn angle(&mut self) -> bool {
        let rest: String = self.chars[self.pos..].iter().collect();
        if let Some(caps) = AUTOLINK.captures(&rest) {
            let url = caps[1].to_string();
            let width = caps[0].chars().count();
            self.push(Inline::Link {
                href: url.clone(),
                title: None,
                children: vec![Inline::Text(url)],
            });
            self.pos += width;
            return true;
        }
        if let Some(caps) = EMAIL_AUTOLINK.captures(&rest) {
            let address = caps[1].to_string();
            let width = caps[0].chars().count();
            self.push(Inline::Link {
                href: format!("mailto:{address}"),
                title: None,
                children: vec![Inline::Text(address)],
            });
            self.pos += width;
            return true;
        }
        if self.config.html {
            if let Some(found) = INLINE_HTML.find(&rest) {
                let tag = found.as_str().to_string();
                self.pos += tag.chars().count();
                self.push(Inline::Html(tag));
                return true;
            }
        }
        false
    }

    fn math(&mut self) -> bool {
        if self.peek(1) == Some('$') {
            let start = self.pos + 2;
            let end = (start..self.chars.len().saturating_sub(1))
                .find(|&i| self.chars[i] == '$' && self.chars[i + 1] == '$');
            if let Some(end) = end {
                let content: String = self.chars[start..end].iter().collect();
                if !content.trim().is_empty() {
                    self.push(Inline::Math(content.trim().to_string()));
                    self.pos = end + 2;
                    return true;
                }
            }
            self.text.push_str("$$");
            self.pos += 2;
            return true;
        }

        if self.peek(1).map_or(true, char::is_whitespace) {
            return false;
        }
        let mut i = self.pos + 1;
        while i < self.chars.len() {
            match self.chars[i] {
                '\\' => {
                    i += 2;
                    continue;
                }
                '$' => {
                    let closes = !self.chars[i - 1].is_whitespace()
                        && !self.chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
                    if closes {
                        let content: String = self.chars[self.pos + 1..i].iter().collect();
                        self.push(Inline::Math(content));
                        self.pos = i + 1;
                        return true;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        false
    }
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    i
}

/// Left- and right-flanking for a delimiter run between `before` and `after`.
fn flanking(before: Option<char>, after: Option<char>) -> (bool, bool) {
    let before_space = before.map_or(true, char::is_whitespace);
    let after_space = after.map_or(true, char::is_whitespace);
    let before_punct = before.is_some_and(|c| c.is_ascii_punctuation());
    let after_punct = after.is_some_and(|c| c.is_ascii_punctuation());
    let left = !after_space && (!after_punct || before_space || before_punct);
    let right = !before_space && (!before_punct || after_space || after_punct);
    (left, right)
}

fn breaks_rule_of_three(either_side_both: bool, opener: usize, closer: usize) -> bool {
    either_side_both && (opener + closer) % 3 == 0 && !(opener % 3 == 0 && closer % 3 == 0)
}

fn resolve_emphasis(mut pieces: Vec<Piece>) -> Vec<Inline> {
    let mut closer = 0;
    while closer < pieces.len() {
        let (ch, closer_count, closer_orig, closer_opens) = match &pieces[closer] {
            Piece::Delim {
                ch,
                count,
                orig,
                can_open,
                can_close: true,
            } if *count > 0 => (*ch, *count, *orig, *can_open),
            _ => {
                closer += 1;
                continue;
            }
        };

        let opener = (0..closer).rev().find(|&o| match &pieces[o] {
            Piece::Delim {
                ch: open_ch,
                count,
                orig,
                can_open: true,
                can_close,
            } => {
                *open_ch == ch
                    && *count > 0
                    && !breaks_rule_of_three(*can_close || closer_opens, *orig, closer_orig)
            }
            _ => false,
        });
        let Some(opener) = opener else {
            closer += 1;
            continue;
        };

        let opener_count = match &pieces[opener] {
            Piece::Delim { count, .. } => *count,
            Piece::Inline(_) => 0,
        };
        let used = if opener_count >= 2 && closer_count >= 2 { 2 } else { 1 };
        let children = into_inlines(pieces.drain(opener + 1..closer).collect());
        let node = if used == 2 {
            Inline::Strong(children)
        } else {
            Inline::Emph(children)
        };
        consume(&mut pieces[opener], used);
        consume(&mut pieces[opener + 1], used);
        pieces.insert(opener + 1, Piece::Inline(node));
        closer = opener + 2;
    }
    into_inlines(pieces)
}

fn consume(piece: &mut Piece, used: usize) {
    if let Piece::Delim { count, .. } = piece {
        *count = count.saturating_sub(used);
    }
}

fn into_inlines(pieces: Vec<Piece>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    for piece in pieces {
        let inline = match piece {
            Piece::Inline(inline) => inline,
            Piece::Delim { count: 0, .. } => continue,
            Piece::Delim { ch, count, .. } => Inline::Text(ch.to_string().repeat(count)),
        };
        if let Inline::Text(text) = &inline {
            if let Some(Inline::Text(previous)) = out.last_mut() {
                previous.push_str(text);
                continue;
            }
        }
        out.push(inline);
    }
    out
}
