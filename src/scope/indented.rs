//! Indentation-based scope detection.
//!
//! Every physical line is classified once: indentation width, whether it
//! continues an earlier logical line (open bracket, triple-quoted string or
//! trailing backslash) and, for statement starts, which block header it is.
//! String contents and comments are blanked out of [`LineInfo::code`] so later
//! pattern matching only sees code.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use super::BlockScope;
use crate::types::ControlFlowKind;

lazy_static! {
    static ref DECORATOR: Regex = Regex::new(r"^@\s*([A-Za-z_][\w.]*)").unwrap();
}

/// What a block header opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// `def` / `async def`
    Callable,
    /// `class`
    Type,
    /// A control-flow construct.
    Control(ControlFlowKind),
    /// `else`, `except`, `finally`, `case`
    Other,
}

/// Innermost enclosing definition, skipping control-flow headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enclosing {
    Module,
    /// Header line of the enclosing `def`.
    Callable(usize),
    /// Header line of the enclosing `class`.
    Type(usize),
}

/// Classification of one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    /// Leading whitespace width (tabs advance to the next multiple of 8).
    pub indent: usize,
    /// No code on the line (empty, comment-only or inside a docstring).
    pub blank: bool,
    /// The line continues the logical line started above it.
    pub continuation: bool,
    /// Line text with string contents and comments blanked.
    pub code: String,
    /// Block header opened by this line, if it starts one.
    pub header: Option<HeaderKind>,
    /// First physical line of this logical line.
    pub logical_start: usize,
    /// Last physical line of this logical line.
    pub logical_end: usize,
    block_colon: bool,
}

/// Scope detector for indentation-delimited source. Positions are 0-indexed
/// line numbers.
#[derive(Debug, Clone)]
pub struct IndentedScope {
    lines: Vec<LineInfo>,
}

impl IndentedScope {
    pub fn new(source: &str) -> Self {
        let mut lines = classify_lines(source);
        link_logical_lines(&mut lines);
        for i in 0..lines.len() {
            if lines[i].continuation || lines[i].blank {
                continue;
            }
            let has_colon = lines[i..=lines[i].logical_end]
                .iter()
                .any(|l| l.block_colon);
            if has_colon {
                let kind = header_kind(&lines[i].code);
                lines[i].header = kind;
            }
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn header(&self, line: usize) -> Option<HeaderKind> {
        self.lines.get(line).and_then(|l| l.header)
    }

    /// Code of the logical line starting at `line`, joined onto one line.
    pub fn logical_code(&self, line: usize) -> String {
        let Some(info) = self.lines.get(line) else {
            return String::new();
        };
        self.lines[info.logical_start..=info.logical_end]
            .iter()
            .map(|l| l.code.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lines forming the body of the header at `header`: everything after
    /// the header's logical line up to the last line indented deeper than it.
    /// Empty for one-line compound statements.
    pub fn body_range(&self, header: usize) -> Range<usize> {
        let Some(info) = self.lines.get(header) else {
            return 0..0;
        };
        let start = info.logical_end + 1;
        let mut end = start;
        for k in start..self.lines.len() {
            let line = &self.lines[k];
            if line.blank || line.continuation {
                continue;
            }
            if line.indent <= info.indent {
                break;
            }
            end = line.logical_end + 1;
        }
        start..end
    }

    /// Nearest preceding header indented less than `line`'s statement.
    pub fn innermost_header(&self, line: usize) -> Option<usize> {
        let start = self.lines.get(line)?.logical_start;
        let mut threshold = self.lines[start].indent;
        for k in (0..start).rev() {
            // nothing sits shallower than column zero
            if threshold == 0 {
                break;
            }
            let candidate = &self.lines[k];
            if candidate.blank || candidate.continuation || candidate.indent >= threshold {
                continue;
            }
            if candidate.header.is_some() {
                return Some(k);
            }
            threshold = candidate.indent;
        }
        None
    }

    /// Innermost enclosing `def` or `class`; control-flow headers in between
    /// are transparent.
    pub fn enclosing(&self, line: usize) -> Enclosing {
        let mut current = self.innermost_header(line);
        while let Some(h) = current {
            match self.lines[h].header {
                Some(HeaderKind::Callable) => return Enclosing::Callable(h),
                Some(HeaderKind::Type) => return Enclosing::Type(h),
                _ => current = self.innermost_header(h),
            }
        }
        Enclosing::Module
    }

    /// Decorator names on the lines directly above `header`, at most
    /// `window` lines back, in source order.
    pub fn decorators(&self, header: usize, window: usize) -> Vec<String> {
        let mut found = Vec::new();
        let lower = header.saturating_sub(window);
        let mut k = header;
        while k > lower {
            k -= 1;
            let line = &self.lines[k];
            let code = line.code.trim_start();
            if let Some(caps) = DECORATOR.captures(code) {
                if !line.continuation {
                    found.push(caps[1].to_string());
                    continue;
                }
            }
            if line.blank || line.continuation {
                continue;
            }
            break;
        }
        found.reverse();
        found
    }

    fn first_header_at_or_after(&self, start: usize) -> Option<usize> {
        (start..self.lines.len()).find(|&k| !self.lines[k].continuation && self.lines[k].header.is_some())
    }
}

impl BlockScope for IndentedScope {
    type Pos = usize;

    fn block_end(&self, start: usize) -> Option<usize> {
        let header = self.first_header_at_or_after(start)?;
        let body = self.body_range(header);
        if body.is_empty() {
            Some(self.lines[header].logical_end)
        } else {
            Some(body.end - 1)
        }
    }

    fn is_within_callable(&self, pos: usize) -> bool {
        self.innermost_header(pos)
            .map(|h| self.lines[h].header == Some(HeaderKind::Callable))
            .unwrap_or(false)
    }

    fn is_within_type(&self, pos: usize) -> bool {
        self.innermost_header(pos)
            .map(|h| self.lines[h].header == Some(HeaderKind::Type))
            .unwrap_or(false)
    }
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / 8 + 1) * 8,
            _ => break,
        }
    }
    width
}

fn is_triple(chars: &[char], i: usize, quote: char) -> bool {
    chars.len() >= i + 3 && chars[i] == quote && chars[i + 1] == quote && chars[i + 2] == quote
}

/// First pass: per-line indentation, continuation state and blanked code.
fn classify_lines(source: &str) -> Vec<LineInfo> {
    let mut lines = Vec::new();
    let mut depth = 0usize;
    let mut triple: Option<char> = None;
    let mut backslash = false;

    for raw in source.lines() {
        let continuation = depth > 0 || triple.is_some() || backslash;
        backslash = false;

        let chars: Vec<char> = raw.chars().collect();
        let mut code = String::with_capacity(raw.len());
        let mut single: Option<char> = None;
        let mut block_colon = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = triple {
                if is_triple(&chars, i, q) {
                    triple = None;
                    code.extend([q, q, q]);
                    i += 3;
                } else {
                    let skip = if c == '\\' { 2 } else { 1 };
                    for _ in 0..skip.min(chars.len() - i) {
                        code.push(' ');
                    }
                    i += skip;
                }
                continue;
            }
            if let Some(q) = single {
                if c == '\\' {
                    for _ in 0..2.min(chars.len() - i) {
                        code.push(' ');
                    }
                    i += 2;
                    continue;
                }
                if c == q {
                    single = None;
                    code.push(c);
                } else {
                    code.push(' ');
                }
                i += 1;
                continue;
            }
            match c {
                '#' => break,
                '\'' | '"' if is_triple(&chars, i, c) => {
                    triple = Some(c);
                    code.extend([c, c, c]);
                    i += 3;
                    continue;
                }
                '\'' | '"' => single = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ':' if depth == 0 => block_colon = true,
                '\\' if i + 1 == chars.len() => backslash = true,
                _ => {}
            }
            code.push(c);
            i += 1;
        }

        lines.push(LineInfo {
            indent: indent_width(raw),
            blank: code.trim().is_empty(),
            continuation,
            code,
            header: None,
            logical_start: 0,
            logical_end: 0,
            block_colon,
        });
    }
    lines
}

fn link_logical_lines(lines: &mut [LineInfo]) {
    let mut i = 0;
    while i < lines.len() {
        let mut end = i;
        while end + 1 < lines.len() && lines[end + 1].continuation {
            end += 1;
        }
        for line in lines.iter_mut().take(end + 1).skip(i) {
            line.logical_start = i;
            line.logical_end = end;
        }
        i = end + 1;
    }
}

fn header_kind(code: &str) -> Option<HeaderKind> {
    let mut rest = code.trim_start();
    let mut word = leading_word(rest);
    if word == "async" {
        rest = rest[word.len()..].trim_start();
        word = leading_word(rest);
    }
    match word {
        "def" => Some(HeaderKind::Callable),
        "class" => Some(HeaderKind::Type),
        "if" | "elif" => Some(HeaderKind::Control(ControlFlowKind::If)),
        "for" => Some(HeaderKind::Control(ControlFlowKind::For)),
        "while" => Some(HeaderKind::Control(ControlFlowKind::While)),
        "try" => Some(HeaderKind::Control(ControlFlowKind::Try)),
        "with" => Some(HeaderKind::Control(ControlFlowKind::With)),
        "match" => Some(HeaderKind::Control(ControlFlowKind::Switch)),
        "else" | "except" | "finally" | "case" => Some(HeaderKind::Other),
        _ => None,
    }
}

fn leading_word(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
import os

class Repo(Base):
    table = \"repos\"

    def load(self, key):
        if key:
            value = self.fetch(key)
        return value

def helper():
    with open(p) as f:
        data = f.read()
    return data

x = 1
";

    #[test]
    fn test_headers_classified() {
        let scope = IndentedScope::new(SAMPLE);
        assert_eq!(scope.header(2), Some(HeaderKind::Type));
        assert_eq!(scope.header(5), Some(HeaderKind::Callable));
        assert_eq!(scope.header(6), Some(HeaderKind::Control(ControlFlowKind::If)));
        assert_eq!(scope.header(11), Some(HeaderKind::Control(ControlFlowKind::With)));
        assert_eq!(scope.header(3), None);
    }

    #[test]
    fn test_within_callable_follows_nearest_shallower_header() {
        let scope = IndentedScope::new(SAMPLE);

        // `return value` sits directly in `def load`
        assert!(scope.is_within_callable(8));
        // `value = ...` sits under `if key:`, a non-callable header
        assert!(!scope.is_within_callable(7));
        // class attribute
        assert!(!scope.is_within_callable(3));
        assert!(scope.is_within_type(3));
        // `return data` after the `with` block
        assert!(scope.is_within_callable(13));
        // module level
        assert!(!scope.is_within_callable(15));
        assert!(!scope.is_within_type(15));
    }

    #[test]
    fn test_top_level_lines_have_no_header() {
        let mut src = String::from("def first():\n    pass\n");
        for i in 0..2000 {
            src.push_str(&format!("value_{i} = {i}\n"));
        }
        src.push_str("class Last:\n    x = 1\n");
        let scope = IndentedScope::new(&src);
        let last = scope.lines().len() - 1;

        assert_eq!(scope.innermost_header(1), Some(0));
        assert_eq!(scope.innermost_header(last - 1), None);
        assert_eq!(scope.innermost_header(last), Some(last - 1));
    }

    #[test]
    fn test_enclosing_skips_control_headers() {
        let scope = IndentedScope::new(SAMPLE);
        assert_eq!(scope.enclosing(7), Enclosing::Callable(5));
        assert_eq!(scope.enclosing(5), Enclosing::Type(2));
        assert_eq!(scope.enclosing(12), Enclosing::Callable(10));
        assert_eq!(scope.enclosing(15), Enclosing::Module);
    }

    #[test]
    fn test_body_range() {
        let scope = IndentedScope::new(SAMPLE);
        assert_eq!(scope.body_range(5), 6..9);
        assert_eq!(scope.body_range(2), 3..9);
        assert_eq!(scope.block_end(10), Some(13));
    }

    #[test]
    fn test_continuations_and_docstrings() {
        let src = "\
def f(a,
      b):
    \"\"\"Doc
if not a header:
    \"\"\"
    return g(a,
             b)
";
        let scope = IndentedScope::new(src);
        let lines = scope.lines();

        assert_eq!(scope.header(0), Some(HeaderKind::Callable));
        assert!(lines[1].continuation);
        assert!(lines[3].continuation && lines[3].blank);
        assert_eq!(scope.header(3), None);
        assert_eq!(scope.logical_code(0), "def f(a, b):");
        assert_eq!(scope.body_range(0), 2..7);
        assert!(scope.is_within_callable(5));
    }

    #[test]
    fn test_strings_and_comments_blanked() {
        let scope = IndentedScope::new("x = 'a:b(c)'  # if y:\n");
        let line = &scope.lines()[0];
        assert_eq!(line.code.trim_end(), "x = '      '");
        assert_eq!(line.header, None);
    }

    #[test]
    fn test_one_line_compound_statement() {
        let scope = IndentedScope::new("if x: y()\nz = 1\n");
        assert_eq!(scope.header(0), Some(HeaderKind::Control(ControlFlowKind::If)));
        assert!(scope.body_range(0).is_empty());
        assert_eq!(scope.block_end(0), Some(0));
    }

    #[test]
    fn test_decorators_in_window() {
        let src = "\
@app.route(
    \"/x\",
)
@login_required
def view():
    pass
";
        let scope = IndentedScope::new(src);
        assert_eq!(scope.decorators(4, 8), vec!["app.route", "login_required"]);
        assert_eq!(scope.decorators(4, 1), vec!["login_required"]);
    }

    #[test]
    fn test_async_headers() {
        let scope = IndentedScope::new("async def f():\n    async with l:\n        pass\n");
        assert_eq!(scope.header(0), Some(HeaderKind::Callable));
        assert_eq!(scope.header(1), Some(HeaderKind::Control(ControlFlowKind::With)));
    }
}
