//! Brace-delimited scope detection.
//!
//! Works on raw text without a grammar. A single lexical pass marks every
//! byte that sits inside a quoted string, a comment or inline markup outside
//! `<?php ... ?>`; every other query consults that mask through
//! [`DelimitedScope::in_string`] and nothing else.

use lazy_static::lazy_static;
use regex::Regex;

use super::BlockScope;

lazy_static! {
    static ref TYPE_DECL: Regex =
        Regex::new(r"(?i)\b(class|trait|interface)\s+([A-Za-z_]\w*)").unwrap();
    static ref CALLABLE_DECL: Regex = Regex::new(r"(?i)\bfunction\b").unwrap();
}

/// Keyword that opened a type body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKeyword {
    Class,
    Trait,
    Interface,
}

impl TypeKeyword {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "class" => Some(TypeKeyword::Class),
            "trait" => Some(TypeKeyword::Trait),
            "interface" => Some(TypeKeyword::Interface),
            _ => None,
        }
    }
}

/// A type declaration and the byte span of its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpan {
    pub keyword: TypeKeyword,
    pub name: String,
    /// Offset of the declaring keyword.
    pub start: usize,
    /// Text between the name and the opening brace (extends/implements).
    pub header: String,
    /// Offset of `{`.
    pub open: usize,
    /// Offset of the matching `}`.
    pub close: usize,
}

impl TypeSpan {
    pub fn contains(&self, pos: usize) -> bool {
        self.open < pos && pos < self.close
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Single,
    Double,
    Backtick,
    LineComment,
    BlockComment,
    Markup,
}

/// Scope detector for brace-delimited source.
#[derive(Debug, Clone)]
pub struct DelimitedScope<'a> {
    source: &'a str,
    masked: Vec<bool>,
    types: Vec<TypeSpan>,
    callables: Vec<(usize, usize)>,
}

impl<'a> DelimitedScope<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut scope = Self {
            source,
            masked: mask_literals(source),
            types: Vec::new(),
            callables: Vec::new(),
        };
        scope.types = scope.collect_types();
        scope.callables = scope.collect_callables();
        scope
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Whether `pos` sits inside a string literal, comment or inline markup.
    pub fn in_string(&self, pos: usize) -> bool {
        self.masked.get(pos).copied().unwrap_or(false)
    }

    /// First `{` at or after `pos` that opens a block for the construct at
    /// `pos`. Parenthesised text is skipped; a `;` or `}` at the outer level
    /// first means the construct has no block.
    pub fn open_brace_after(&self, pos: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let mut depth = 0usize;
        for i in pos..bytes.len() {
            if self.in_string(i) {
                continue;
            }
            match bytes[i] {
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'{' if depth == 0 => return Some(i),
                b';' | b'}' if depth == 0 => return None,
                _ => {}
            }
        }
        None
    }

    /// Offset of the delimiter closing the one at `open`.
    pub fn match_delimiter(&self, open: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let (opener, closer) = match bytes.get(open)? {
            b'{' => (b'{', b'}'),
            b'(' => (b'(', b')'),
            b'[' => (b'[', b']'),
            _ => return None,
        };
        let mut depth = 0usize;
        for i in open..bytes.len() {
            if self.in_string(i) {
                continue;
            }
            if bytes[i] == opener {
                depth += 1;
            } else if bytes[i] == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// First unmasked occurrence of `byte` at or after `pos`.
    pub fn find_code_byte(&self, pos: usize, byte: u8) -> Option<usize> {
        let bytes = self.source.as_bytes();
        (pos..bytes.len()).find(|&i| bytes[i] == byte && !self.in_string(i))
    }

    /// All type declarations with a well-formed body, in source order.
    pub fn types(&self) -> &[TypeSpan] {
        &self.types
    }

    /// Innermost type body containing `pos`.
    pub fn enclosing_type(&self, pos: usize) -> Option<&TypeSpan> {
        self.types
            .iter()
            .filter(|t| t.contains(pos))
            .max_by_key(|t| t.open)
    }

    /// Body spans `(open, close)` of every `function` with a block.
    pub fn callable_spans(&self) -> &[(usize, usize)] {
        &self.callables
    }

    /// Whether the code just before `pos` is a member or static access.
    pub fn follows_accessor(&self, pos: usize) -> bool {
        let before = self.source[..pos].trim_end();
        before.ends_with("->") || before.ends_with("::") || before.ends_with("?->")
    }

    fn collect_types(&self) -> Vec<TypeSpan> {
        let mut spans = Vec::new();
        for caps in TYPE_DECL.captures_iter(self.source) {
            let (Some(whole), Some(kw), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            if self.in_string(whole.start()) || self.follows_accessor(whole.start()) {
                continue;
            }
            let Some(keyword) = TypeKeyword::from_keyword(kw.as_str()) else {
                continue;
            };
            if matches!(name.as_str().to_ascii_lowercase().as_str(), "extends" | "implements") {
                continue;
            }
            let Some(open) = self.open_brace_after(name.end()) else {
                continue;
            };
            let Some(close) = self.match_delimiter(open) else {
                continue;
            };
            spans.push(TypeSpan {
                keyword,
                name: name.as_str().to_string(),
                start: whole.start(),
                header: self.source[name.end()..open].trim().to_string(),
                open,
                close,
            });
        }
        spans
    }

    fn collect_callables(&self) -> Vec<(usize, usize)> {
        CALLABLE_DECL
            .find_iter(self.source)
            .filter(|m| !self.in_string(m.start()) && !self.follows_accessor(m.start()))
            .filter_map(|m| {
                let open = self.open_brace_after(m.end())?;
                let close = self.match_delimiter(open)?;
                Some((open, close))
            })
            .collect()
    }
}

impl BlockScope for DelimitedScope<'_> {
    type Pos = usize;

    fn block_end(&self, start: usize) -> Option<usize> {
        self.open_brace_after(start)
            .and_then(|open| self.match_delimiter(open))
    }

    fn is_within_callable(&self, pos: usize) -> bool {
        self.callables
            .iter()
            .any(|&(open, close)| open < pos && pos < close)
    }

    fn is_within_type(&self, pos: usize) -> bool {
        self.types.iter().any(|t| t.contains(pos))
    }
}

/// Mark every byte that is not live code.
///
/// `masked[i]` describes the state just before byte `i`, so an opening quote
/// is unmasked and its closing quote is masked. Files containing `<?` start
/// in markup mode; bare fragments start in code mode.
fn mask_literals(source: &str) -> Vec<bool> {
    let bytes = source.as_bytes();
    let mut masked = vec![false; bytes.len() + 1];
    let mut mode = if source.contains("<?") {
        Mode::Markup
    } else {
        Mode::Code
    };

    let mut i = 0;
    while i < bytes.len() {
        masked[i] = mode != Mode::Code;
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match mode {
            Mode::Code => match (b, next) {
                (b'\'', _) => mode = Mode::Single,
                (b'"', _) => mode = Mode::Double,
                (b'`', _) => mode = Mode::Backtick,
                (b'#', n) if n != Some(b'[') => mode = Mode::LineComment,
                (b'/', Some(b'/')) => mode = Mode::LineComment,
                (b'/', Some(b'*')) => {
                    masked[i + 1] = true;
                    mode = Mode::BlockComment;
                    i += 2;
                    continue;
                }
                (b'?', Some(b'>')) => mode = Mode::Markup,
                _ => {}
            },
            Mode::Single | Mode::Double | Mode::Backtick => {
                let quote = match mode {
                    Mode::Single => b'\'',
                    Mode::Double => b'"',
                    _ => b'`',
                };
                if b == b'\\' {
                    masked[i + 1] = true;
                    i += 2;
                    continue;
                }
                if b == quote {
                    mode = Mode::Code;
                }
            }
            Mode::LineComment => match (b, next) {
                (b'\n', _) => mode = Mode::Code,
                (b'?', Some(b'>')) => mode = Mode::Markup,
                _ => {}
            },
            Mode::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    masked[i + 1] = true;
                    mode = Mode::Code;
                    i += 2;
                    continue;
                }
            }
            Mode::Markup => {
                if b == b'<' && next == Some(b'?') {
                    let rest = &bytes[i..];
                    let tag_len = if rest.get(..5).is_some_and(|tag| tag.eq_ignore_ascii_case(b"<?php")) {
                        5
                    } else if rest.starts_with(b"<?=") {
                        3
                    } else {
                        2
                    };
                    for m in masked.iter_mut().skip(i).take(tag_len) {
                        *m = true;
                    }
                    mode = Mode::Code;
                    i += tag_len;
                    continue;
                }
            }
        }
        i += 1;
    }
    masked[bytes.len()] = mode != Mode::Code;
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal offset after `open` where the running balance is zero.
    fn reference_block_end(source: &str, open: usize) -> usize {
        let mut balance = 0i32;
        for (i, b) in source.bytes().enumerate().skip(open) {
            match b {
                b'{' => balance += 1,
                b'}' => balance -= 1,
                _ => {}
            }
            if balance == 0 {
                return i;
            }
        }
        panic!("unbalanced input");
    }

    #[test]
    fn test_block_end_matches_running_balance() {
        let inputs = [
            "{}",
            "{ a(); }",
            "if ($x) { { } { { } } } trailing { }",
            "function f() { if (1) { g(); } else { h(); } }",
            "class A { function b() { return [1, 2]; } }",
        ];
        for input in inputs {
            let scope = DelimitedScope::new(input);
            let open = input.find('{').unwrap();
            assert_eq!(
                scope.block_end(0),
                Some(reference_block_end(input, open)),
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_block_end_ignores_braces_in_strings() {
        let src = r#"function f() { $s = "}"; $t = '{'; // }
            /* } */ return 1; }"#;
        let scope = DelimitedScope::new(src);
        assert_eq!(scope.block_end(0), Some(src.len() - 1));
    }

    #[test]
    fn test_block_end_unmatched_is_none() {
        let scope = DelimitedScope::new("function f() { if (1) { ");
        assert_eq!(scope.block_end(0), None);
        assert_eq!(scope.block_end(100), None);
    }

    #[test]
    fn test_block_end_stops_at_statement() {
        let scope = DelimitedScope::new("if ($a) return; { }");
        assert_eq!(scope.block_end(0), None);
    }

    #[test]
    fn test_in_string_tracks_quote_kind() {
        let src = r#"$a = "it's"; $b = 1;"#;
        let scope = DelimitedScope::new(src);
        let apostrophe = src.find('\'').unwrap();
        let b = src.find("$b").unwrap();

        assert!(scope.in_string(apostrophe));
        assert!(!scope.in_string(b));
    }

    #[test]
    fn test_markup_outside_php_tags_is_masked() {
        let src = "<p onclick=\"x()\">hi</p>\n<?php function f() { } ?>\n<b>{</b>";
        let scope = DelimitedScope::new(src);

        assert!(scope.in_string(src.find("onclick").unwrap()));
        assert!(!scope.in_string(src.find("function").unwrap()));
        assert!(scope.in_string(src.rfind('{').unwrap()));
        assert_eq!(scope.callable_spans().len(), 1);
    }

    #[test]
    fn test_multibyte_text_after_open_tag() {
        let src = "<p>café</p><?é中 $x = 1; ?>";
        let scope = DelimitedScope::new(src);

        assert!(scope.in_string(src.find("café").unwrap()));
        assert!(!scope.in_string(src.find("$x").unwrap()));
    }

    #[test]
    fn test_within_predicates() {
        let src = "class A { public $x; function m() { $y = 1; } }\nfunction free() { $z = 2; }\n$g = 3;";
        let scope = DelimitedScope::new(src);

        let x = src.find("$x").unwrap();
        let y = src.find("$y").unwrap();
        let z = src.find("$z").unwrap();
        let g = src.find("$g").unwrap();

        assert!(scope.is_within_type(x) && !scope.is_within_callable(x));
        assert!(scope.is_within_type(y) && scope.is_within_callable(y));
        assert!(!scope.is_within_type(z) && scope.is_within_callable(z));
        assert!(!scope.is_within_type(g) && !scope.is_within_callable(g));
    }

    #[test]
    fn test_sibling_types_do_not_capture_each_other() {
        let src = "class A { public $a; }\nclass B { public $b; }";
        let scope = DelimitedScope::new(src);

        let b = src.find("$b").unwrap();
        assert_eq!(scope.enclosing_type(b).map(|t| t.name.as_str()), Some("B"));
        let between = src.find('\n').unwrap();
        assert!(scope.enclosing_type(between).is_none());
    }

    #[test]
    fn test_type_header_and_class_constant() {
        let src = "$n = Foo::class;\nabstract class Repo extends Base implements A, B {\n}";
        let scope = DelimitedScope::new(src);

        assert_eq!(scope.types().len(), 1);
        assert_eq!(scope.types()[0].name, "Repo");
        assert_eq!(scope.types()[0].header, "extends Base implements A, B");
    }
}
