//! Base trait and shared helpers for all extractors.

use crate::error::Result;
use crate::processing::Language;
use crate::registry::Registry;
use crate::types::FileSummary;

/// The core trait that all extractors must implement.
///
/// An extractor takes the text of one source file and distills it into a
/// [`FileSummary`], registering the functions and types it finds in the
/// run's [`Registry`] along the way.
pub trait Extractor: Send + Sync {
    /// Get the name of this extractor.
    fn name(&self) -> &'static str;

    /// The language this extractor handles.
    fn language(&self) -> Language;

    /// Extract entities from one file.
    ///
    /// # Arguments
    /// * `path` - Path of the file, used for diagnostics and registry locations
    /// * `content` - Full text of the file
    /// * `registry` - Run-scoped registry receiving functions, types and methods
    ///
    /// # Returns
    /// The file's summary. Pattern-based extractors never fail; the
    /// grammar-based one returns [`crate::DistillError::ParseFailure`] for
    /// input its grammar rejects.
    fn extract(&self, path: &str, content: &str, registry: &mut Registry) -> Result<FileSummary>;

    /// Check if this extractor handles the given language.
    fn supports_language(&self, language: Language) -> bool {
        language == self.language()
    }

    /// Get the description of this extractor.
    fn description(&self) -> &'static str {
        "A source extractor"
    }
}

/// Split `text` on `separator` where it is not nested in brackets or quotes.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Whether `text` ends with `word` as a whole word (ASCII case-insensitive).
pub fn ends_with_word(text: &str, word: &str) -> bool {
    let Some(split) = text.len().checked_sub(word.len()) else {
        return false;
    };
    let Some(tail) = text.get(split..) else {
        return false;
    };
    tail.eq_ignore_ascii_case(word)
        && !text[..split]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Best-effort type of a literal expression.
///
/// Only the lexical shape of `expr` is inspected; `None` means nothing can be
/// said without evaluating it.
pub fn infer_literal_type(expr: &str, language: Language) -> Option<String> {
    let expr = expr.trim().trim_end_matches(';').trim_end();
    let first = expr.chars().next()?;

    if expr.parse::<i64>().is_ok() {
        return Some("int".to_string());
    }
    if first.is_ascii_digit() && expr.parse::<f64>().is_ok() {
        return Some("float".to_string());
    }

    let inferred = match language {
        Language::Php => infer_php(expr, first),
        Language::Python => infer_python(expr, first),
        _ => None,
    };
    inferred.map(str::to_string)
}

fn infer_php(expr: &str, first: char) -> Option<&'static str> {
    let lower = expr.to_ascii_lowercase();
    match first {
        '\'' | '"' => Some("string"),
        '[' => Some("array"),
        _ if lower == "true" || lower == "false" => Some("bool"),
        _ if lower == "null" => Some("null"),
        _ if lower.starts_with("array(") || lower.starts_with("array (") => Some("array"),
        _ if lower.starts_with("function") => Some("callable"),
        _ if lower.starts_with("fn") && lower[2..].trim_start().starts_with('(') => Some("callable"),
        _ if lower.starts_with("new ") => Some("object"),
        _ => None,
    }
}

fn infer_python(expr: &str, first: char) -> Option<&'static str> {
    let lower = expr.to_ascii_lowercase();
    let prefixed_string = lower.len() > 1
        && lower.starts_with(['f', 'r', 'u'])
        && lower[1..].trim_start_matches(['f', 'r']).starts_with(['\'', '"']);
    match first {
        '\'' | '"' => Some("str"),
        _ if prefixed_string => Some("str"),
        'b' | 'B' if expr[1..].starts_with(['\'', '"']) => Some("bytes"),
        '[' => Some("list"),
        '(' => Some("tuple"),
        '{' if expr == "{}" || split_top_level(&expr[1..], ',').iter().any(|p| p.contains(':')) => {
            Some("dict")
        }
        '{' => Some("set"),
        _ if expr == "True" || expr == "False" => Some("bool"),
        _ if expr == "None" => Some("None"),
        _ if expr.starts_with("lambda") => Some("Callable"),
        _ => None,
    }
}
