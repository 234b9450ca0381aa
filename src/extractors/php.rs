//! PHP extractor built on brace counting.
//!
//! There is no grammar here: declarations are found with patterns over the
//! raw text and placed with [`DelimitedScope`], which answers every "is this
//! inside a string, a type body or a function body" question.

use std::collections::HashSet;
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::base::{ends_with_word, infer_literal_type, split_top_level, Extractor};
use crate::error::Result;
use crate::processing::Language;
use crate::registry::Registry;
use crate::scope::{BlockScope, DelimitedScope, LineIndex, TypeKeyword};
use crate::types::{
    AggregateType, ControlFlowForest, ControlFlowKind, DistillerConfig, FileSummary, Function, Import,
    Interface, NodeId, Scope, Variable, Visibility,
};

lazy_static! {
    static ref FUNCTION_HEADER: Regex =
        Regex::new(r"(?i)\b(?:function|fn)\s*&?\s*(?:[A-Za-z_]\w*\s*)?\(").unwrap();
    static ref FUNCTION_DECL: Regex = Regex::new(r"(?i)\bfunction\s*&?\s*([A-Za-z_]\w*)\s*\(").unwrap();
    static ref PROPERTY_DECL: Regex = Regex::new(
        r"(?i)\b(public|protected|private|var)\s+(?:(?:static|readonly)\s+)*(?:(\??[\w\\|]+)\s+)?\$([A-Za-z_]\w*)"
    )
    .unwrap();
    static ref GLOBAL_ASSIGN: Regex = Regex::new(r"\$([A-Za-z_]\w*)\s*=[^=>]").unwrap();
    static ref CONTROL_KEYWORD: Regex =
        Regex::new(r"(?i)\b(if|elseif|for|foreach|while|switch|match|try|do)\b").unwrap();
    static ref CALL: Regex =
        Regex::new(r"(\$[A-Za-z_]\w*\s*(?:\?->|->|::)\s*|[A-Za-z_\\][\w\\]*::)?\b([A-Za-z_]\w*)\s*\(").unwrap();
    static ref INCLUDE: Regex =
        Regex::new(r#"(?i)\b(?:include|require)(?:_once)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap();
    static ref USE_IMPORT: Regex = Regex::new(
        r"(?i)\buse\s+(?:function\s+|const\s+)?\\?([A-Za-z_][\w\\]*)(?:\s+as\s+([A-Za-z_]\w*))?\s*;"
    )
    .unwrap();
    static ref PARENT_CLAUSE: Regex =
        Regex::new(r"(?i)\b(?:extends|implements)\s+([\w\\]+(?:\s*,\s*[\w\\]+)*)").unwrap();
    static ref RETURN_TYPE: Regex = Regex::new(r"^\s*:\s*(\??[\w\\|]+)").unwrap();
    static ref PARAM: Regex = Regex::new(
        r"(?i)^(?:(?:public|protected|private|readonly)\s+)*(?:(\??[\w\\|]+)\s+)?&?(?:\.\.\.)?\$([A-Za-z_]\w*)"
    )
    .unwrap();
}

/// Words that look like calls but are language constructs.
const RESERVED: &[&str] = &[
    "array", "catch", "clone", "declare", "die", "do", "echo", "else", "elseif", "empty", "eval",
    "exit", "fn", "for", "foreach", "function", "if", "include", "include_once", "isset", "list",
    "match", "new", "print", "require", "require_once", "return", "switch", "unset", "use", "while",
];

/// How a control-flow keyword's body was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    /// `{ ... }` at these offsets.
    Block(usize, usize),
    /// Single statement or alternative syntax; recorded without children.
    Statement,
    /// Not a construct of its own, or its block never closes.
    Skip,
}

enum TypeEntry {
    Aggregate(AggregateType),
    Interface(Interface),
}

/// Extractor for PHP source files.
#[derive(Debug, Clone)]
pub struct PhpExtractor {
    max_depth: usize,
}

impl PhpExtractor {
    pub fn new(config: &DistillerConfig) -> Self {
        Self {
            max_depth: config.max_nesting_depth,
        }
    }
}

/// State for one recursive control-flow scan.
struct FlowScan<'s, 'a> {
    scope: &'s DelimitedScope<'a>,
    lines: &'s LineIndex,
    max_depth: usize,
    forest: ControlFlowForest,
    truncated: bool,
}

impl FlowScan<'_, '_> {
    /// Find constructs in `range`; each block is scanned again for its own
    /// children and then skipped. `else`, `catch` and `finally` blocks are
    /// left to the outer scan, so their constructs share the outer parent.
    fn scan(&mut self, range: Range<usize>, parent: Option<NodeId>, depth: usize) {
        let src = self.scope.source();
        let mut cursor = range.start;
        while cursor < range.end {
            let Some(caps) = CONTROL_KEYWORD.captures_at(src, cursor) else {
                break;
            };
            let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            if whole.start() >= range.end {
                break;
            }
            cursor = whole.end();

            let pos = whole.start();
            if self.scope.in_string(pos) || self.scope.follows_accessor(pos) || src[..pos].ends_with('$') {
                continue;
            }
            let keyword = keyword.as_str().to_ascii_lowercase();
            let Some(kind) = ControlFlowKind::from_keyword(&keyword) else {
                continue;
            };

            match construct_body(self.scope, &keyword, whole.end()) {
                Body::Block(open, close) => {
                    let id = self.forest.push(kind, self.lines.line_of(pos), parent);
                    if depth + 1 >= self.max_depth {
                        self.truncated = true;
                    } else {
                        self.scan(open + 1..close, Some(id), depth + 1);
                    }
                    cursor = close + 1;
                }
                Body::Statement => {
                    self.forest.push(kind, self.lines.line_of(pos), parent);
                }
                Body::Skip => {}
            }
        }
    }
}

impl Extractor for PhpExtractor {
    fn name(&self) -> &'static str {
        "php"
    }

    fn language(&self) -> Language {
        Language::Php
    }

    fn extract(&self, path: &str, content: &str, registry: &mut Registry) -> Result<FileSummary> {
        let scope = DelimitedScope::new(content);
        let lines = LineIndex::new(content);
        let mut summary = FileSummary::new(path, Language::Php);

        let mut entries: Vec<TypeEntry> = scope
            .types()
            .iter()
            .map(|span| {
                let line = lines.line_of(span.start);
                match span.keyword {
                    TypeKeyword::Interface => TypeEntry::Interface(Interface {
                        name: span.name.clone(),
                        methods: Vec::new(),
                        line,
                    }),
                    TypeKeyword::Class | TypeKeyword::Trait => {
                        let mut aggregate = AggregateType::new(span.name.clone(), line);
                        aggregate.parents = parent_names(&span.header);
                        TypeEntry::Aggregate(aggregate)
                    }
                }
            })
            .collect();

        for caps in PROPERTY_DECL.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(3)) else {
                continue;
            };
            let pos = whole.start();
            if scope.in_string(pos) || scope.is_within_callable(pos) {
                continue;
            }
            let Some(index) = type_index(&scope, pos) else {
                continue;
            };
            if let TypeEntry::Aggregate(aggregate) = &mut entries[index] {
                let type_name = caps.get(2).map(|m| m.as_str()).unwrap_or("mixed");
                let visibility = caps.get(1).and_then(|m| Visibility::from_keyword(m.as_str()));
                aggregate.upsert_field(
                    Variable::new(name.as_str(), type_name, Scope::Field, lines.line_of(pos))
                        .with_visibility(visibility),
                );
            }
        }

        for caps in FUNCTION_DECL.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let pos = whole.start();
            if scope.in_string(pos) || scope.follows_accessor(pos) {
                continue;
            }
            let Some(mut function) = parse_function(&scope, &lines, name.as_str(), pos, whole.end() - 1) else {
                debug!(path = %path, function = %name.as_str(), "Skipping function with unbalanced delimiters");
                continue;
            };

            if !scope.is_within_type(pos) {
                summary.functions.push(function);
                continue;
            }
            if scope.is_within_callable(pos) {
                continue;
            }
            let Some(index) = type_index(&scope, pos) else {
                continue;
            };
            match &mut entries[index] {
                TypeEntry::Aggregate(aggregate) => {
                    function.owner = Some(aggregate.name.clone());
                    aggregate.upsert_method(function);
                }
                TypeEntry::Interface(interface) => {
                    function.calls.clear();
                    interface.methods.push(function);
                }
            }
        }

        for entry in entries {
            match entry {
                TypeEntry::Aggregate(aggregate) => summary.types.push(aggregate),
                TypeEntry::Interface(interface) => summary.interfaces.push(interface),
            }
        }

        summary.variables = collect_globals(&scope, &lines);
        summary.imports = collect_imports(&scope, &lines);

        let mut flow = FlowScan {
            scope: &scope,
            lines: &lines,
            max_depth: self.max_depth,
            forest: ControlFlowForest::new(),
            truncated: false,
        };
        flow.scan(0..content.len(), None, 0);
        if flow.truncated {
            warn!(path = %path, max_depth = self.max_depth, "Control-flow nesting truncated");
        }
        summary.control_flow = flow.forest;

        for aggregate in &summary.types {
            registry.register_type(path, aggregate.clone());
        }
        for function in &summary.functions {
            registry.register_function(path, function.clone());
        }

        debug!(
            path = %path,
            functions = summary.functions.len(),
            types = summary.types.len(),
            control_flow = summary.control_flow.len(),
            "Extracted PHP file"
        );
        Ok(summary)
    }

    fn description(&self) -> &'static str {
        "Pattern-based extractor for PHP"
    }
}

/// Position of the innermost enclosing type in `scope.types()`.
fn type_index(scope: &DelimitedScope, pos: usize) -> Option<usize> {
    let span = scope.enclosing_type(pos)?;
    scope.types().iter().position(|t| t.open == span.open)
}

fn parent_names(header: &str) -> Vec<String> {
    PARENT_CLAUSE
        .captures_iter(header)
        .filter_map(|caps| caps.get(1))
        .flat_map(|m| m.as_str().split(','))
        .map(|name| name.trim().trim_start_matches('\\').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse a `function name(...)` declaration. `None` when a delimiter never
/// closes.
fn parse_function(
    scope: &DelimitedScope,
    lines: &LineIndex,
    name: &str,
    start: usize,
    paren_open: usize,
) -> Option<Function> {
    let src = scope.source();
    let paren_close = scope.match_delimiter(paren_open)?;
    let line = lines.line_of(start);

    let mut function = Function::new(name, line);
    function.args = parse_params(&src[paren_open + 1..paren_close], line);
    if let Some(caps) = RETURN_TYPE.captures(&src[paren_close + 1..]) {
        function.returns.push(caps[1].to_string());
    }

    if let Some(open) = scope.open_brace_after(paren_close + 1) {
        let close = scope.match_delimiter(open)?;
        collect_calls(scope, open + 1..close, &mut function);
    }
    Some(function)
}

fn parse_params(params: &str, line: usize) -> Vec<Variable> {
    split_top_level(params, ',')
        .into_iter()
        .filter_map(|param| {
            let decl = param.split_once('=').map(|(d, _)| d).unwrap_or(param).trim();
            let caps = PARAM.captures(decl)?;
            let type_name = caps.get(1).map(|m| m.as_str()).unwrap_or("mixed");
            Some(Variable::new(&caps[2], type_name, Scope::Parameter, line))
        })
        .collect()
}

fn collect_calls(scope: &DelimitedScope, body: Range<usize>, function: &mut Function) {
    let src = scope.source();
    for caps in CALL.captures_iter(&src[body.clone()]) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let start = body.start + whole.start();
        if scope.in_string(start) {
            continue;
        }
        if RESERVED.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        // deeper chains like `$a->b->c()` are not resolved
        if scope.follows_accessor(start) {
            continue;
        }
        let before = src[..start].trim_end();
        if ends_with_word(before, "new") || ends_with_word(before, "function") {
            continue;
        }
        function.add_call(name.as_str());
    }
}

/// Assignments outside every type and function body; first one wins.
fn collect_globals(scope: &DelimitedScope, lines: &LineIndex) -> Vec<Variable> {
    let src = scope.source();
    let mut seen = HashSet::new();
    let mut globals = Vec::new();

    // parameter defaults look like assignments
    let param_lists: Vec<(usize, usize)> = FUNCTION_HEADER
        .find_iter(src)
        .filter(|m| !scope.in_string(m.start()))
        .filter_map(|m| {
            let open = m.end() - 1;
            scope.match_delimiter(open).map(|close| (open, close))
        })
        .collect();

    for caps in GLOBAL_ASSIGN.captures_iter(src) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let pos = whole.start();
        if scope.in_string(pos)
            || scope.follows_accessor(pos)
            || scope.is_within_type(pos)
            || scope.is_within_callable(pos)
            || param_lists.iter().any(|&(open, close)| open < pos && pos < close)
        {
            continue;
        }
        let name = name.as_str();
        if name == "this" || !seen.insert(name) {
            continue;
        }

        let Some(eq) = whole.as_str().rfind('=') else {
            continue;
        };
        let value_start = pos + eq + 1;
        let value_end = scope.find_code_byte(value_start, b';').unwrap_or(src.len());
        let type_name = infer_literal_type(&src[value_start..value_end], Language::Php)
            .unwrap_or_else(|| "mixed".to_string());
        globals.push(Variable::new(name, type_name, Scope::Global, lines.line_of(pos)));
    }
    globals
}

fn collect_imports(scope: &DelimitedScope, lines: &LineIndex) -> Vec<Import> {
    let src = scope.source();
    let mut imports = Vec::new();

    for caps in INCLUDE.captures_iter(src) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if scope.in_string(whole.start()) {
            continue;
        }
        let mut import = Import::new(target.as_str(), lines.line_of(whole.start()));
        import.is_relative = target.as_str().starts_with("./") || target.as_str().starts_with("../");
        imports.push(import);
    }

    for caps in USE_IMPORT.captures_iter(src) {
        let (Some(whole), Some(module)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let pos = whole.start();
        if scope.in_string(pos) || scope.is_within_type(pos) || scope.is_within_callable(pos) {
            continue;
        }
        let mut import = Import::new(module.as_str(), lines.line_of(pos));
        import.alias = caps.get(2).map(|m| m.as_str().to_string());
        imports.push(import);
    }

    imports.sort_by_key(|i| i.line);
    imports
}

fn next_non_space(src: &str, from: usize) -> Option<usize> {
    src.get(from..)?
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
}

/// Locate the body of the construct whose keyword ends at `after`.
fn construct_body(scope: &DelimitedScope, keyword: &str, after: usize) -> Body {
    let bytes = scope.source().as_bytes();
    let block_at = |open: usize| match scope.match_delimiter(open) {
        Some(close) => Body::Block(open, close),
        None => Body::Skip,
    };

    let next = next_non_space(scope.source(), after);
    if matches!(keyword, "try" | "do") {
        return match next {
            Some(i) if bytes[i] == b'{' => block_at(i),
            _ => Body::Statement,
        };
    }

    let Some(paren) = next.filter(|&i| bytes[i] == b'(') else {
        return Body::Skip;
    };
    let Some(paren_close) = scope.match_delimiter(paren) else {
        return Body::Skip;
    };
    match next_non_space(scope.source(), paren_close + 1) {
        Some(i) if bytes[i] == b'{' => block_at(i),
        // tail of a do-while
        Some(i) if bytes[i] == b';' && keyword == "while" => Body::Skip,
        _ => Body::Statement,
    }
}
