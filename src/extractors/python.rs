//! Python extractor built on indentation tracking.
//!
//! [`IndentedScope`] classifies every line up front; this module only reads
//! those classifications and pattern-matches the blanked code of each line.

use std::collections::HashSet;
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::base::{ends_with_word, infer_literal_type, split_top_level, Extractor};
use crate::error::Result;
use crate::processing::Language;
use crate::registry::Registry;
use crate::scope::{Enclosing, HeaderKind, IndentedScope};
use crate::types::{
    AggregateType, ControlFlowForest, DistillerConfig, FileSummary, Function, Import, NodeId, Scope,
    Variable,
};

lazy_static! {
    static ref DEF: Regex = Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\s*\(").unwrap();
    static ref CLASS: Regex = Regex::new(r"^class\s+([A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\s*(\()?").unwrap();
    static ref RETURN_ANNOTATION: Regex = Regex::new(r"^\s*->\s*([^:]+?)\s*:").unwrap();
    static ref ASSIGN: Regex =
        Regex::new(r"^([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*(=(?:[^=]|$)|$)").unwrap();
    static ref ATTRIBUTE_ASSIGN: Regex =
        Regex::new(r"^([A-Za-z_]\w*)\.([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=(?:[^=]|$)").unwrap();
    static ref CALL: Regex = Regex::new(r"\b(?:([A-Za-z_]\w*)\s*\.\s*)?([A-Za-z_]\w*)\s*\(").unwrap();
    static ref IMPORT: Regex = Regex::new(r"^import\s+(.+)$").unwrap();
    static ref FROM_IMPORT: Regex = Regex::new(r"^from\s+(\.*[\w.]*)\s+import\s+(.+)$").unwrap();
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield",
];

const BUILTINS: &[&str] = &[
    "abs", "all", "any", "bin", "bool", "chr", "dict", "dir", "divmod", "enumerate", "filter",
    "float", "format", "frozenset", "getattr", "hasattr", "hash", "hex", "id", "input", "int",
    "isinstance", "issubclass", "iter", "len", "list", "map", "max", "min", "next", "oct", "open",
    "ord", "pow", "print", "property", "range", "repr", "reversed", "round", "set", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

/// Extractor for Python source files.
#[derive(Debug, Clone)]
pub struct PythonExtractor {
    max_depth: usize,
    decorator_window: usize,
}

impl PythonExtractor {
    pub fn new(config: &DistillerConfig) -> Self {
        Self {
            max_depth: config.max_nesting_depth,
            decorator_window: config.decorator_window,
        }
    }

    /// Turn a method's header into a bound method and record the instance
    /// fields it assigns through its receiver.
    fn bind_method(&self, scope: &IndentedScope, header: usize, mut method: Function, class: &mut AggregateType) {
        let is_static = method.decorators.iter().any(|d| d.ends_with("staticmethod"));
        let is_classmethod = method.decorators.iter().any(|d| d.ends_with("classmethod"));

        if !is_static && !method.args.is_empty() {
            let receiver = method.args.remove(0);
            if !is_classmethod {
                for field in receiver_fields(scope, scope.body_range(header), &receiver.name) {
                    class.upsert_field(field);
                }
            }
        }
        method.owner = Some(class.name.clone());
        class.upsert_method(method);
    }
}

/// State for one recursive control-flow scan.
struct FlowScan<'s> {
    scope: &'s IndentedScope,
    max_depth: usize,
    forest: ControlFlowForest,
    truncated: bool,
}

impl FlowScan<'_> {
    /// Find control headers in `range`; each body is scanned again for its
    /// own children and then skipped. `def`, `class`, `else` and friends are
    /// stepped into without adding a node.
    fn scan(&mut self, range: Range<usize>, parent: Option<NodeId>, depth: usize) {
        let lines = self.scope.lines();
        let mut i = range.start;
        while i < range.end.min(lines.len()) {
            let line = &lines[i];
            if line.blank || line.continuation {
                i += 1;
                continue;
            }
            let next = line.logical_end + 1;
            if let Some(HeaderKind::Control(kind)) = line.header {
                let body = self.scope.body_range(i);
                let id = self.forest.push(kind, i + 1, parent);
                if depth + 1 >= self.max_depth {
                    self.truncated = true;
                } else {
                    self.scan(body.clone(), Some(id), depth + 1);
                }
                i = body.end.max(next);
                continue;
            }
            i = next;
        }
    }
}

impl Extractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, path: &str, content: &str, registry: &mut Registry) -> Result<FileSummary> {
        let scope = IndentedScope::new(content);
        let mut summary = FileSummary::new(path, Language::Python);
        let mut classes: Vec<(usize, AggregateType)> = Vec::new();
        let mut decorators_seen = HashSet::new();

        for (i, line) in scope.lines().iter().enumerate() {
            if line.continuation {
                continue;
            }
            let decorators = match line.header {
                Some(HeaderKind::Type) => {
                    let Some(mut class) = parse_class(&scope.logical_code(i), i + 1) else {
                        continue;
                    };
                    for attribute in class_attributes(&scope, i) {
                        class.upsert_field(attribute);
                    }
                    classes.push((i, class));
                    scope.decorators(i, self.decorator_window)
                }
                Some(HeaderKind::Callable) => {
                    let Some(mut function) = parse_def(&scope.logical_code(i), i + 1) else {
                        continue;
                    };
                    function.decorators = scope.decorators(i, self.decorator_window);
                    collect_calls(&scope, scope.body_range(i), &mut function);
                    let decorators = function.decorators.clone();

                    match scope.enclosing(i) {
                        Enclosing::Module => summary.functions.push(function),
                        Enclosing::Type(header) => {
                            if let Some((_, class)) = classes.iter_mut().find(|(h, _)| *h == header) {
                                self.bind_method(&scope, i, function, class);
                            }
                        }
                        // nested functions are not part of the module surface
                        Enclosing::Callable(_) => {}
                    }
                    decorators
                }
                _ => continue,
            };
            for decorator in decorators {
                if decorators_seen.insert(decorator.clone()) {
                    summary.decorators.push(decorator);
                }
            }
        }

        summary.types = classes.into_iter().map(|(_, class)| class).collect();
        summary.variables = collect_globals(&scope);
        summary.imports = collect_imports(&scope);

        let mut flow = FlowScan {
            scope: &scope,
            max_depth: self.max_depth,
            forest: ControlFlowForest::new(),
            truncated: false,
        };
        flow.scan(0..scope.len(), None, 0);
        if flow.truncated {
            warn!(path = %path, max_depth = self.max_depth, "Control-flow nesting truncated");
        }
        summary.control_flow = flow.forest;

        for class in &summary.types {
            registry.register_type(path, class.clone());
        }
        for function in &summary.functions {
            registry.register_function(path, function.clone());
        }

        debug!(
            path = %path,
            functions = summary.functions.len(),
            types = summary.types.len(),
            control_flow = summary.control_flow.len(),
            "Extracted Python file"
        );
        Ok(summary)
    }

    fn description(&self) -> &'static str {
        "Indentation-based extractor for Python"
    }
}

/// Offset of the bracket closing the one at `open`.
fn matching_paren(code: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in code[open..].char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_def(code: &str, line: usize) -> Option<Function> {
    let code = code.trim();
    let caps = DEF.captures(code)?;
    let open = caps.get(0)?.end() - 1;
    let close = matching_paren(code, open)?;

    let mut function = Function::new(&caps[1], line);
    function.args = parse_params(&code[open + 1..close], line);
    if let Some(ret) = RETURN_ANNOTATION.captures(&code[close + 1..]) {
        function.returns.push(ret[1].to_string());
    }
    Some(function)
}

/// Parameters without `*args`, `**kwargs` and the bare `*` and `/` markers.
fn parse_params(params: &str, line: usize) -> Vec<Variable> {
    split_top_level(params, ',')
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "/" && !p.starts_with('*'))
        .filter_map(|param| {
            let parts = split_top_level(param, '=');
            let decl = parts.first()?.trim();
            let default = parts.get(1).map(|d| d.trim());
            let (name, annotation) = match decl.split_once(':') {
                Some((name, annotation)) => (name.trim(), Some(annotation.trim())),
                None => (decl, None),
            };
            if name.is_empty() {
                return None;
            }
            let type_name = annotation
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .or_else(|| default.and_then(|d| infer_literal_type(d, Language::Python)))
                .unwrap_or_else(|| "Any".to_string());
            Some(Variable::new(name, type_name, Scope::Parameter, line))
        })
        .collect()
}

fn parse_class(code: &str, line: usize) -> Option<AggregateType> {
    let code = code.trim();
    let caps = CLASS.captures(code)?;
    let mut class = AggregateType::new(&caps[1], line);

    if let Some(paren) = caps.get(2) {
        let close = matching_paren(code, paren.start())?;
        class.parents = split_top_level(&code[paren.start() + 1..close], ',')
            .into_iter()
            .map(str::trim)
            .filter(|base| !base.is_empty() && !base.contains('='))
            .map(str::to_string)
            .collect();
    }
    Some(class)
}

/// Parse `name = value` or `name: annotation [= value]`.
fn parse_assignment(code: &str, line: usize, scope: Scope, fallback: &str) -> Option<Variable> {
    let caps = ASSIGN.captures(code)?;
    let annotation = caps.get(2).map(|m| m.as_str().trim());
    let assign = caps.get(3)?;
    if assign.as_str().is_empty() && annotation.is_none() {
        return None;
    }
    let value = code.get(assign.start() + 1..).unwrap_or("");
    let type_name = annotation
        .map(str::to_string)
        .or_else(|| infer_literal_type(value, Language::Python))
        .unwrap_or_else(|| fallback.to_string());
    Some(Variable::new(&caps[1], type_name, scope, line))
}

/// Statement lines whose innermost definition is the class at `header`.
fn class_attributes(scope: &IndentedScope, header: usize) -> Vec<Variable> {
    let lines = scope.lines();
    scope
        .body_range(header)
        .filter(|&k| {
            let line = &lines[k];
            !line.blank && !line.continuation && line.header.is_none()
        })
        .filter(|&k| scope.enclosing(k) == Enclosing::Type(header))
        .filter_map(|k| parse_assignment(lines[k].code.trim(), k + 1, Scope::ClassAttribute, "inferred"))
        .collect()
}

/// `receiver.name = value` assignments in a method body.
fn receiver_fields(scope: &IndentedScope, body: Range<usize>, receiver: &str) -> Vec<Variable> {
    let lines = scope.lines();
    let mut fields = Vec::new();
    for k in body {
        let line = &lines[k];
        if line.blank || line.continuation {
            continue;
        }
        let code = line.code.trim();
        let Some(caps) = ATTRIBUTE_ASSIGN.captures(code) else {
            continue;
        };
        if &caps[1] != receiver {
            continue;
        }
        let type_name = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .or_else(|| {
                let eq = caps.get(0)?.as_str().rfind('=')?;
                infer_literal_type(&code[eq + 1..], Language::Python)
            })
            .unwrap_or_else(|| "inferred".to_string());
        fields.push(Variable::new(&caps[2], type_name, Scope::Field, k + 1));
    }
    fields
}

/// Bare and one-level member calls in a body, minus keywords and builtins.
fn collect_calls(scope: &IndentedScope, body: Range<usize>, function: &mut Function) {
    let lines = scope.lines();
    for k in body {
        let line = &lines[k];
        if line.blank {
            continue;
        }
        let code = line.code.as_str();
        for caps in CALL.captures_iter(code) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let before = code[..whole.start()].trim_end();
            // deeper chains like `a.b.c()` are not resolved
            if before.ends_with('.') {
                continue;
            }
            let name = name.as_str();
            if KEYWORDS.contains(&name) {
                continue;
            }
            match caps.get(1) {
                Some(receiver) => function.add_call(format!("{}.{}", receiver.as_str(), name)),
                None => {
                    if BUILTINS.contains(&name) || ends_with_word(before, "def") || ends_with_word(before, "class") {
                        continue;
                    }
                    function.add_call(name);
                }
            }
        }
    }
}

/// Module-level assignments; first one wins.
fn collect_globals(scope: &IndentedScope) -> Vec<Variable> {
    let mut seen = HashSet::new();
    let mut globals = Vec::new();
    for (i, line) in scope.lines().iter().enumerate() {
        if line.blank || line.continuation || line.header.is_some() {
            continue;
        }
        if scope.enclosing(i) != Enclosing::Module {
            continue;
        }
        let Some(variable) = parse_assignment(line.code.trim(), i + 1, Scope::Global, "inferred") else {
            continue;
        };
        if seen.insert(variable.name.clone()) {
            globals.push(variable);
        }
    }
    globals
}

fn collect_imports(scope: &IndentedScope) -> Vec<Import> {
    let mut imports = Vec::new();
    for (i, line) in scope.lines().iter().enumerate() {
        if line.blank || line.continuation {
            continue;
        }
        let trimmed = line.code.trim_start();
        if !(trimmed.starts_with("import ") || trimmed.starts_with("from ")) {
            continue;
        }
        let code = scope.logical_code(i);

        if let Some(caps) = IMPORT.captures(&code) {
            for item in split_top_level(&caps[1], ',') {
                let (module, alias) = split_alias(item);
                if module.is_empty() {
                    continue;
                }
                let mut import = Import::new(module, i + 1);
                import.alias = alias.map(str::to_string);
                imports.push(import);
            }
        } else if let Some(caps) = FROM_IMPORT.captures(&code) {
            let module = &caps[1];
            let mut import = Import::new(module, i + 1);
            import.is_relative = module.starts_with('.');
            let list = caps[2].trim().trim_start_matches('(').trim_end_matches(')');
            import.items = split_top_level(list, ',')
                .into_iter()
                .map(|item| split_alias(item).0.to_string())
                .filter(|item| !item.is_empty())
                .collect();
            imports.push(import);
        }
    }
    imports
}

fn split_alias(item: &str) -> (&str, Option<&str>) {
    let item = item.trim();
    match item.split_once(" as ") {
        Some((name, alias)) => (name.trim(), Some(alias.trim())),
        None => (item, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ControlFlowKind;
    use pretty_assertions::assert_eq;

    fn extract(source: &str) -> (FileSummary, Registry) {
        let mut registry = Registry::new();
        let summary = PythonExtractor::new(&DistillerConfig::default())
            .extract("test.py", source, &mut registry)
            .unwrap();
        (summary, registry)
    }

    fn names(vars: &[Variable]) -> Vec<(&str, &str)> {
        vars.iter()
            .map(|v| (v.name.as_str(), v.type_name.as_str()))
            .collect()
    }

    #[test]
    fn test_function_with_nested_control_flow() {
        let (summary, _) = extract("def outer():\n    if x:\n        for i in y:\n            pass\n");

        assert_eq!(summary.functions.len(), 1);
        assert_eq!(summary.functions[0].name, "outer");

        let forest = &summary.control_flow;
        let roots: Vec<(ControlFlowKind, usize)> = forest.root_nodes().map(|n| (n.kind, n.line)).collect();
        assert_eq!(roots, vec![(ControlFlowKind::If, 2)]);
        let children: Vec<(ControlFlowKind, usize)> =
            forest.children(forest.roots[0]).map(|n| (n.kind, n.line)).collect();
        assert_eq!(children, vec![(ControlFlowKind::For, 3)]);
        assert_eq!(forest.len(), 2);
    }

    const MODULE: &str = r#"import os
import numpy as np, sys
from .models import (
    User,
    Group as G,
)
from typing import Any

VERSION = "1.0"
retries: int = 3
VERSION = "2.0"

@dataclass
class Point(Base, metaclass=Meta):
    dims = 2
    label: str = "p"

    def __init__(self, x: int, y=0, *args, **kwargs):
        self.x = x
        self.y: float = y
        self.x = x + 1

    @staticmethod
    def origin(scale=1.0) -> Point:
        return Point(0, 0)

    @property
    def norm(self) -> float:
        total = math.sqrt(self.x ** 2 + self.y ** 2)
        return round(self.helper(total).value)

def main(argv):
    for arg in argv:
        print(arg)
    load_config(argv)
"#;

    #[test]
    fn test_imports() {
        let (summary, _) = extract(MODULE);

        let imports: Vec<(&str, Option<&str>, Vec<&str>, bool, usize)> = summary
            .imports
            .iter()
            .map(|i| {
                (
                    i.module.as_str(),
                    i.alias.as_deref(),
                    i.items.iter().map(String::as_str).collect(),
                    i.is_relative,
                    i.line,
                )
            })
            .collect();
        assert_eq!(
            imports,
            vec![
                ("os", None, vec![], false, 1),
                ("numpy", Some("np"), vec![], false, 2),
                ("sys", None, vec![], false, 2),
                (".models", None, vec!["User", "Group"], true, 3),
                ("typing", None, vec!["Any"], false, 7),
            ]
        );
    }

    #[test]
    fn test_globals() {
        let (summary, _) = extract(MODULE);

        assert_eq!(names(&summary.variables), vec![("VERSION", "str"), ("retries", "int")]);
        assert_eq!(summary.variables[0].line, 9);
        assert!(summary.variables.iter().all(|v| v.scope == Scope::Global));
    }

    #[test]
    fn test_class_fields_and_parents() {
        let (summary, _) = extract(MODULE);
        let point = summary.aggregate_type("Point").unwrap();

        assert_eq!(point.line, 14);
        assert_eq!(point.parents, vec!["Base"]);
        assert_eq!(
            names(&point.fields),
            vec![("dims", "int"), ("label", "str"), ("x", "inferred"), ("y", "float")]
        );
        assert_eq!(point.fields[0].scope, Scope::ClassAttribute);
        assert_eq!(point.fields[2].scope, Scope::Field);
        // last write wins, in place
        assert_eq!(point.fields[2].line, 21);
    }

    #[test]
    fn test_methods() {
        let (summary, registry) = extract(MODULE);
        let point = summary.aggregate_type("Point").unwrap();

        let method_names: Vec<&str> = point.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(method_names, vec!["__init__", "origin", "norm"]);
        assert!(point.methods.iter().all(|m| m.owner.as_deref() == Some("Point")));

        let init = &point.methods[0];
        assert_eq!(names(&init.args), vec![("x", "int"), ("y", "int")]);

        let origin = &point.methods[1];
        assert_eq!(origin.decorators, vec!["staticmethod"]);
        assert_eq!(names(&origin.args), vec![("scale", "float")]);
        assert_eq!(origin.returns, vec!["Point"]);
        assert_eq!(origin.calls, vec!["Point"]);

        let norm = &point.methods[2];
        assert!(norm.args.is_empty());
        assert_eq!(norm.returns, vec!["float"]);
        assert_eq!(norm.calls, vec!["math.sqrt", "self.helper"]);

        assert!(registry.aggregate_type("Point").is_some());
        assert!(!registry.contains_function("norm"));
    }

    #[test]
    fn test_free_functions_and_decorators() {
        let (summary, registry) = extract(MODULE);

        assert_eq!(summary.functions.len(), 1);
        let main = &summary.functions[0];
        assert_eq!(main.name, "main");
        assert_eq!(names(&main.args), vec![("argv", "Any")]);
        assert_eq!(main.calls, vec!["load_config"]);
        assert!(registry.contains_function("main"));

        assert_eq!(summary.decorators, vec!["dataclass", "staticmethod", "property"]);

        let roots: Vec<(ControlFlowKind, usize)> =
            summary.control_flow.root_nodes().map(|n| (n.kind, n.line)).collect();
        assert_eq!(roots, vec![(ControlFlowKind::For, 33)]);
    }

    #[test]
    fn test_elif_else_and_try_siblings() {
        let source = "\
def check(v):
    if v > 0:
        pass
    elif v < 0:
        while v:
            v += 1
    else:
        with lock:
            pass
    try:
        go()
    except Error:
        pass
";
        let (summary, _) = extract(source);
        let forest = &summary.control_flow;

        let roots: Vec<(ControlFlowKind, usize)> = forest.root_nodes().map(|n| (n.kind, n.line)).collect();
        assert_eq!(
            roots,
            vec![
                (ControlFlowKind::If, 2),
                (ControlFlowKind::If, 4),
                (ControlFlowKind::With, 8),
                (ControlFlowKind::Try, 10),
            ]
        );
        let elif_children: Vec<(ControlFlowKind, usize)> =
            forest.children(forest.roots[1]).map(|n| (n.kind, n.line)).collect();
        assert_eq!(elif_children, vec![(ControlFlowKind::While, 5)]);
        assert_eq!(summary.functions[0].calls, vec!["go"]);
    }

    #[test]
    fn test_handler_bodies_belong_to_enclosing_parent() {
        let source = "\
def load(path):
    try:
        data = read(path)
    except IOError:
        if retry:
            log()
    finally:
        for h in handles:
            close(h)
";
        let (summary, _) = extract(source);
        let forest = &summary.control_flow;

        let roots: Vec<(ControlFlowKind, usize)> = forest.root_nodes().map(|n| (n.kind, n.line)).collect();
        assert_eq!(
            roots,
            vec![
                (ControlFlowKind::Try, 2),
                (ControlFlowKind::If, 5),
                (ControlFlowKind::For, 8),
            ]
        );
        assert_eq!(forest.children(forest.roots[0]).count(), 0);
    }

    #[test]
    fn test_nested_chain_depth() {
        let mut source = String::from("def f():\n");
        for level in 1..=6 {
            source.push_str(&format!("{}if x:\n", "    ".repeat(level)));
        }
        source.push_str(&format!("{}pass\n", "    ".repeat(7)));
        let (summary, _) = extract(&source);

        assert_eq!(summary.control_flow.len(), 6);
        assert_eq!(summary.control_flow.depth(), 6);
        assert!(summary.control_flow.nodes.iter().all(|n| n.children.len() <= 1));
    }

    #[test]
    fn test_depth_limit_truncates() {
        let source = "if a:\n    if b:\n        if c:\n            pass\n";
        let mut registry = Registry::new();
        let config = DistillerConfig::default().with_max_nesting_depth(2);
        let summary = PythonExtractor::new(&config)
            .extract("deep.py", source, &mut registry)
            .unwrap();

        assert_eq!(summary.control_flow.len(), 2);
    }

    #[test]
    fn test_nested_def_is_not_a_call_or_function() {
        let source = "\
def outer():
    def inner(a):
        return a
    return inner(1)
";
        let (summary, registry) = extract(source);

        assert_eq!(summary.functions.len(), 1);
        assert_eq!(summary.functions[0].calls, vec!["inner"]);
        assert!(!registry.contains_function("inner"));
    }

    #[test]
    fn test_strings_do_not_fake_structure() {
        let source = "\
doc = \"\"\"
def fake():
    if x:
\"\"\"
label = 'call(me)'
";
        let (summary, _) = extract(source);

        assert!(summary.functions.is_empty());
        assert!(summary.control_flow.is_empty());
        assert_eq!(names(&summary.variables), vec![("doc", "str"), ("label", "str")]);
    }
}
