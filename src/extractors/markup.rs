//! Markup extractor.
//!
//! Walks the HTML syntax tree and records one [`MarkupElement`] per start or
//! self-closing tag. Functions declared in inline `<script>` blocks are
//! registered so event-handler attributes can resolve to them. Server-side
//! include directives are picked up from the raw text, since the HTML grammar
//! treats them as plain text.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use tree_sitter::{Node, Tree};

use super::base::Extractor;
use crate::ast_engine::{check_parse_errors, node_kind, node_line, node_text, AstParser, NodeKind};
use crate::error::{DistillError, Result};
use crate::processing::Language;
use crate::registry::Registry;
use crate::scope::LineIndex;
use crate::types::{FileSummary, Function, Import, MarkupElement};

lazy_static! {
    static ref SERVER_INCLUDE: Regex = Regex::new(
        r#"(?i)<\?(?:php)?\s+(?:include|require)(?:_once)?\s*\(\s*['"]([^'"]+)['"]\s*\)\s*;?\s*\?>"#
    )
    .unwrap();
    static ref SCRIPT_FUNCTION: Regex = Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*\(").unwrap();
}

/// Extractor for HTML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupExtractor {
    parser: AstParser,
}

impl MarkupExtractor {
    pub fn new() -> Self {
        Self {
            parser: AstParser::new(),
        }
    }

    /// Extract elements from an already parsed document.
    ///
    /// Syntax errors are tolerated: the grammar recovers around stray tags and
    /// whatever elements it still recognises are reported.
    pub fn extract_tree(
        &self,
        path: &str,
        content: &str,
        tree: &Tree,
        registry: &mut Registry,
    ) -> Result<FileSummary> {
        let root = tree.root_node();
        if root.has_error() {
            debug!(
                path = %path,
                errors = check_parse_errors(tree).len(),
                "Markup has syntax errors, continuing"
            );
        }

        let lines = LineIndex::new(content);
        let mut summary = FileSummary::new(path, Language::Html);

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node_kind(Language::Html, node.kind()) == NodeKind::Element {
                if let Some(element) = element_from(node, content) {
                    summary.elements.push(element);
                }
                if node.kind() == "script_element" {
                    summary.functions.extend(script_functions(node, content, &lines));
                }
            }
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        summary.imports = SERVER_INCLUDE
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let target = caps.get(1)?.as_str();
                let mut import = Import::new(target, lines.line_of(whole.start()));
                import.is_relative = target.starts_with("./") || target.starts_with("../");
                Some(import)
            })
            .collect();

        for function in &summary.functions {
            registry.register_function(path, function.clone());
        }

        debug!(
            path = %path,
            elements = summary.elements.len(),
            script_functions = summary.functions.len(),
            "Extracted markup file"
        );
        Ok(summary)
    }
}

impl Extractor for MarkupExtractor {
    fn name(&self) -> &'static str {
        "markup"
    }

    fn language(&self) -> Language {
        Language::Html
    }

    fn extract(&self, path: &str, content: &str, registry: &mut Registry) -> Result<FileSummary> {
        let parsed = self
            .parser
            .parse(content, Language::Html)
            .map_err(|e| DistillError::parse_failure(path, e.to_string()))?;
        self.extract_tree(path, content, &parsed.tree, registry)
    }

    fn description(&self) -> &'static str {
        "Syntax-tree extractor for HTML elements and their attributes"
    }
}

/// Build an element from its opening tag.
fn element_from(node: Node, src: &str) -> Option<MarkupElement> {
    let mut cursor = node.walk();
    let tag = node
        .named_children(&mut cursor)
        .find(|c| node_kind(Language::Html, c.kind()) == NodeKind::Tag)?;

    let mut cursor = tag.walk();
    let mut element: Option<MarkupElement> = None;
    for child in tag.named_children(&mut cursor) {
        match child.kind() {
            "tag_name" => {
                element = Some(MarkupElement::new(
                    node_text(child, src).to_ascii_lowercase(),
                    node_line(tag),
                ));
            }
            kind if node_kind(Language::Html, kind) == NodeKind::Attribute => {
                if let (Some(element), Some((name, value))) = (element.as_mut(), attribute(child, src)) {
                    element.set_attribute(name, value);
                }
            }
            _ => {}
        }
    }
    element
}

/// Name and unquoted value of an attribute node; valueless attributes map to
/// the empty string.
fn attribute<'a>(node: Node, src: &'a str) -> Option<(&'a str, &'a str)> {
    let mut name = None;
    let mut value = "";
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "attribute_name" => name = Some(node_text(child, src)),
            "attribute_value" => value = node_text(child, src),
            "quoted_attribute_value" => {
                value = node_text(child, src).trim_matches(|c: char| c == '"' || c == '\'');
            }
            _ => {}
        }
    }
    name.map(|name| (name, value))
}

/// `function name(...)` declarations inside a `<script>` element.
fn script_functions(node: Node, src: &str, lines: &LineIndex) -> Vec<Function> {
    let mut cursor = node.walk();
    let Some(body) = node.named_children(&mut cursor).find(|c| c.kind() == "raw_text") else {
        return Vec::new();
    };
    let text = node_text(body, src);
    SCRIPT_FUNCTION
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            Some(Function::new(
                name.as_str(),
                lines.line_of(body.start_byte() + name.start()),
            ))
        })
        .collect()
}
