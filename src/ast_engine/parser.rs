//! Tree-sitter based AST parser.
//!
//! Builds syntax trees for the grammar-backed languages (Go and HTML) and
//! reports parse errors with their positions.

use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{DistillError, Result};
use crate::processing::Language;
use crate::types::ControlFlowKind;

/// Types of AST nodes relevant for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Function,
    Method,
    TypeDeclaration,
    Variable,
    Constant,
    Import,
    Call,
    ControlFlow(ControlFlowKind),
    Element,
    Tag,
    Attribute,
    Other,
}

/// Result of parsing a source file.
#[derive(Debug)]
pub struct ParsedFile {
    /// The detected language.
    pub language: Language,
    /// The parsed tree.
    pub tree: Tree,
    /// Any parse errors encountered.
    pub parse_errors: Vec<String>,
}

/// Tree-sitter based AST parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct AstParser;

impl AstParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse source code into an AST.
    pub fn parse(&self, content: &str, language: Language) -> Result<ParsedFile> {
        let tree_sitter_lang =
            Self::get_language(language).ok_or_else(|| DistillError::UnsupportedLanguage {
                path: format!("<{}>", language),
            })?;

        // Parser is not Sync; build one per call
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_lang)?;

        let tree = parser
            .parse(content.as_bytes(), None)
            .ok_or_else(|| DistillError::parse_failure(format!("<{}>", language), "parser returned no tree"))?;

        let parse_errors = check_parse_errors(&tree);
        debug!(
            language = %language,
            errors = parse_errors.len(),
            "Parsed source"
        );

        Ok(ParsedFile {
            language,
            tree,
            parse_errors,
        })
    }

    /// Get the tree-sitter language for a language.
    fn get_language(language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Html => Some(tree_sitter_html::LANGUAGE.into()),
            _ => None,
        }
    }
}

/// Collect error and missing nodes in the tree.
pub fn check_parse_errors(tree: &Tree) -> Vec<String> {
    let mut errors = Vec::new();
    if !tree.root_node().has_error() {
        return errors;
    }

    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            errors.push(format!(
                "Parse error at line {}, column {}",
                pos.row + 1,
                pos.column
            ));
            continue;
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    errors
}

/// Source text of a node, or the empty string if it is not valid UTF-8.
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-indexed start line of a node.
pub fn node_line(node: Node) -> usize {
    node.start_position().row + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go() {
        let parser = AstParser::new();
        let code = "package main\n\nfunc main() {\n\tprintln(\"hi\")\n}\n";

        let result = parser.parse(code, Language::Go).unwrap();

        assert!(result.parse_errors.is_empty());
        assert_eq!(result.tree.root_node().kind(), "source_file");
    }

    #[test]
    fn test_parse_errors_reported() {
        let parser = AstParser::new();
        let result = parser.parse("package main\nfunc {{{", Language::Go).unwrap();

        assert!(!result.parse_errors.is_empty());
        assert!(result.parse_errors[0].starts_with("Parse error at line"));
    }

    #[test]
    fn test_parse_html() {
        let parser = AstParser::new();
        let result = parser
            .parse("<div id=\"a\"><p>hi</p></div>", Language::Html)
            .unwrap();
        assert_eq!(result.tree.root_node().kind(), "document");
    }

    #[test]
    fn test_unsupported_language() {
        let parser = AstParser::new();
        assert!(matches!(
            parser.parse("<?php", Language::Php),
            Err(DistillError::UnsupportedLanguage { .. })
        ));
    }
}
