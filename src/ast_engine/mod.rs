//! AST Engine module for grammar-backed parsing.
//!
//! This module provides:
//! - Tree-sitter based parsing for Go and HTML
//! - Node type tables mapping grammar kinds onto [`NodeKind`]
//! - Small node helpers (text, line) shared by the extractors

pub mod languages;
pub mod parser;

pub use languages::node_kind;
pub use parser::{check_parse_errors, node_line, node_text, AstParser, NodeKind, ParsedFile};
