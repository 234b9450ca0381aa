//! Language-specific node type mappings.
//!
//! Maps tree-sitter node types to [`NodeKind`] for each grammar-backed
//! language, so extractors dispatch on a closed enum instead of raw strings.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::ast_engine::parser::NodeKind;
use crate::processing::Language;
use crate::types::ControlFlowKind;

lazy_static! {
    static ref GO_NODE_TYPES: HashMap<&'static str, NodeKind> = go_node_types();
    static ref HTML_NODE_TYPES: HashMap<&'static str, NodeKind> = html_node_types();
    static ref EMPTY: HashMap<&'static str, NodeKind> = HashMap::new();
}

/// Get the node type mappings for a language.
fn get_node_types(language: Language) -> &'static HashMap<&'static str, NodeKind> {
    match language {
        Language::Go => &GO_NODE_TYPES,
        Language::Html => &HTML_NODE_TYPES,
        _ => &EMPTY,
    }
}

/// Classify a single node kind.
pub fn node_kind(language: Language, kind: &str) -> NodeKind {
    get_node_types(language)
        .get(kind)
        .copied()
        .unwrap_or(NodeKind::Other)
}

/// Go node type mappings.
fn go_node_types() -> HashMap<&'static str, NodeKind> {
    [
        ("function_declaration", NodeKind::Function),
        ("method_declaration", NodeKind::Method),
        ("type_declaration", NodeKind::TypeDeclaration),
        ("var_declaration", NodeKind::Variable),
        ("const_declaration", NodeKind::Constant),
        ("import_declaration", NodeKind::Import),
        ("call_expression", NodeKind::Call),
        ("if_statement", NodeKind::ControlFlow(ControlFlowKind::If)),
        ("for_statement", NodeKind::ControlFlow(ControlFlowKind::For)),
        ("expression_switch_statement", NodeKind::ControlFlow(ControlFlowKind::Switch)),
        ("type_switch_statement", NodeKind::ControlFlow(ControlFlowKind::Switch)),
        ("select_statement", NodeKind::ControlFlow(ControlFlowKind::Select)),
    ]
    .into_iter()
    .collect()
}

/// HTML node type mappings.
fn html_node_types() -> HashMap<&'static str, NodeKind> {
    [
        ("element", NodeKind::Element),
        ("script_element", NodeKind::Element),
        ("style_element", NodeKind::Element),
        ("start_tag", NodeKind::Tag),
        ("self_closing_tag", NodeKind::Tag),
        ("attribute", NodeKind::Attribute),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_control_flow_kinds() {
        assert_eq!(
            node_kind(Language::Go, "type_switch_statement"),
            NodeKind::ControlFlow(ControlFlowKind::Switch)
        );
        assert_eq!(node_kind(Language::Go, "method_declaration"), NodeKind::Method);
        assert_eq!(node_kind(Language::Go, "block"), NodeKind::Other);
    }

    #[test]
    fn test_unmapped_language_is_empty() {
        assert!(get_node_types(Language::Python).is_empty());
        assert_eq!(node_kind(Language::Html, "self_closing_tag"), NodeKind::Tag);
    }
}
