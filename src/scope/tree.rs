//! Syntax-tree scope detection.
//!
//! Block boundaries come straight from the tree: a body is the span between
//! the `{` and `}` tokens of a function, method, closure, struct or interface
//! node.

use tree_sitter::{Node, Tree};

use super::BlockScope;

const CALLABLE_KINDS: &[&str] = &["function_declaration", "method_declaration", "func_literal"];
const TYPE_KINDS: &[&str] = &["struct_type", "interface_type"];
const BLOCK_KINDS: &[&str] = &["block", "field_declaration_list", "interface_type"];

/// Scope detector backed by a tree-sitter tree. Positions are byte offsets.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxScope<'t> {
    root: Node<'t>,
}

impl<'t> SyntaxScope<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Self {
            root: tree.root_node(),
        }
    }

    /// Offsets of the `{` and `}` tokens delimiting `node`'s body.
    pub fn brace_span(node: Node<'_>) -> Option<(usize, usize)> {
        let body = node
            .child_by_field_name("body")
            .or_else(|| {
                let mut cursor = node.walk();
                let list = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "field_declaration_list");
                list
            })
            .unwrap_or(node);

        let mut open = None;
        let mut close = None;
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            match child.kind() {
                "{" if open.is_none() => open = Some(child.start_byte()),
                "}" => close = Some(child.start_byte()),
                _ => {}
            }
        }
        Some((open?, close?))
    }

    /// Whether any ancestor of the node at `pos` with one of `kinds` has a
    /// body strictly containing `pos`.
    fn enclosed_by(&self, pos: usize, kinds: &[&str]) -> bool {
        let Some(mut node) = self.root.descendant_for_byte_range(pos, pos) else {
            return false;
        };
        loop {
            if kinds.contains(&node.kind()) {
                if let Some((open, close)) = Self::brace_span(node) {
                    if open < pos && pos < close {
                        return true;
                    }
                }
            }
            match node.parent() {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// First block-like node starting at or after `start`, in document order.
    fn first_block_from(&self, start: usize) -> Option<Node<'t>> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if node.end_byte() <= start {
                continue;
            }
            if node.start_byte() >= start && BLOCK_KINDS.contains(&node.kind()) {
                return Some(node);
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }
}

impl BlockScope for SyntaxScope<'_> {
    type Pos = usize;

    fn block_end(&self, start: usize) -> Option<usize> {
        let block = self.first_block_from(start)?;
        Self::brace_span(block).map(|(_, close)| close)
    }

    fn is_within_callable(&self, pos: usize) -> bool {
        self.enclosed_by(pos, CALLABLE_KINDS)
    }

    fn is_within_type(&self, pos: usize) -> bool {
        self.enclosed_by(pos, TYPE_KINDS)
    }
}
