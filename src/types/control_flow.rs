//! Control-flow forest.
//!
//! Nodes live in a flat arena and refer to each other by index, so the forest
//! is acyclic by construction and serializes as plain data.

use serde::{Deserialize, Serialize};

/// Kind of control-flow construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFlowKind {
    If,
    For,
    Foreach,
    While,
    Switch,
    Select,
    Try,
    With,
}

/// Coarse grouping of control-flow kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFlowCategory {
    Branch,
    Loop,
    Switch,
    ExceptionGuard,
    ResourceScope,
}

impl ControlFlowKind {
    pub fn category(&self) -> ControlFlowCategory {
        match self {
            ControlFlowKind::If => ControlFlowCategory::Branch,
            ControlFlowKind::For | ControlFlowKind::Foreach | ControlFlowKind::While => {
                ControlFlowCategory::Loop
            }
            ControlFlowKind::Switch | ControlFlowKind::Select => ControlFlowCategory::Switch,
            ControlFlowKind::Try => ControlFlowCategory::ExceptionGuard,
            ControlFlowKind::With => ControlFlowCategory::ResourceScope,
        }
    }

    /// Keyword spelling, as used by the pattern-based extractors.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "if" | "elif" | "elseif" => Some(ControlFlowKind::If),
            "for" => Some(ControlFlowKind::For),
            "foreach" => Some(ControlFlowKind::Foreach),
            "while" | "do" => Some(ControlFlowKind::While),
            "switch" | "match" => Some(ControlFlowKind::Switch),
            "select" => Some(ControlFlowKind::Select),
            "try" => Some(ControlFlowKind::Try),
            "with" => Some(ControlFlowKind::With),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlFlowKind::If => "if",
            ControlFlowKind::For => "for",
            ControlFlowKind::Foreach => "foreach",
            ControlFlowKind::While => "while",
            ControlFlowKind::Switch => "switch",
            ControlFlowKind::Select => "select",
            ControlFlowKind::Try => "try",
            ControlFlowKind::With => "with",
        }
    }
}

/// Index of a node inside a [`ControlFlowForest`].
pub type NodeId = usize;

/// One recognized construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlowNode {
    pub kind: ControlFlowKind,
    /// Source line (1-indexed).
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Constructs strictly nested in this node's body, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

/// Per-file control-flow forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlowForest {
    pub nodes: Vec<ControlFlowNode>,
    pub roots: Vec<NodeId>,
}

impl ControlFlowForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node under `parent` (or as a root) and return its id.
    pub fn push(&mut self, kind: ControlFlowKind, line: usize, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(ControlFlowNode {
            kind,
            line,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&ControlFlowNode> {
        self.nodes.get(id)
    }

    /// Children of `id`, resolved to nodes.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &ControlFlowNode> + '_ {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&c| self.nodes.get(c))
    }

    /// Root nodes, resolved.
    pub fn root_nodes(&self) -> impl Iterator<Item = &ControlFlowNode> + '_ {
        self.roots.iter().filter_map(move |&r| self.nodes.get(r))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest root-to-leaf chain length (0 for an empty forest).
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().map(|&r| (r, 1)).collect();
        while let Some((id, d)) = stack.pop() {
            max = max.max(d);
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().map(|&c| (c, d + 1)));
            }
        }
        max
    }
}
