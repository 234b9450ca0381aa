//! Core types: the entity model every extractor produces.

mod config;
mod control_flow;
mod entity;
mod markup;
mod summary;

pub use config::DistillerConfig;
pub use control_flow::{ControlFlowCategory, ControlFlowForest, ControlFlowKind, ControlFlowNode, NodeId};
pub use entity::{AggregateType, Function, Import, Interface, Scope, Variable, Visibility};
pub use markup::MarkupElement;
pub use summary::{AnalysisResult, AnalysisStats, Diagnostic, FileSummary};
