//! Per-file summaries and run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AggregateType, ControlFlowForest, Function, Import, Interface, MarkupElement, Variable};
use crate::processing::Language;
use crate::registry::Registry;

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<Function>,
    #[serde(default, skip_serializing_if = "ControlFlowForest::is_empty")]
    pub control_flow: ControlFlowForest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<AggregateType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
    /// Decorator names used anywhere in the file, deduplicated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<MarkupElement>,
}

impl FileSummary {
    /// An empty summary for `path`.
    pub fn new(path: impl Into<String>, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
            variables: Vec::new(),
            functions: Vec::new(),
            control_flow: ControlFlowForest::new(),
            types: Vec::new(),
            interfaces: Vec::new(),
            imports: Vec::new(),
            decorators: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Whether nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.functions.is_empty()
            && self.control_flow.is_empty()
            && self.types.is_empty()
            && self.interfaces.is_empty()
            && self.imports.is_empty()
            && self.elements.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn aggregate_type(&self, name: &str) -> Option<&AggregateType> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// A contained per-file failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub files: usize,
    pub failed_files: usize,
    pub functions: usize,
    pub types: usize,
    pub control_flow_nodes: usize,
    pub elements: usize,
    pub linked_elements: usize,
    pub unbound_methods: usize,
}

/// Output of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<FileSummary>,
    pub registry: Registry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    pub fn file(&self, path: &str) -> Option<&FileSummary> {
        self.files.iter().find(|f| f.path == path)
    }
}
