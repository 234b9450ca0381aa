//! Distiller Library
//!
//! Condenses source trees into a language-agnostic inventory of variables,
//! functions, types, interfaces, imports and control-flow shape. Go is read
//! through its tree-sitter grammar, PHP through brace counting, Python
//! through indentation, and HTML elements are linked back to the functions
//! they trigger.

pub mod analyzer;
pub mod ast_engine;
pub mod enrichment;
pub mod error;
pub mod extractors;
pub mod processing;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod types;

pub use analyzer::Analyzer;
pub use error::{DistillError, Result};
pub use extractors::{Extractor, GoExtractor, MarkupExtractor, PhpExtractor, PythonExtractor};
pub use registry::Registry;
pub use resolver::CrossReferenceResolver;
pub use types::{AnalysisResult, DistillerConfig, FileSummary};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analyzer::Analyzer;
    pub use crate::extractors::Extractor;
    pub use crate::processing::Language;
    pub use crate::registry::Registry;
    pub use crate::types::*;
}

/// Default maximum control-flow nesting explored per file
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 128;

/// Default number of lines scanned above a callable for decorators
pub const DEFAULT_DECORATOR_WINDOW: usize = 8;
