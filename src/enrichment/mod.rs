//! Import enrichment.
//!
//! This module provides:
//! - Classification of imports as standard library, external, internal or relative

pub mod dependency_parser;

pub use dependency_parser::{DependencyParser, DependencyType};
