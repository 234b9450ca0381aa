//! Per-language entity extractors.

mod base;
mod go;
mod markup;
mod php;
mod python;

pub use base::{ends_with_word, infer_literal_type, split_top_level, Extractor};
pub use go::GoExtractor;
pub use markup::MarkupExtractor;
pub use php::PhpExtractor;
pub use python::PythonExtractor;
