//! Scope-boundary detectors.
//!
//! Each detector answers two questions for its block convention: where does
//! the block starting at a position end, and is a position inside a callable
//! or type body.
//!
//! - [`SyntaxScope`]: spans taken from a tree-sitter syntax tree
//! - [`DelimitedScope`]: brace counting over raw text, skipping string literals
//! - [`IndentedScope`]: relative indentation of logical lines

pub mod delimited;
pub mod indented;
pub mod tree;

pub use delimited::{DelimitedScope, TypeKeyword, TypeSpan};
pub use indented::{Enclosing, HeaderKind, IndentedScope, LineInfo};
pub use tree::SyntaxScope;

/// Block-boundary queries shared by every detector.
///
/// `Pos` is the detector's native position: a byte offset for the syntax
/// tree and delimited detectors, a 0-indexed line for the indented one.
pub trait BlockScope {
    type Pos: Copy;

    /// End of the block that opens at or after `start`; `None` when no block
    /// opens there or it never closes.
    fn block_end(&self, start: Self::Pos) -> Option<Self::Pos>;

    /// Whether `pos` lies inside a function or method body.
    fn is_within_callable(&self, pos: Self::Pos) -> bool;

    /// Whether `pos` lies inside an aggregate type body.
    fn is_within_type(&self, pos: Self::Pos) -> bool;
}

/// Maps byte offsets to 1-indexed line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// 1-indexed line containing byte `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(1), 1);
        assert_eq!(index.line_of(2), 2);
        assert_eq!(index.line_of(5), 3);
        assert_eq!(index.line_of(6), 4);
    }
}
