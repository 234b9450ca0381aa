//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_DECORATOR_WINDOW, DEFAULT_MAX_NESTING_DEPTH};

/// Distiller run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistillerConfig {
    /// Deepest control-flow nesting explored; deeper constructs become leaves.
    pub max_nesting_depth: usize,

    /// Lines scanned above a callable header for decorators.
    pub decorator_window: usize,

    /// Whether `Analyzer::finish` links markup elements to functions.
    pub resolve_markup: bool,

    /// Contain per-file failures instead of returning them.
    pub continue_on_error: bool,
}

impl Default for DistillerConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            decorator_window: DEFAULT_DECORATOR_WINDOW,
            resolve_markup: true,
            continue_on_error: true,
        }
    }
}

impl DistillerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_nesting_depth: std::env::var("DISTILLER_MAX_NESTING_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_NESTING_DEPTH),
            decorator_window: std::env::var("DISTILLER_DECORATOR_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DECORATOR_WINDOW),
            resolve_markup: std::env::var("DISTILLER_RESOLVE_MARKUP")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
            continue_on_error: std::env::var("DISTILLER_CONTINUE_ON_ERROR")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
        }
    }

    /// Set the nesting limit.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Set the decorator look-back window.
    pub fn with_decorator_window(mut self, lines: usize) -> Self {
        self.decorator_window = lines;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
