//! Processing module for routing files to extractors.
//!
//! This module provides:
//! - Language detection from file extensions and content

pub mod language;

pub use language::{Language, LanguageDetector};
