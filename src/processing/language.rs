//! Source language definitions and detection.
//!
//! Routes a file to its extractor via file extension, well-known filenames
//! and, for extensionless scripts, the shebang line.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Php,
    Python,
    Html,
    Unknown,
}

impl Language {
    /// Get a string representation of the language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Php => "php",
            Language::Python => "python",
            Language::Html => "html",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language detector using extension and content analysis.
pub struct LanguageDetector {
    extension_map: HashMap<String, Language>,
    filename_map: HashMap<String, Language>,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector {
    /// Create a new language detector with default mappings.
    pub fn new() -> Self {
        let mut extension_map = HashMap::new();
        let mut filename_map = HashMap::new();

        // Go
        extension_map.insert(".go".to_string(), Language::Go);

        // PHP
        for ext in &[".php", ".phtml", ".php5", ".php7", ".inc"] {
            extension_map.insert(ext.to_string(), Language::Php);
        }

        // Python
        for ext in &[".py", ".pyi", ".pyw"] {
            extension_map.insert(ext.to_string(), Language::Python);
        }

        // Markup
        for ext in &[".html", ".htm", ".xhtml"] {
            extension_map.insert(ext.to_string(), Language::Html);
        }

        // Filename mappings
        filename_map.insert("SConstruct".to_string(), Language::Python);
        filename_map.insert("SConscript".to_string(), Language::Python);
        filename_map.insert("wscript".to_string(), Language::Python);

        Self {
            extension_map,
            filename_map,
        }
    }

    /// Detect language from file path and optional content.
    pub fn detect(&self, path: &str, content: Option<&str>) -> Language {
        let path = Path::new(path);
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if let Some(&lang) = self.filename_map.get(filename) {
            return lang;
        }

        let ext_key = format!(".{}", extension.to_lowercase());
        if let Some(&lang) = self.extension_map.get(&ext_key) {
            return lang;
        }

        if let Some(content) = content {
            if content.starts_with("#!") {
                let first_line = content.lines().next().unwrap_or("");
                return self.detect_from_shebang(first_line);
            }
            if content.trim_start().starts_with("<?php") {
                return Language::Php;
            }
        }

        Language::Unknown
    }

    /// Detect language from shebang line.
    fn detect_from_shebang(&self, shebang: &str) -> Language {
        let lower = shebang.to_lowercase();

        if lower.contains("python") {
            Language::Python
        } else if lower.contains("php") {
            Language::Php
        } else {
            Language::Unknown
        }
    }
}
