//! Dependency parser for classifying imports.
//!
//! Tags every [`Import`] with where it points: the language's standard
//! library, a third-party package, a module of the analysed project, or a
//! path relative to the importing file.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::processing::Language;
use crate::types::Import;

/// Type of dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Standard library import.
    StandardLib,
    /// Third-party/external package.
    External,
    /// Module of the analysed project.
    Internal,
    /// Path relative to the importing file.
    Relative,
    /// Not classified yet.
    #[default]
    Unknown,
}

/// Parser for analyzing dependencies.
#[derive(Debug, Clone)]
pub struct DependencyParser {
    /// Known standard library modules by language.
    standard_libs: HashMap<Language, HashSet<&'static str>>,
    /// Known internal module prefixes.
    internal_prefixes: Vec<String>,
}

impl Default for DependencyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyParser {
    /// Create a new dependency parser with default settings.
    pub fn new() -> Self {
        let mut standard_libs = HashMap::new();

        // Python standard library (common modules)
        standard_libs.insert(
            Language::Python,
            [
                "os", "sys", "re", "json", "math", "datetime", "collections", "itertools",
                "functools", "typing", "pathlib", "dataclasses", "abc", "asyncio", "concurrent",
                "contextlib", "copy", "csv", "enum", "glob", "hashlib", "http", "io", "logging",
                "pickle", "random", "shutil", "socket", "sqlite3", "string", "subprocess",
                "tempfile", "threading", "time", "traceback", "unittest", "urllib", "uuid",
                "warnings", "xml", "zipfile", "argparse", "base64", "struct", "queue",
            ]
            .into_iter()
            .collect(),
        );

        // PHP namespaces shipped with the runtime
        standard_libs.insert(
            Language::Php,
            ["DateTime", "DateTimeImmutable", "Exception", "PDO", "SplObjectStorage", "ArrayObject", "Closure", "Generator", "Throwable", "JsonSerializable", "Countable", "Stringable"]
                .into_iter()
                .collect(),
        );

        Self {
            standard_libs,
            internal_prefixes: Vec::new(),
        }
    }

    /// Set internal module prefixes.
    pub fn with_internal_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.internal_prefixes = prefixes;
        self
    }

    /// Fill in [`Import::origin`] for every import of a file.
    pub fn classify_imports(&self, imports: &mut [Import], language: Language) {
        for import in imports.iter_mut() {
            import.origin = self.classify(import, language);
        }
    }

    /// Classify a single import.
    pub fn classify(&self, import: &Import, language: Language) -> DependencyType {
        let module = import.module.as_str();
        if import.is_relative || module.starts_with("./") || module.starts_with("../") {
            return DependencyType::Relative;
        }

        if self.internal_prefixes.iter().any(|p| module.starts_with(p.as_str())) {
            return DependencyType::Internal;
        }

        match language {
            // Standard library paths never carry a domain in their first element
            Language::Go => {
                let first = module.split('/').next().unwrap_or(module);
                if first.contains('.') {
                    DependencyType::External
                } else {
                    DependencyType::StandardLib
                }
            }
            Language::Php | Language::Html if is_file_path(module) => DependencyType::Internal,
            _ => {
                let root = module
                    .trim_start_matches('\\')
                    .split(&['.', '/', '\\'][..])
                    .next()
                    .unwrap_or(module);
                let is_std = self
                    .standard_libs
                    .get(&language)
                    .is_some_and(|libs| libs.contains(root));
                if is_std {
                    DependencyType::StandardLib
                } else {
                    DependencyType::External
                }
            }
        }
    }
}

/// Whether an include target names a file rather than a namespace.
fn is_file_path(module: &str) -> bool {
    module.contains('/') || module.ends_with(".php") || module.ends_with(".inc") || module.ends_with(".html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_import(module: &str, is_relative: bool) -> Import {
        let mut import = Import::new(module, 1);
        import.is_relative = is_relative;
        import
    }

    #[test]
    fn test_python_stdlib_detection() {
        let parser = DependencyParser::new();
        let mut imports = vec![
            create_import("os", false),
            create_import("json.decoder", false),
            create_import("requests", false),
            create_import(".utils", true),
        ];

        parser.classify_imports(&mut imports, Language::Python);

        let origins: Vec<DependencyType> = imports.iter().map(|i| i.origin).collect();
        assert_eq!(
            origins,
            vec![
                DependencyType::StandardLib,
                DependencyType::StandardLib,
                DependencyType::External,
                DependencyType::Relative,
            ]
        );
    }

    #[test]
    fn test_go_domain_rule() {
        let parser = DependencyParser::new();
        assert_eq!(parser.classify(&create_import("net/http", false), Language::Go), DependencyType::StandardLib);
        assert_eq!(
            parser.classify(&create_import("github.com/pkg/errors", false), Language::Go),
            DependencyType::External
        );
        assert_eq!(parser.classify(&create_import("./local", true), Language::Go), DependencyType::Relative);
    }

    #[test]
    fn test_php_includes_and_namespaces() {
        let parser = DependencyParser::new();
        assert_eq!(parser.classify(&create_import("config.php", false), Language::Php), DependencyType::Internal);
        assert_eq!(parser.classify(&create_import("../lib/a.php", true), Language::Php), DependencyType::Relative);
        assert_eq!(parser.classify(&create_import("Monolog\\Logger", false), Language::Php), DependencyType::External);
        assert_eq!(parser.classify(&create_import("\\DateTime", false), Language::Php), DependencyType::StandardLib);
    }

    #[test]
    fn test_internal_prefix() {
        let parser = DependencyParser::new()
            .with_internal_prefixes(vec!["myapp".to_string(), "example.com/svc".to_string()]);

        assert_eq!(
            parser.classify(&create_import("myapp.services.user", false), Language::Python),
            DependencyType::Internal
        );
        assert_eq!(
            parser.classify(&create_import("example.com/svc/store", false), Language::Go),
            DependencyType::Internal
        );
        assert_eq!(parser.classify(&create_import("requests", false), Language::Python), DependencyType::External);
    }
}
