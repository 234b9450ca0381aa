//! Run orchestration.
//!
//! An [`Analyzer`] owns the run's [`Registry`] and routes every file to its
//! extractor. Per-file failures are contained: the file gets an empty summary
//! and a [`Diagnostic`], and the run goes on. [`Analyzer::finish`] runs the
//! second pass once every file has been seen.

use chrono::Utc;
use tracing::{debug, info, warn};
use tree_sitter::Tree;
use uuid::Uuid;

use crate::enrichment::DependencyParser;
use crate::error::{DistillError, Result};
use crate::extractors::{Extractor, GoExtractor, MarkupExtractor, PhpExtractor, PythonExtractor};
use crate::processing::{Language, LanguageDetector};
use crate::registry::Registry;
use crate::resolver::CrossReferenceResolver;
use crate::types::{AnalysisResult, AnalysisStats, Diagnostic, DistillerConfig, FileSummary};

/// One extractor per supported language.
struct Extractors {
    go: GoExtractor,
    php: PhpExtractor,
    python: PythonExtractor,
    markup: MarkupExtractor,
}

impl Extractors {
    fn new(config: &DistillerConfig) -> Self {
        Self {
            go: GoExtractor::new(config),
            php: PhpExtractor::new(config),
            python: PythonExtractor::new(config),
            markup: MarkupExtractor::new(),
        }
    }

    fn get(&self, language: Language) -> Option<&dyn Extractor> {
        let all: [&dyn Extractor; 4] = [&self.go, &self.php, &self.python, &self.markup];
        all.into_iter().find(|e| e.supports_language(language))
    }
}

/// Collects per-file summaries for one run.
pub struct Analyzer {
    config: DistillerConfig,
    detector: LanguageDetector,
    dependencies: DependencyParser,
    extractors: Extractors,
    registry: Registry,
    files: Vec<FileSummary>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(DistillerConfig::default())
    }
}

impl Analyzer {
    /// Create an analyzer for a fresh run.
    pub fn new(config: DistillerConfig) -> Self {
        Self {
            detector: LanguageDetector::new(),
            dependencies: DependencyParser::new(),
            extractors: Extractors::new(&config),
            registry: Registry::new(),
            files: Vec::new(),
            diagnostics: Vec::new(),
            config,
        }
    }

    /// Replace the dependency parser, e.g. to declare internal prefixes.
    pub fn with_dependency_parser(mut self, parser: DependencyParser) -> Self {
        self.dependencies = parser;
        self
    }

    /// The extractor handling a language, if any.
    pub fn extractor_for(&self, language: Language) -> Option<&dyn Extractor> {
        self.extractors.get(language)
    }

    /// Extract one file, detecting its language from the path and content.
    ///
    /// # Arguments
    /// * `path` - Path of the file, used for routing and in the output
    /// * `content` - Full text of the file
    ///
    /// # Returns
    /// `Ok` once the file is recorded, even when extraction failed and a
    /// diagnostic was kept instead. The error is returned only when
    /// `continue_on_error` is off.
    pub fn add_source(&mut self, path: &str, content: &str) -> Result<()> {
        let language = self.detector.detect(path, Some(content));
        let extracted = match self.extractors.get(language) {
            Some(extractor) => {
                debug!(path = %path, extractor = extractor.name(), "Routing file");
                extractor.extract(path, content, &mut self.registry)
            }
            None => Err(DistillError::UnsupportedLanguage {
                path: path.to_string(),
            }),
        };
        self.record(path, language, extracted)
    }

    /// Read and extract a file from disk.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected. A
    /// file that cannot be read is recorded like any other per-file failure.
    pub fn add_file(&mut self, path: &str) -> Result<()> {
        match std::fs::read(path) {
            Ok(bytes) => self.add_source(path, &String::from_utf8_lossy(&bytes)),
            Err(e) => {
                let language = self.detector.detect(path, None);
                self.record(path, language, Err(e.into()))
            }
        }
    }

    /// Extract a Go file whose syntax tree the caller already built.
    pub fn add_go_tree(&mut self, path: &str, content: &str, tree: &Tree) -> Result<()> {
        let extracted = self.extractors.go.extract_tree(path, content, tree, &mut self.registry);
        self.record(path, Language::Go, extracted)
    }

    /// Registry as populated so far.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn files(&self) -> &[FileSummary] {
        &self.files
    }

    fn record(&mut self, path: &str, language: Language, extracted: Result<FileSummary>) -> Result<()> {
        match extracted {
            Ok(mut summary) => {
                self.dependencies.classify_imports(&mut summary.imports, language);
                self.files.push(summary);
                Ok(())
            }
            Err(e) => {
                if !self.config.continue_on_error {
                    return Err(e);
                }
                warn!(path = %path, error = %e, "Failed to extract file");
                self.diagnostics.push(Diagnostic {
                    path: path.to_string(),
                    message: e.to_string(),
                });
                self.files.push(FileSummary::new(path, language));
                Ok(())
            }
        }
    }

    /// Run the second pass and produce the result.
    ///
    /// Methods are merged into their owner types, Go summaries pick up the
    /// methods bound to their own types, and markup elements are linked to
    /// functions.
    pub fn finish(mut self) -> AnalysisResult {
        let unbound_methods = self.registry.bind_methods();
        if unbound_methods > 0 {
            debug!(unbound_methods, "Methods without a registered owner type");
        }

        for summary in self.files.iter_mut().filter(|s| s.language == Language::Go) {
            for aggregate in &mut summary.types {
                let owned_here = self
                    .registry
                    .find_locations(&aggregate.name)
                    .contains(&summary.path.as_str());
                if let Some(bound) = self.registry.aggregate_type(&aggregate.name) {
                    if owned_here && bound.line == aggregate.line {
                        aggregate.methods = bound.methods.clone();
                    }
                }
            }
        }

        let mut linked_elements = 0;
        if self.config.resolve_markup {
            let resolver = CrossReferenceResolver::new(&self.registry);
            linked_elements = resolver.resolve_all(self.files.iter_mut().flat_map(|s| s.elements.iter_mut()));
        }

        let stats = AnalysisStats {
            files: self.files.len(),
            failed_files: self.diagnostics.len(),
            functions: self.files.iter().map(|s| s.functions.len()).sum(),
            types: self.files.iter().map(|s| s.types.len()).sum(),
            control_flow_nodes: self.files.iter().map(|s| s.control_flow.len()).sum(),
            elements: self.files.iter().map(|s| s.elements.len()).sum(),
            linked_elements,
            unbound_methods,
        };

        info!(
            files = stats.files,
            failed = stats.failed_files,
            functions = stats.functions,
            types = stats.types,
            linked_elements = stats.linked_elements,
            "Analysis complete"
        );

        AnalysisResult {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            files: self.files,
            registry: self.registry,
            diagnostics: self.diagnostics,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_engine::AstParser;
    use crate::enrichment::DependencyType;
    use pretty_assertions::assert_eq;

    const TYPES_GO: &str = "package shop

type Cart struct {
	Items []string
}
";

    const METHODS_GO: &str = "package shop

import \"fmt\"

func (c *Cart) Add(item string) {
	c.Items = append(c.Items, item)
	fmt.Println(item)
}
";

    #[test]
    fn test_routing_by_language() {
        let analyzer = Analyzer::default();
        assert_eq!(analyzer.extractor_for(Language::Go).map(|e| e.name()), Some("go"));
        assert_eq!(analyzer.extractor_for(Language::Php).map(|e| e.name()), Some("php"));
        assert_eq!(analyzer.extractor_for(Language::Python).map(|e| e.name()), Some("python"));
        assert_eq!(analyzer.extractor_for(Language::Html).map(|e| e.name()), Some("markup"));
        assert!(analyzer.extractor_for(Language::Unknown).is_none());
    }

    #[test]
    fn test_method_merge_order_independent() {
        let mut types_first = Analyzer::default();
        types_first.add_source("types.go", TYPES_GO).unwrap();
        types_first.add_source("methods.go", METHODS_GO).unwrap();

        let mut methods_first = Analyzer::default();
        methods_first.add_source("methods.go", METHODS_GO).unwrap();
        methods_first.add_source("types.go", TYPES_GO).unwrap();

        let a = types_first.finish();
        let b = methods_first.finish();

        assert_eq!(a.registry.aggregate_type("Cart"), b.registry.aggregate_type("Cart"));
        let cart = a.file("types.go").and_then(|f| f.aggregate_type("Cart")).unwrap();
        assert_eq!(cart.methods.len(), 1);
        assert_eq!(cart.methods[0].name, "Add");
        assert_eq!(cart.methods[0].calls, vec!["append", "fmt.Println"]);
        assert_eq!(a.stats.unbound_methods, 0);
    }

    #[test]
    fn test_parse_failure_is_contained() {
        let mut analyzer = Analyzer::default();
        analyzer.add_source("broken.go", "package main\nfunc {{{").unwrap();
        analyzer.add_source("ok.py", "def run():\n    pass\n").unwrap();
        analyzer.add_source("notes.txt", "plain text").unwrap();

        let result = analyzer.finish();

        assert_eq!(result.files.len(), 3);
        assert!(result.file("broken.go").unwrap().is_empty());
        assert!(result.file("ok.py").unwrap().function("run").is_some());
        let failed: Vec<&str> = result.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(failed, vec!["broken.go", "notes.txt"]);
        assert_eq!(result.stats.failed_files, 2);
    }

    #[test]
    fn test_errors_propagate_when_not_contained() {
        let config = DistillerConfig {
            continue_on_error: false,
            ..DistillerConfig::default()
        };
        let mut analyzer = Analyzer::new(config);

        let err = analyzer.add_source("broken.go", "package main\nfunc {{{").unwrap_err();
        assert!(matches!(err, DistillError::ParseFailure { .. }));
    }

    #[test]
    fn test_pre_parsed_go_tree() {
        let parsed = AstParser::new().parse(TYPES_GO, Language::Go).unwrap();
        let mut analyzer = Analyzer::default();
        analyzer.add_go_tree("types.go", TYPES_GO, &parsed.tree).unwrap();

        assert!(analyzer.registry().aggregate_type("Cart").is_some());
        assert_eq!(analyzer.files().len(), 1);
    }

    #[test]
    fn test_markup_links_after_all_files() {
        let mut analyzer = Analyzer::default();
        // markup seen before the backend that defines the handler
        analyzer
            .add_source("index.html", "<form action=\"save.php\"><button onclick=\"save_draft()\">Go</button></form>")
            .unwrap();
        analyzer
            .add_source(
                "save.php",
                "<?php\nfunction save() {}\nfunction save_draft() {}\nfunction load() {}\n",
            )
            .unwrap();

        let result = analyzer.finish();
        let page = result.file("index.html").unwrap();

        assert_eq!(page.elements[0].tag, "form");
        assert_eq!(page.elements[0].linked_functions, vec!["save", "save_draft"]);
        assert_eq!(page.elements[1].linked_functions, vec!["save_draft"]);
        assert_eq!(result.stats.linked_elements, 2);
    }

    #[test]
    fn test_resolution_can_be_disabled() {
        let config = DistillerConfig {
            resolve_markup: false,
            ..DistillerConfig::default()
        };
        let mut analyzer = Analyzer::new(config);
        analyzer.add_source("a.php", "<?php\nfunction go_home() {}\n").unwrap();
        analyzer.add_source("a.html", "<a onclick=\"go_home()\">home</a>").unwrap();

        let result = analyzer.finish();
        assert!(result.file("a.html").unwrap().elements[0].linked_functions.is_empty());
    }

    #[test]
    fn test_imports_are_classified() {
        let parser = DependencyParser::new().with_internal_prefixes(vec!["myapp".to_string()]);
        let mut analyzer = Analyzer::default().with_dependency_parser(parser);
        analyzer
            .add_source(
                "app.py",
                "import os\nimport requests\nfrom . import views\nfrom myapp.models import User\n",
            )
            .unwrap();

        let result = analyzer.finish();
        let origins: Vec<DependencyType> = result.files[0].imports.iter().map(|i| i.origin).collect();
        assert_eq!(
            origins,
            vec![
                DependencyType::StandardLib,
                DependencyType::External,
                DependencyType::Relative,
                DependencyType::Internal,
            ]
        );
    }

    #[test]
    fn test_undecodable_and_missing_files_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let latin1 = dir.path().join("latin1.php");
        std::fs::write(&latin1, b"<?php\n// caf\xe9\nfunction greet() {}\n").unwrap();
        let ok = dir.path().join("ok.py");
        std::fs::write(&ok, "def run():\n    pass\n").unwrap();
        let missing = dir.path().join("missing.py");

        let mut analyzer = Analyzer::default();
        for path in [&latin1, &missing, &ok] {
            analyzer.add_file(path.to_str().unwrap()).unwrap();
        }
        let result = analyzer.finish();

        assert_eq!(result.files.len(), 3);
        assert!(result.files[0].function("greet").is_some());
        assert!(result.files[1].is_empty());
        assert!(result.files[2].function("run").is_some());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].path, missing.to_str().unwrap());
    }
}
