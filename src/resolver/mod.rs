//! Cross-reference resolver.
//!
//! Links markup elements to the backend functions they are believed to
//! trigger. Every rule reads the element's attributes and keeps only names
//! present in the function registry. Rules run in a fixed order and their
//! results are unioned, first discovery first.
//!
//! The rules are heuristics: coincidental substring matches and missed
//! naming conventions are expected outcomes.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::registry::Registry;
use crate::types::MarkupElement;

lazy_static! {
    static ref CALL_TOKEN: Regex = Regex::new(r"([A-Za-z0-9_]+)\(").unwrap();
}

/// Prefix of event-handler attributes (`onclick`, `onsubmit`, ...).
const EVENT_PREFIX: &str = "on";
/// Attribute naming a function explicitly.
const LINKED_FUNCTION_ATTRIBUTE: &str = "data-function";
const CLICK_ATTRIBUTE: &str = "onclick";
const FORM_TARGET_ATTRIBUTE: &str = "action";
const SERVER_SCRIPT_EXTENSION: &str = ".php";
/// Prefix of hypermedia request attributes (`hx-get`, `hx-post`, ...).
const HYPERMEDIA_PREFIX: &str = "hx-";
const PATH_EXTENSIONS: &[&str] = &[".html", ".php"];
const HANDLER_SUFFIXES: &[&str] = &["handler", "endpoint", "controller"];

/// Resolver over a finished run's registry.
#[derive(Debug, Clone, Copy)]
pub struct CrossReferenceResolver<'r> {
    registry: &'r Registry,
}

impl<'r> CrossReferenceResolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Functions an element is believed to trigger.
    ///
    /// Deterministic for a fixed registry and element: attributes are kept in
    /// a sorted map and the registry iterates in name order.
    pub fn resolve(&self, element: &MarkupElement) -> Vec<String> {
        let mut linked = Vec::new();
        self.event_handlers(element, &mut linked);
        self.exact_attribute(element, LINKED_FUNCTION_ATTRIBUTE, &mut linked);
        self.exact_attribute(element, CLICK_ATTRIBUTE, &mut linked);
        self.form_target(element, &mut linked);
        self.hypermedia_paths(element, &mut linked);
        linked
    }

    /// Resolve every element in place, replacing earlier results. Returns the
    /// number of elements left with at least one link.
    pub fn resolve_all<'e>(&self, elements: impl IntoIterator<Item = &'e mut MarkupElement>) -> usize {
        let mut linked = 0;
        for element in elements {
            element.linked_functions = self.resolve(element);
            if !element.linked_functions.is_empty() {
                linked += 1;
                debug!(
                    tag = %element.tag,
                    line = element.line,
                    functions = ?element.linked_functions,
                    "Linked element"
                );
            }
        }
        linked
    }

    /// `on*` attributes whose value holds a call: the identifier before the
    /// first parenthesis.
    fn event_handlers(&self, element: &MarkupElement, linked: &mut Vec<String>) {
        for (name, value) in &element.attributes {
            if !name.starts_with(EVENT_PREFIX) || !value.contains('(') {
                continue;
            }
            let Some(caps) = CALL_TOKEN.captures(value) else {
                continue;
            };
            let candidate = &caps[1];
            if self.registry.contains_function(candidate) {
                push_unique(linked, candidate);
            }
        }
    }

    fn exact_attribute(&self, element: &MarkupElement, attribute: &str, linked: &mut Vec<String>) {
        if let Some(value) = element.attribute(attribute) {
            if self.registry.contains_function(value) {
                push_unique(linked, value);
            }
        }
    }

    /// A form target script `save.php` links `save` and every `save_*`.
    fn form_target(&self, element: &MarkupElement, linked: &mut Vec<String>) {
        let Some(action) = element.attribute(FORM_TARGET_ATTRIBUTE) else {
            return;
        };
        let path = action.split('?').next().unwrap_or(action);
        if !path.ends_with(SERVER_SCRIPT_EXTENSION) {
            return;
        }
        let script = path.rsplit('/').next().unwrap_or(path);
        let candidate = script
            .trim_end_matches(SERVER_SCRIPT_EXTENSION)
            .to_lowercase();
        if candidate.is_empty() {
            return;
        }
        let prefix = format!("{}_", candidate);

        for name in self.registry.function_names() {
            let lower = name.to_lowercase();
            if lower == candidate || lower.starts_with(&prefix) {
                push_unique(linked, name);
            }
        }
    }

    /// `hx-*` attributes holding a path: the last segment against registry
    /// names with handler-style suffixes removed, containment either way.
    fn hypermedia_paths(&self, element: &MarkupElement, linked: &mut Vec<String>) {
        for (name, value) in &element.attributes {
            if !name.starts_with(HYPERMEDIA_PREFIX) || !value.contains('/') {
                continue;
            }
            let segment = value.rsplit('/').next().unwrap_or(value).to_lowercase();
            let segment = strip_any_suffix(&segment, PATH_EXTENSIONS);
            if segment.is_empty() {
                continue;
            }

            for function in self.registry.function_names() {
                let lower = function.to_lowercase();
                let stem = strip_any_suffix(&lower, HANDLER_SUFFIXES);
                if stem.is_empty() {
                    continue;
                }
                if stem.contains(segment) || segment.contains(stem) {
                    push_unique(linked, function);
                }
            }
        }
    }
}

/// Strip the first matching suffix.
fn strip_any_suffix<'a>(text: &'a str, suffixes: &[&str]) -> &'a str {
    suffixes
        .iter()
        .find_map(|suffix| text.strip_suffix(suffix))
        .unwrap_or(text)
}

fn push_unique(linked: &mut Vec<String>, name: &str) {
    if !linked.iter().any(|l| l == name) {
        linked.push(name.to_string());
    }
}
