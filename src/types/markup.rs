//! Markup elements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One element from a markup document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkupElement {
    /// Tag name, lowercased.
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Class tokens, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Remaining attributes (everything except `id` and `class`), keyed by
    /// lowercased name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Source line (1-indexed).
    pub line: usize,
    /// Functions this element is believed to trigger; filled by the resolver.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_functions: Vec<String>,
}

impl MarkupElement {
    pub fn new(tag: impl Into<String>, line: usize) -> Self {
        Self {
            tag: tag.into(),
            line,
            ..Default::default()
        }
    }

    /// Route an attribute into `id`, `classes` or the attribute map.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "id" => self.id = Some(value.to_string()),
            "class" => self.classes = value.split_whitespace().map(String::from).collect(),
            _ => {
                self.attributes.insert(name, value.to_string());
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attribute_routes_id_and_class() {
        let mut el = MarkupElement::new("button", 4);
        el.set_attribute("ID", "save");
        el.set_attribute("class", "btn  btn-primary");
        el.set_attribute("onClick", "save()");

        assert_eq!(el.id.as_deref(), Some("save"));
        assert_eq!(el.classes, vec!["btn", "btn-primary"]);
        assert_eq!(el.attribute("onclick"), Some("save()"));
        assert!(el.attribute("id").is_none());
    }
}
