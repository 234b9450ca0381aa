//! Language-agnostic code entities.
//!
//! Every extractor speaks this vocabulary, so a Go struct, a PHP class and a
//! Python class all end up as the same [`AggregateType`].

use serde::{Deserialize, Serialize};

use crate::enrichment::DependencyType;

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Local,
    Parameter,
    Field,
    ClassAttribute,
}

/// Declared visibility of a member, when the language spells it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Parse a visibility keyword (case-insensitive).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "public" | "var" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// A variable, parameter, field or class attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Bare name, without sigils.
    pub name: String,
    /// Best-effort type string ("inferred" when nothing better is known).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Scope tag.
    pub scope: Scope,
    /// Source line (1-indexed).
    pub line: usize,
    /// Declared visibility (delimiter-language properties only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, scope: Scope, line: usize) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            scope,
            line,
            visibility: None,
        }
    }

    /// Attach a visibility modifier.
    pub fn with_visibility(mut self, visibility: Option<Visibility>) -> Self {
        self.visibility = visibility;
        self
    }
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Ordered parameters.
    #[serde(default)]
    pub args: Vec<Variable>,
    /// Ordered return type strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<String>,
    /// Owning type; present means this is a method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Source line (1-indexed).
    pub line: usize,
    /// Call targets, deduplicated, in first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
    /// Decorator names (indentation language only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
}

impl Function {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            ..Default::default()
        }
    }

    /// Whether this function is bound to an owner type.
    pub fn is_method(&self) -> bool {
        self.owner.is_some()
    }

    /// Record a call target unless it was already seen.
    pub fn add_call(&mut self, target: impl Into<String>) {
        let target = target.into();
        if !self.calls.contains(&target) {
            self.calls.push(target);
        }
    }
}

/// A struct/class-like grouping of fields and methods.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateType {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<Function>,
    /// Base classes, extended types and implemented interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    pub line: usize,
}

impl AggregateType {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            ..Default::default()
        }
    }

    /// Insert a field; a field with the same name is overwritten in place.
    pub fn upsert_field(&mut self, field: Variable) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Insert a method; a method with the same name is overwritten in place.
    pub fn upsert_method(&mut self, method: Function) {
        match self.methods.iter_mut().find(|m| m.name == method.name) {
            Some(existing) => *existing = method,
            None => self.methods.push(method),
        }
    }
}

/// An interface: method signatures only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<Function>,
    pub line: usize,
}

/// An import, include or require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// The module, package or file being imported.
    pub module: String,
    /// Specific items imported (if any).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    /// Alias (if any).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Line number.
    pub line: usize,
    /// Whether this is a relative import.
    pub is_relative: bool,
    /// Where the import points, filled by the dependency parser.
    pub origin: DependencyType,
}

impl Import {
    pub fn new(module: impl Into<String>, line: usize) -> Self {
        Self {
            module: module.into(),
            items: Vec::new(),
            alias: None,
            line,
            is_relative: false,
            origin: DependencyType::Unknown,
        }
    }
}
