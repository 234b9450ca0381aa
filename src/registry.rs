//! Run-scoped global registries.
//!
//! One [`Registry`] is created per run and threaded through every extractor
//! call. Functions and aggregate types are keyed by bare name with
//! last-write-wins on collision; there is no namespacing. Methods whose owner
//! may be declared in a later file are queued and merged by
//! [`Registry::bind_methods`] once every file has been scanned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AggregateType, Function};

/// Name-keyed function and type registries shared across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Map of function name -> function
    pub functions: BTreeMap<String, Function>,
    /// Map of type name -> aggregate type
    pub types: BTreeMap<String, AggregateType>,
    /// Map of symbol name -> defining file paths
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locations: BTreeMap<String, Vec<String>>,
    /// Owner-bound methods awaiting the merge pass
    #[serde(skip)]
    pending_methods: Vec<Function>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function defined in a file, replacing any same-named entry.
    pub fn register_function(&mut self, file_path: &str, function: Function) {
        self.record_location(&function.name, file_path);
        self.functions.insert(function.name.clone(), function);
    }

    /// Register an aggregate type defined in a file, replacing any same-named entry.
    pub fn register_type(&mut self, file_path: &str, aggregate: AggregateType) {
        self.record_location(&aggregate.name, file_path);
        self.types.insert(aggregate.name.clone(), aggregate);
    }

    /// Queue a method for binding to its owner type.
    ///
    /// Methods without an owner are ignored.
    pub fn register_method(&mut self, method: Function) {
        if method.owner.is_some() {
            self.pending_methods.push(method);
        }
    }

    /// Merge queued methods into their owner types.
    ///
    /// A same-named method on the owner is replaced, so calling this more than
    /// once leaves the registry unchanged. Returns how many queued methods have
    /// no registered owner.
    pub fn bind_methods(&mut self) -> usize {
        let mut unbound = 0;
        for method in &self.pending_methods {
            let Some(owner) = method.owner.as_deref() else {
                continue;
            };
            match self.types.get_mut(owner) {
                Some(aggregate) => aggregate.upsert_method(method.clone()),
                None => {
                    debug!(method = %method.name, owner = %owner, "Method owner not registered");
                    unbound += 1;
                }
            }
        }
        unbound
    }

    /// Merge a shard registry into this one; entries from `other` win.
    pub fn absorb(&mut self, other: Registry) {
        self.functions.extend(other.functions);
        self.types.extend(other.types);
        for (name, paths) in other.locations {
            let entry = self.locations.entry(name).or_default();
            for path in paths {
                if !entry.contains(&path) {
                    entry.push(path);
                }
            }
        }
        self.pending_methods.extend(other.pending_methods);
    }

    /// Exact-name function lookup.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Exact-name type lookup.
    pub fn aggregate_type(&self, name: &str) -> Option<&AggregateType> {
        self.types.get(name)
    }

    pub fn contains_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered function names in sorted order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Files that define a given symbol.
    pub fn find_locations(&self, name: &str) -> Vec<&str> {
        self.locations
            .get(name)
            .map(|v| v.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn pending_method_count(&self) -> usize {
        self.pending_methods.len()
    }

    fn record_location(&mut self, name: &str, file_path: &str) {
        let paths = self.locations.entry(name.to_string()).or_default();
        if !paths.iter().any(|p| p == file_path) {
            paths.push(file_path.to_string());
        }
    }
}
