//! Type registry: class lookup and the shared instance cache.
//!
//! The class table is filled while the registry is being built and is never
//! written again, so lookups need no lock. The instance cache is a `DashMap`;
//! a first-time resolution builds its instance outside any lock and then does
//! an insert-if-absent. When two callers race on the same key the loser drops
//! its instance and returns the winner's, so exactly one instance is ever
//! observable per key.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::{Error, Result};

use super::{IntType, IpType, Options, TypeClass, ValueType};

/// Variants registered in every registry built with [`TypeRegistry::with_builtins`].
pub const BUILTIN_TYPES: &[TypeClass] = &[IntType::CLASS, IpType::CLASS];

static GLOBAL: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(TypeRegistry::with_builtins()));

/// Returns the process-wide registry holding the built-in variants.
pub fn global() -> Arc<TypeRegistry> {
    Arc::clone(&GLOBAL)
}

/// Resolves type names to classes and (name, options) pairs to shared instances.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    classes: HashMap<&'static str, TypeClass>,
    instances: DashMap<String, Arc<dyn ValueType>>,
}

impl TypeRegistry {
    /// Creates a registry with no variants.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding [`BUILTIN_TYPES`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for class in BUILTIN_TYPES {
            let added = registry.register(*class);
            debug_assert!(added, "duplicate builtin type {}", class.name);
        }
        registry
    }

    /// Registers a variant under its qualified and short names.
    ///
    /// Returns false, and registers nothing, if either name is taken.
    pub fn register(&mut self, class: TypeClass) -> bool {
        if self.classes.contains_key(class.name) || self.classes.contains_key(class.short_name) {
            return false;
        }
        self.classes.insert(class.name, class);
        self.classes.insert(class.short_name, class);
        true
    }

    /// Looks up a class by qualified or short name.
    pub fn resolve_class(&self, name: &str) -> Result<TypeClass> {
        self.classes
            .get(name.trim())
            .copied()
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Returns the cached instance for (name, options), building it on first use.
    ///
    /// The cache key uses the qualified name, so `Int` and `cmdb.types.Int`
    /// with equal options share one instance.
    pub fn resolve_instance(&self, name: &str, options: &Options) -> Result<Arc<dyn ValueType>> {
        let class = self.resolve_class(name)?;
        let key = options.cache_key(class.name);

        if let Some(hit) = self.instances.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let candidate = class.construct(options)?;
        log::debug!("type cache miss, built instance {key}");

        let winner = self.instances.entry(key).or_insert(candidate);
        Ok(Arc::clone(winner.value()))
    }

    /// Qualified names of all registered variants, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.classes.values().map(|class| class.name).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Number of cached instances.
    pub fn cached_instances(&self) -> usize {
        self.instances.len()
    }
}
