//! Type and attribute lookup tables driving facade construction.
//!
//! The [`Typemap`] maps type-name strings from element tables to
//! constructible component kinds; the [`AttributeMap`] renames incoming
//! attribute keys per kind before construction (default: `name` → `label`).

use std::collections::BTreeMap;

use crate::error::{EnerpackError, EnerpackResult};
use crate::facades::{conversion, demand, generation, link, reservoir, storage};
use crate::facades::{AttributeBag, Facade};

/// Constructor signature shared by all component kinds: label plus the
/// resolved attribute bag.
pub type ConstructorFn = fn(String, &mut AttributeBag) -> EnerpackResult<Facade>;

/// What a type tag stands for: a bus declaration (hubs resources) or a
/// constructible component.
#[derive(Clone, Copy)]
pub enum TypeRole {
    Bus,
    Component(ConstructorFn),
}

impl std::fmt::Debug for TypeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRole::Bus => write!(f, "Bus"),
            TypeRole::Component(_) => write!(f, "Component(..)"),
        }
    }
}

/// A constructible kind: its role plus the attribute names it requires.
#[derive(Debug, Clone, Copy)]
pub struct ComponentType {
    pub role: TypeRole,
    pub required: &'static [&'static str],
}

impl ComponentType {
    pub const fn component(ctor: ConstructorFn, required: &'static [&'static str]) -> Self {
        Self {
            role: TypeRole::Component(ctor),
            required,
        }
    }

    pub const fn bus() -> Self {
        Self {
            role: TypeRole::Bus,
            required: &["name"],
        }
    }
}

/// Registry of type tags. Lookup is case-sensitive over the
/// whitespace-trimmed tag.
#[derive(Debug, Clone)]
pub struct Typemap {
    entries: BTreeMap<String, ComponentType>,
}

impl Typemap {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, tag: impl Into<String>, kind: ComponentType) -> &mut Self {
        self.entries.insert(tag.into(), kind);
        self
    }

    pub fn get(&self, tag: &str) -> Option<&ComponentType> {
        self.entries.get(tag.trim())
    }

    /// Resolve a tag or fail naming it.
    pub fn lookup(&self, tag: &str) -> EnerpackResult<&ComponentType> {
        self.get(tag).ok_or_else(|| {
            EnerpackError::Build(format!("no typemap entry for type '{}'", tag.trim()))
        })
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for Typemap {
    /// The built-in registry covering every [`super::FacadeKind`] variant
    /// plus the `bus` sentinel for hubs resources.
    fn default() -> Self {
        let mut map = Self::empty();
        map.insert("bus", ComponentType::bus());
        map.insert(
            "dispatchable",
            ComponentType::component(generation::construct_dispatchable, generation::DISPATCHABLE_REQUIRED),
        );
        map.insert(
            "volatile",
            ComponentType::component(generation::construct_volatile, generation::VOLATILE_REQUIRED),
        );
        map.insert(
            "commodity",
            ComponentType::component(generation::construct_commodity, generation::COMMODITY_REQUIRED),
        );
        map.insert(
            "load",
            ComponentType::component(demand::construct_load, demand::LOAD_REQUIRED),
        );
        map.insert(
            "excess",
            ComponentType::component(demand::construct_excess, demand::EXCESS_REQUIRED),
        );
        map.insert(
            "shortage",
            ComponentType::component(demand::construct_shortage, demand::SHORTAGE_REQUIRED),
        );
        map.insert(
            "storage",
            ComponentType::component(storage::construct, storage::REQUIRED),
        );
        map.insert(
            "link",
            ComponentType::component(link::construct, link::REQUIRED),
        );
        map.insert(
            "conversion",
            ComponentType::component(conversion::construct, conversion::REQUIRED),
        );
        map.insert(
            "reservoir",
            ComponentType::component(reservoir::construct, reservoir::REQUIRED),
        );
        map
    }
}

/// Tag used for the fallback renaming entry consulted when a type has no
/// entry of its own.
pub const DEFAULT_ATTRIBUTE_ENTRY: &str = "";

/// Per-kind attribute renaming, applied before construction.
#[derive(Debug, Clone)]
pub struct AttributeMap {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl AttributeMap {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        tag: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> &mut Self {
        self.entries
            .entry(tag.into())
            .or_default()
            .insert(from.into(), to.into());
        self
    }

    /// Rename one key for the given tag: the tag's own entry wins, then the
    /// fallback entry, then the key passes through unchanged.
    pub fn remap<'a>(&'a self, tag: &str, key: &'a str) -> &'a str {
        if let Some(renames) = self.entries.get(tag.trim()) {
            if let Some(to) = renames.get(key) {
                return to;
            }
        }
        if let Some(renames) = self.entries.get(DEFAULT_ATTRIBUTE_ENTRY) {
            if let Some(to) = renames.get(key) {
                return to;
            }
        }
        key
    }
}

impl Default for AttributeMap {
    /// Default renaming: the generic `name` key becomes `label` for every
    /// kind.
    fn default() -> Self {
        let mut map = Self::empty();
        map.insert(DEFAULT_ATTRIBUTE_ENTRY, "name", "label");
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_typemap_covers_builtin_kinds() {
        let map = Typemap::default();
        for tag in [
            "bus",
            "dispatchable",
            "volatile",
            "load",
            "storage",
            "link",
            "conversion",
            "commodity",
            "excess",
            "shortage",
            "reservoir",
        ] {
            assert!(map.get(tag).is_some(), "missing builtin tag {}", tag);
        }
    }

    #[test]
    fn test_lookup_trims_whitespace_but_keeps_case() {
        let map = Typemap::default();
        assert!(map.lookup(" storage ").is_ok());
        let err = map.lookup("Storage").unwrap_err();
        assert!(err.to_string().contains("Storage"));
    }

    #[test]
    fn test_attribute_map_fallback() {
        let mut map = AttributeMap::default();
        map.insert("storage", "capacity", "power");
        assert_eq!(map.remap("storage", "capacity"), "power");
        assert_eq!(map.remap("storage", "name"), "label");
        assert_eq!(map.remap("volatile", "name"), "label");
        assert_eq!(map.remap("volatile", "profile"), "profile");
    }
}
