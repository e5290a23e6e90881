//! Foreign-key resolution over raw element tables.
//!
//! Foreign keys are declared per resource in the manifest schema. A string
//! value of a declared field is replaced by what it points at: sequence
//! references become the referenced column as a numeric series, element
//! references become the referenced row's resolved parameter object, and
//! bus references stay strings but are validated against the bus set.
//! Resolution recurses into nested parameter objects and is idempotent:
//! already-replaced values (arrays, objects) are left alone.
//!
//! Ordering across element references is the caller's job: the build layer
//! topologically sorts the reference graph from [`Tables::dependencies`]
//! and resolves strictly in dependency order, which turns reference cycles
//! into a detectable error instead of unbounded recursion.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

use enerpack_core::{EnerpackError, EnerpackResult};

use crate::package::ForeignKey;
use crate::reader::{ElementRow, SequenceTable};

/// All raw tables of one package, indexed for resolution.
#[derive(Debug, Default)]
pub struct Tables {
    /// Element rows keyed by resource name
    pub elements: BTreeMap<String, Vec<ElementRow>>,
    /// Sequence tables keyed by resource name
    pub sequences: BTreeMap<String, SequenceTable>,
    /// Foreign keys declared per resource
    pub foreign_keys: BTreeMap<String, Vec<ForeignKey>>,
    /// Resource names classified as hubs/buses
    pub hub_resources: BTreeSet<String>,
    /// Known bus labels (declared or inferred)
    pub buses: BTreeSet<String>,
    index: HashMap<String, (String, usize)>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_elements(&mut self, resource: impl Into<String>, rows: Vec<ElementRow>) {
        self.elements.insert(resource.into(), rows);
    }

    pub fn insert_sequences(&mut self, table: SequenceTable) {
        self.sequences.insert(table.name.clone(), table);
    }

    pub fn set_foreign_keys(&mut self, resource: impl Into<String>, keys: Vec<ForeignKey>) {
        self.foreign_keys.insert(resource.into(), keys);
    }

    pub fn add_hub_resource(&mut self, resource: impl Into<String>) {
        self.hub_resources.insert(resource.into());
    }

    pub fn add_bus(&mut self, label: impl Into<String>) {
        self.buses.insert(label.into());
    }

    /// Build the element-name index. Element names must be unique across
    /// all element resources of the package.
    pub fn build_index(&mut self) -> EnerpackResult<()> {
        self.index.clear();
        for (resource, rows) in &self.elements {
            for (i, row) in rows.iter().enumerate() {
                if let Some((other, _)) = self
                    .index
                    .insert(row.name.clone(), (resource.clone(), i))
                {
                    return Err(EnerpackError::Validation(format!(
                        "element name '{}' appears in both '{}' and '{}'",
                        row.name, other, resource
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn element(&self, name: &str) -> Option<&ElementRow> {
        let (resource, i) = self.index.get(name)?;
        self.elements.get(resource)?.get(*i)
    }

    /// Names of all elements, in deterministic resource/row order.
    pub fn element_names(&self) -> Vec<String> {
        self.elements
            .values()
            .flat_map(|rows| rows.iter().map(|r| r.name.clone()))
            .collect()
    }

    fn foreign_key_for<'a>(&'a self, resource: &str, field: &str) -> Option<&'a ForeignKey> {
        self.foreign_keys
            .get(resource)?
            .iter()
            .find(|fk| fk.fields.first() == Some(field))
    }

    /// Element names referenced by `name` through element-resource foreign
    /// keys (the edges of the construction dependency graph).
    pub fn dependencies(&self, name: &str) -> EnerpackResult<Vec<String>> {
        let (resource, i) = self.index.get(name).ok_or_else(|| {
            EnerpackError::Validation(format!("unknown element '{}'", name))
        })?;
        let row = &self.elements[resource][*i];
        let mut deps = Vec::new();
        self.collect_dependencies(resource, &row.parameters, &mut deps);
        self.collect_dependencies(resource, &row.edge_parameters, &mut deps);
        deps.sort();
        deps.dedup();
        Ok(deps)
    }

    fn collect_dependencies(
        &self,
        resource: &str,
        map: &BTreeMap<String, Value>,
        deps: &mut Vec<String>,
    ) {
        for (key, value) in map {
            match value {
                Value::String(target) => {
                    if let Some(fk) = self.foreign_key_for(resource, key) {
                        if self.elements.contains_key(&fk.reference.resource) {
                            deps.push(target.clone());
                        }
                    }
                }
                Value::Object(nested) => {
                    let nested: BTreeMap<String, Value> =
                        nested.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    self.collect_dependencies(resource, &nested, deps);
                }
                _ => {}
            }
        }
    }

    /// Resolve all foreign keys of one element in place.
    ///
    /// Element references require the referenced element to be resolved
    /// already; the caller guarantees this by processing in topological
    /// order.
    pub fn resolve_element(&mut self, name: &str) -> EnerpackResult<()> {
        let (resource, i) = self
            .index
            .get(name)
            .cloned()
            .ok_or_else(|| EnerpackError::Validation(format!("unknown element '{}'", name)))?;

        // Work on a copy so referenced rows stay readable during resolution
        let mut row = self.elements[&resource][i].clone();
        self.resolve_map(&resource, &mut row.parameters)?;
        self.resolve_map(&resource, &mut row.edge_parameters)?;
        if let Some(rows) = self.elements.get_mut(&resource) {
            rows[i] = row;
        }
        Ok(())
    }

    fn resolve_map(
        &self,
        resource: &str,
        map: &mut BTreeMap<String, Value>,
    ) -> EnerpackResult<()> {
        for (key, value) in map.iter_mut() {
            self.resolve_value(resource, key, value)?;
        }
        Ok(())
    }

    fn resolve_json_map(
        &self,
        resource: &str,
        map: &mut serde_json::Map<String, Value>,
    ) -> EnerpackResult<()> {
        for (key, value) in map.iter_mut() {
            self.resolve_value(resource, key, value)?;
        }
        Ok(())
    }

    fn resolve_value(&self, resource: &str, key: &str, value: &mut Value) -> EnerpackResult<()> {
        match value {
            Value::String(target) => {
                let Some(fk) = self.foreign_key_for(resource, key) else {
                    return Ok(());
                };
                let referenced = fk.reference.resource.clone();
                if let Some(table) = self.sequences.get(&referenced) {
                    let column = table.columns.get(target.as_str()).ok_or_else(|| {
                        EnerpackError::Validation(format!(
                            "'{}' references column '{}' missing from sequences resource '{}'",
                            key, target, referenced
                        ))
                    })?;
                    *value = Value::Array(
                        column
                            .iter()
                            .filter_map(|v| serde_json::Number::from_f64(*v).map(Value::Number))
                            .collect(),
                    );
                } else if self.hub_resources.contains(&referenced) {
                    if !self.buses.contains(target.as_str()) {
                        return Err(EnerpackError::Validation(format!(
                            "'{}' references unknown bus '{}'",
                            key, target
                        )));
                    }
                    // Bus references stay by-name; the graph wires them later
                } else if self.elements.contains_key(&referenced) {
                    let row = self.element(target.as_str()).ok_or_else(|| {
                        EnerpackError::Validation(format!(
                            "'{}' references unknown element '{}' in resource '{}'",
                            key, target, referenced
                        ))
                    })?;
                    let mut object = serde_json::Map::new();
                    object.insert("name".into(), Value::String(row.name.clone()));
                    object.insert("type".into(), Value::String(row.type_tag.clone()));
                    for (k, v) in &row.parameters {
                        object.insert(k.clone(), v.clone());
                    }
                    *value = Value::Object(object);
                } else {
                    return Err(EnerpackError::Validation(format!(
                        "'{}' references unknown resource '{}'",
                        key, referenced
                    )));
                }
            }
            Value::Object(nested) => self.resolve_json_map(resource, nested)?,
            // Already-resolved (array/object) or plain values: no-op
            _ => {}
        }
        Ok(())
    }
}
