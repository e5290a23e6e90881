//! Two-pass deserialization of a datapackage into an [`EnergySystem`].
//!
//! Pass one reads every resource into memory, classifies it, and resolves
//! the foreign-key reference graph into a topological construction order
//! (a reference cycle is a fatal validation error, not a stack overflow).
//! Pass two walks that order, resolving each element's foreign keys and
//! constructing its facade through the typemap.
//!
//! All mutable state of one call lives in locals and the
//! [`crate::resolve::Tables`] value; nothing is shared across calls.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde_json::Value;
use tracing::{debug, warn};

use enerpack_core::{
    AttributeBag, AttributeMap, Bus, EnerpackError, EnerpackResult, EnergySystem, Facade,
    TimeIndex, TypeRole, Typemap,
};
use enerpack_ts::{
    default_timeindex, expand_periodic_value, periods_from_rows, reconcile_sequence_indices,
    ExpansionRule, PeriodRow, TemporalWeights, TsaParameters,
};

use crate::constraints::{ConstraintFacade, ConstraintTypemap};
use crate::helpers::{ImportDiagnostics, ImportResult};
use crate::package::{Datapackage, ResourceClass};
use crate::reader::{self, ConstraintRow, ElementRow, HubRow};
use crate::resolve::Tables;

/// Caller-supplied lookup tables for one deserialization call.
#[derive(Debug, Clone)]
pub struct DeserializeOptions {
    pub typemap: Typemap,
    pub attributemap: AttributeMap,
    pub constraint_typemap: ConstraintTypemap,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self {
            typemap: Typemap::default(),
            attributemap: AttributeMap::default(),
            constraint_typemap: ConstraintTypemap::default(),
        }
    }
}

/// Deserialize a datapackage with the built-in typemaps.
pub fn deserialize_energy_system(root: impl AsRef<Path>) -> EnerpackResult<ImportResult> {
    deserialize_energy_system_with(root, &DeserializeOptions::default())
}

/// Type-directed object factory: look up the tag, merge and rename the
/// attributes, construct the facade.
///
/// `all_attrs` wins over `init_attrs` on key collision. Attribute keys go
/// through the attribute map (default renames the generic `name` key to
/// `label`); attributes with no declared field end up in the facade's
/// custom-attribute bag.
pub fn create(
    typemap: &Typemap,
    attributemap: &AttributeMap,
    tag: &str,
    init_attrs: BTreeMap<String, Value>,
    all_attrs: BTreeMap<String, Value>,
) -> EnerpackResult<Facade> {
    let kind = typemap.lookup(tag)?;
    let ctor = match kind.role {
        TypeRole::Component(ctor) => ctor,
        TypeRole::Bus => {
            return Err(EnerpackError::Build(format!(
                "type '{}' declares a bus, not a constructible component",
                tag.trim()
            )))
        }
    };

    let mut merged = init_attrs;
    merged.extend(all_attrs);

    let mut bag = AttributeBag::new();
    let mut label: Option<String> = None;
    for (key, value) in merged {
        let renamed = attributemap.remap(tag, &key);
        if renamed == "label" {
            label = Some(match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            });
        } else {
            bag.insert(renamed.to_string(), value);
        }
    }

    let label = label.ok_or_else(|| {
        EnerpackError::Validation(format!("element of type '{}' has no name", tag.trim()))
    })?;
    debug!(label = %label, tag = tag.trim(), "constructing facade");
    ctor(label, &mut bag)
}

/// Deserialize a datapackage with caller-supplied typemaps.
pub fn deserialize_energy_system_with(
    root: impl AsRef<Path>,
    options: &DeserializeOptions,
) -> EnerpackResult<ImportResult> {
    let mut diag = ImportDiagnostics::new();
    let package = Datapackage::open(root.as_ref())
        .map_err(|e| EnerpackError::Parse(format!("{:#}", e)))?;
    package.check_version(&mut diag);

    for resource in package.unclassified_resources() {
        diag.add_warning(
            "descriptor",
            &format!(
                "resource '{}' has no recognized path category and was skipped",
                resource.name
            ),
        );
    }

    // ------------------------------------------------------------------
    // Pass one: read every classified resource into memory
    // ------------------------------------------------------------------
    let mut element_tables: Vec<(String, Vec<ElementRow>)> = Vec::new();
    let mut hub_tables: Vec<(String, Vec<HubRow>)> = Vec::new();
    let mut sequence_names: Vec<String> = Vec::new();
    let mut period_rows: Option<Vec<PeriodRow>> = None;
    let mut temporal: Option<TemporalWeights> = None;
    let mut tsa_parameters: Option<TsaParameters> = None;
    let mut constraint_rows: Vec<ConstraintRow> = Vec::new();
    let mut tables = Tables::new();

    for (class, resource) in package.classified_resources() {
        let path = package.resource_path(resource);
        let parse_err =
            |e: anyhow::Error| EnerpackError::Parse(format!("resource '{}': {:#}", resource.name, e));
        debug!(resource = %resource.name, ?class, "reading resource");
        match class {
            ResourceClass::Elements => {
                let rows = reader::read_elements(&path).map_err(parse_err)?;
                element_tables.push((resource.name.clone(), rows));
            }
            ResourceClass::Sequences => {
                let table = reader::read_sequences(&path, &resource.name).map_err(parse_err)?;
                sequence_names.push(resource.name.clone());
                tables.insert_sequences(table);
            }
            ResourceClass::Hubs => {
                let rows = reader::read_hubs(&path).map_err(parse_err)?;
                hub_tables.push((resource.name.clone(), rows));
            }
            ResourceClass::Periods => {
                if period_rows.is_some() {
                    return Err(EnerpackError::Validation(
                        "package declares more than one periods resource".into(),
                    ));
                }
                period_rows = Some(reader::read_periods(&path).map_err(parse_err)?);
            }
            ResourceClass::Temporal => {
                if temporal.is_some() {
                    return Err(EnerpackError::Validation(
                        "package declares more than one temporal resource".into(),
                    ));
                }
                temporal = Some(reader::read_temporal(&path).map_err(parse_err)?);
            }
            ResourceClass::TsaParameters => {
                tsa_parameters = Some(reader::read_tsa_parameters(&path).map_err(parse_err)?);
            }
            ResourceClass::Constraints => {
                constraint_rows.extend(reader::read_constraints(&path).map_err(parse_err)?);
            }
        }
        if let Some(schema) = &resource.schema {
            tables.set_foreign_keys(resource.name.clone(), schema.foreign_keys.clone());
        }
    }
    diag.stats.sequences = sequence_names.len();

    if tsa_parameters.is_some() && period_rows.is_none() {
        let message = "tsa_parameters resource without a periods resource is ignored";
        warn!("{}", message);
        diag.add_warning("descriptor", message);
        tsa_parameters = None;
    }

    // ------------------------------------------------------------------
    // Time index: temporal > periods > sequences > one-step default
    // ------------------------------------------------------------------
    let (timeindex, periods) = if let Some(weights) = &temporal {
        (weights.index().clone(), None)
    } else if let Some(rows) = &period_rows {
        let (full, periods) = periods_from_rows(rows)?;
        (full, Some(periods))
    } else {
        let indices: Vec<(String, TimeIndex)> = sequence_names
            .iter()
            .filter_map(|name| {
                tables
                    .sequences
                    .get(name)
                    .map(|t| (name.clone(), t.timeindex.clone()))
            })
            .collect();
        match reconcile_sequence_indices(&indices)? {
            Some(index) => (index, None),
            None => (default_timeindex(), None),
        }
    };

    let mut system =
        EnergySystem::new(timeindex, options.typemap.clone()).with_periods(periods);

    // ------------------------------------------------------------------
    // Buses first: hubs resources, bus-typed element rows, or inference
    // ------------------------------------------------------------------
    for (resource_name, rows) in &hub_tables {
        tables.add_hub_resource(resource_name.clone());
        for row in rows {
            match options.typemap.lookup(&row.type_tag)?.role {
                TypeRole::Bus => {}
                TypeRole::Component(_) => {
                    return Err(EnerpackError::Validation(format!(
                        "hubs resource '{}' contains non-bus type '{}'",
                        resource_name, row.type_tag
                    )))
                }
            }
            let bus = if row.balanced {
                Bus::new(&row.name)
            } else {
                Bus::unbalanced(&row.name)
            };
            system.add_bus(bus)?;
            tables.add_bus(row.name.clone());
            diag.stats.buses += 1;
        }
    }

    for (resource_name, rows) in element_tables {
        let mut remaining = Vec::with_capacity(rows.len());
        for row in rows {
            let is_bus = matches!(
                options.typemap.get(&row.type_tag),
                Some(kind) if matches!(kind.role, TypeRole::Bus)
            );
            if is_bus {
                tables.add_hub_resource(resource_name.clone());
                let balanced = !matches!(row.parameters.get("balanced"), Some(Value::Bool(false)));
                let bus = if balanced {
                    Bus::new(&row.name)
                } else {
                    Bus::unbalanced(&row.name)
                };
                system.add_bus(bus)?;
                tables.add_bus(row.name.clone());
                diag.stats.buses += 1;
            } else {
                remaining.push(row);
            }
        }
        tables.insert_elements(resource_name, remaining);
    }

    if tables.buses.is_empty() {
        // No hubs table anywhere: the unique set of referenced bus names
        // becomes the bus set
        let mut inferred: Vec<String> = tables
            .elements
            .values()
            .flatten()
            .flat_map(|row| row.predecessors.iter().chain(row.successors.iter()))
            .cloned()
            .collect();
        inferred.sort();
        inferred.dedup();
        for name in inferred {
            system.add_bus(Bus::new(&name))?;
            tables.add_bus(name);
            diag.stats.buses += 1;
        }
    }

    tables.build_index()?;

    // ------------------------------------------------------------------
    // Dependency order over element references, cycles rejected
    // ------------------------------------------------------------------
    let names = tables.element_names();
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut node_of = HashMap::with_capacity(names.len());
    for name in &names {
        node_of.insert(name.clone(), graph.add_node(name.clone()));
    }
    for name in &names {
        for dep in tables.dependencies(name)? {
            let Some(&dep_node) = node_of.get(&dep) else {
                return Err(EnerpackError::Validation(format!(
                    "element '{}' references unknown element '{}'",
                    name, dep
                )));
            };
            graph.add_edge(dep_node, node_of[name], ());
        }
    }
    let order = toposort(&graph, None).map_err(|cycle| {
        EnerpackError::Validation(format!(
            "cyclic foreign-key reference involving element '{}'",
            graph[cycle.node_id()]
        ))
    })?;

    // ------------------------------------------------------------------
    // Pass two: resolve and construct strictly in dependency order
    // ------------------------------------------------------------------
    for node in order {
        let name = graph[node].clone();
        tables.resolve_element(&name)?;
        let row = tables
            .element(&name)
            .ok_or_else(|| EnerpackError::Validation(format!("unknown element '{}'", name)))?
            .clone();

        let mut attrs = row.parameters.clone();
        derive_bus_attributes(&row, &mut attrs);
        if let Some(periods) = &system.periods {
            let periods = periods.clone();
            expand_multi_period_attrs(&name, &mut attrs, &periods, &mut diag)?;
        }
        attrs.insert("name".into(), Value::String(row.name.clone()));
        if !row.edge_parameters.is_empty() {
            attrs.insert(
                "edge_parameters".into(),
                Value::Object(row.edge_parameters.clone().into_iter().collect()),
            );
        }

        let facade = create(
            &options.typemap,
            &options.attributemap,
            &row.type_tag,
            BTreeMap::new(),
            attrs,
        )?;
        let insert = system.add_component(facade)?;
        diag.stats.components += 1;
        diag.stats.subnodes += insert.subnode_indices.len();
        for key in insert.unknown_edge_parameters {
            diag.add_warning_with_entity(
                "edge_parameters",
                &format!("no flow field named '{}', kept as facade edge parameter", key),
                &name,
            );
        }
    }

    // ------------------------------------------------------------------
    // Constraints resources go through their own typemap
    // ------------------------------------------------------------------
    let mut constraints = Vec::with_capacity(constraint_rows.len());
    for row in &constraint_rows {
        constraints.push(ConstraintFacade::from_row(row, &options.constraint_typemap)?);
        diag.stats.constraints += 1;
    }

    debug!(stats = %system.stats(), "deserialized energy system");
    Ok(ImportResult {
        system,
        constraints,
        tsa_parameters,
        temporal_weights: temporal,
        diagnostics: diag,
    })
}

/// Fill `bus`/`from_bus`/`to_bus` from the predecessors/successors node
/// lists when the element table carried the topology there instead of in
/// explicit parameter columns.
fn derive_bus_attributes(row: &ElementRow, attrs: &mut BTreeMap<String, Value>) {
    let has_bus =
        attrs.contains_key("bus") || attrs.contains_key("from_bus") || attrs.contains_key("to_bus");
    if has_bus {
        return;
    }
    match (row.predecessors.first(), row.successors.first()) {
        (Some(from), Some(to)) => {
            attrs.insert("from_bus".into(), Value::String(from.clone()));
            attrs.insert("to_bus".into(), Value::String(to.clone()));
        }
        (Some(bus), None) | (None, Some(bus)) => {
            attrs.insert("bus".into(), Value::String(bus.clone()));
        }
        (None, None) => {}
    }
}

/// Unpack list-valued attributes against the declared periods.
///
/// Attributes in the periodic set stay literal per-period lists; the
/// yearly and broadcast rules rewrite the value and emit a warning, since
/// not every parameter semantically supports that expansion.
fn expand_multi_period_attrs(
    element: &str,
    attrs: &mut BTreeMap<String, Value>,
    periods: &enerpack_core::Periods,
    diag: &mut ImportDiagnostics,
) -> EnerpackResult<()> {
    for (key, value) in attrs.iter_mut() {
        let Value::Array(items) = value else {
            continue;
        };
        let Some(numbers) = as_numbers(items) else {
            continue;
        };

        let rule = enerpack_ts::classify(key);
        if rule == ExpansionRule::Periodic {
            // Periodic attributes must supply exactly one value per period
            expand_periodic_value(key, &numbers, periods)?;
            continue;
        }
        if numbers.len() != periods.count() {
            // A regular per-timestep series, not a periodic list
            continue;
        }

        let expanded = expand_periodic_value(key, &numbers, periods)?;
        let how = match expanded.rule {
            ExpansionRule::Yearly => "one value per calendar year",
            _ => "a per-timestep series",
        };
        let message = format!(
            "attribute '{}' expanded from {} periodic values into {}; \
             not every parameter supports this expansion",
            key,
            periods.count(),
            how
        );
        warn!(element, "{}", message);
        diag.add_warning_with_entity("expansion", &message, element);
        *value = Value::Array(
            expanded
                .values
                .iter()
                .filter_map(|v| serde_json::Number::from_f64(*v).map(Value::Number))
                .collect(),
        );
    }
    Ok(())
}

fn as_numbers(items: &[Value]) -> Option<Vec<f64>> {
    items
        .iter()
        .map(|v| v.as_f64())
        .collect::<Option<Vec<f64>>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_unknown_tag() {
        let err = create(
            &Typemap::default(),
            &AttributeMap::default(),
            "fusion_reactor",
            BTreeMap::new(),
            attrs(&[("name", json!("iter"))]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("fusion_reactor"));
    }

    #[test]
    fn test_create_renames_name_to_label() {
        let facade = create(
            &Typemap::default(),
            &AttributeMap::default(),
            "excess",
            BTreeMap::new(),
            attrs(&[("name", json!("el-excess")), ("bus", json!("el"))]),
        )
        .unwrap();
        assert_eq!(facade.label, "el-excess");
    }

    #[test]
    fn test_create_merges_all_over_init() {
        let facade = create(
            &Typemap::default(),
            &AttributeMap::default(),
            "excess",
            attrs(&[("name", json!("slack")), ("bus", json!("wrong"))]),
            attrs(&[("bus", json!("el"))]),
        )
        .unwrap();
        match facade.kind {
            enerpack_core::FacadeKind::Excess(excess) => assert_eq!(excess.bus, "el"),
            other => panic!("unexpected kind {:?}", other.name()),
        }
    }

    #[test]
    fn test_create_rejects_bus_role() {
        let err = create(
            &Typemap::default(),
            &AttributeMap::default(),
            "bus",
            BTreeMap::new(),
            attrs(&[("name", json!("el"))]),
        )
        .unwrap_err();
        assert!(matches!(err, EnerpackError::Build(_)));
    }

    #[test]
    fn test_create_trims_tag_whitespace() {
        let facade = create(
            &Typemap::default(),
            &AttributeMap::default(),
            " excess ",
            BTreeMap::new(),
            attrs(&[("name", json!("slack")), ("bus", json!("el"))]),
        )
        .unwrap();
        assert_eq!(facade.kind_name(), "excess");
    }

    #[test]
    fn test_derive_bus_attributes() {
        let row = ElementRow {
            name: "de-at".into(),
            type_tag: "link".into(),
            predecessors: vec!["el-de".into()],
            successors: vec!["el-at".into()],
            parameters: BTreeMap::new(),
            edge_parameters: BTreeMap::new(),
        };
        let mut out = BTreeMap::new();
        derive_bus_attributes(&row, &mut out);
        assert_eq!(out["from_bus"], json!("el-de"));
        assert_eq!(out["to_bus"], json!("el-at"));
    }
}
