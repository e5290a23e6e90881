//! Typed energy-system components ("facades") and their construction
//! protocol.
//!
//! A [`Facade`] wraps lower-level optimization primitives (ports and flows)
//! behind a simplified attribute interface. Each component kind is a variant
//! of the closed [`FacadeKind`] enum; common fields (label, carrier, tech,
//! custom attributes) live on the generic [`Facade`] struct.
//!
//! Construction runs in three steps per facade:
//! 1. the supplied attributes are checked against the kind's required-field
//!    list (missing field is a fatal error naming field, kind, and label),
//! 2. the kind payload is built from the typed attribute bag,
//! 3. [`Facade::build_ports`] translates the domain attributes into the
//!    port/flow representation, including any implicitly owned subnodes.
//!
//! Attributes with no declared field end up in `custom_attributes`, an
//! explicit bag with ordinary serialization semantics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EnerpackError, EnerpackResult};
use crate::flow::{FieldValue, Flow, Investment, Port};

mod conversion;
mod demand;
mod generation;
mod link;
mod reservoir;
mod storage;
pub mod typemap;

pub use conversion::Conversion;
pub use demand::{Excess, Load, Shortage};
pub use generation::{Commodity, Dispatchable, Volatile};
pub use link::Link;
pub use reservoir::Reservoir;
pub use storage::Storage;
pub use typemap::{AttributeMap, ComponentType, ConstructorFn, TypeRole, Typemap};

/// Keyword attributes for one component, typed lazily on access.
///
/// Values come straight from the resolved element tables as JSON values;
/// the typed accessors perform the float/decimal coercion the tabular
/// sources require.
#[derive(Debug, Clone, Default)]
pub struct AttributeBag {
    values: BTreeMap<String, Value>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove and coerce a numeric attribute. Numeric strings (decimal
    /// exports) are accepted and coerced to native f64.
    pub fn take_f64(&mut self, key: &str) -> EnerpackResult<Option<f64>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
                EnerpackError::Parse(format!("attribute '{}' is not numeric: '{}'", key, s))
            }),
            Some(other) => Err(EnerpackError::Parse(format!(
                "attribute '{}' is not numeric: {}",
                key, other
            ))),
        }
    }

    pub fn take_bool(&mut self, key: &str) -> EnerpackResult<Option<bool>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(EnerpackError::Parse(format!(
                    "attribute '{}' is not a boolean: '{}'",
                    key, s
                ))),
            },
            Some(other) => Err(EnerpackError::Parse(format!(
                "attribute '{}' is not a boolean: {}",
                key, other
            ))),
        }
    }

    pub fn take_string(&mut self, key: &str) -> Option<String> {
        match self.values.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                // Put non-string values back rather than lose them
                self.values.insert(key.to_string(), other);
                None
            }
            None => None,
        }
    }

    /// Remove a scalar-or-series attribute.
    pub fn take_field_value(&mut self, key: &str) -> EnerpackResult<Option<FieldValue>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value_to_field(&value)
                .map(Some)
                .ok_or_else(|| {
                    EnerpackError::Parse(format!(
                        "attribute '{}' is neither a number nor a numeric series",
                        key
                    ))
                }),
        }
    }

    pub fn take_object(&mut self, key: &str) -> BTreeMap<String, Value> {
        match self.values.remove(key) {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(other) => {
                self.values.insert(key.to_string(), other);
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        }
    }

    /// Check the kind's required attributes, failing with field, kind, and
    /// label in the message.
    pub fn ensure_required(
        &self,
        kind: &str,
        label: &str,
        required: &[&str],
    ) -> EnerpackResult<()> {
        for field in required {
            if !self.values.contains_key(*field) {
                return Err(EnerpackError::Validation(format!(
                    "missing required attribute '{}' for {} '{}'",
                    field, kind, label
                )));
            }
        }
        Ok(())
    }

    fn require(&mut self, key: &str, kind: &str, label: &str) -> EnerpackResult<Value> {
        self.values.remove(key).ok_or_else(|| {
            EnerpackError::Validation(format!(
                "missing required attribute '{}' for {} '{}'",
                key, kind, label
            ))
        })
    }

    pub fn require_string(&mut self, key: &str, kind: &str, label: &str) -> EnerpackResult<String> {
        match self.require(key, kind, label)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(EnerpackError::Parse(format!(
                "attribute '{}' of {} '{}' is not a string: {}",
                key, kind, label, other
            ))),
        }
    }

    pub fn require_f64(&mut self, key: &str, kind: &str, label: &str) -> EnerpackResult<f64> {
        let value = self.require(key, kind, label)?;
        self.values.insert(key.to_string(), value);
        self.take_f64(key)?.ok_or_else(|| {
            EnerpackError::Parse(format!(
                "attribute '{}' of {} '{}' is null",
                key, kind, label
            ))
        })
    }

    pub fn require_field_value(
        &mut self,
        key: &str,
        kind: &str,
        label: &str,
    ) -> EnerpackResult<FieldValue> {
        let value = self.require(key, kind, label)?;
        value_to_field(&value).ok_or_else(|| {
            EnerpackError::Parse(format!(
                "attribute '{}' of {} '{}' is neither a number nor a numeric series",
                key, kind, label
            ))
        })
    }

    /// Whatever is left after the payload popped its fields.
    pub fn into_custom(self) -> BTreeMap<String, Value> {
        self.values
    }
}

/// Convert a JSON value into a scalar-or-series field value.
pub fn value_to_field(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => n.as_f64().map(FieldValue::Scalar),
        Value::String(s) => s.trim().parse::<f64>().ok().map(FieldValue::Scalar),
        Value::Array(items) => {
            let mut series = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Number(n) => series.push(n.as_f64()?),
                    Value::String(s) => series.push(s.trim().parse::<f64>().ok()?),
                    _ => return None,
                }
            }
            Some(FieldValue::Series(series))
        }
        _ => None,
    }
}

/// The closed set of component kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FacadeKind {
    Dispatchable(Dispatchable),
    Volatile(Volatile),
    Load(Load),
    Storage(Storage),
    Link(Link),
    Conversion(Conversion),
    Commodity(Commodity),
    Excess(Excess),
    Shortage(Shortage),
    Reservoir(Reservoir),
}

impl FacadeKind {
    pub fn name(&self) -> &'static str {
        match self {
            FacadeKind::Dispatchable(_) => "dispatchable",
            FacadeKind::Volatile(_) => "volatile",
            FacadeKind::Load(_) => "load",
            FacadeKind::Storage(_) => "storage",
            FacadeKind::Link(_) => "link",
            FacadeKind::Conversion(_) => "conversion",
            FacadeKind::Commodity(_) => "commodity",
            FacadeKind::Excess(_) => "excess",
            FacadeKind::Shortage(_) => "shortage",
            FacadeKind::Reservoir(_) => "reservoir",
        }
    }
}

/// A typed domain object: generic fields plus the kind payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facade {
    pub label: String,
    pub carrier: Option<String>,
    pub tech: Option<String>,
    pub kind: FacadeKind,
    /// Free-form parameters with no declared field
    pub custom_attributes: BTreeMap<String, Value>,
    /// Per-edge parameter overrides applied onto the built flows
    pub edge_parameters: BTreeMap<String, Value>,
}

impl Facade {
    pub fn new(label: impl Into<String>, kind: FacadeKind) -> Self {
        Self {
            label: label.into(),
            carrier: None,
            tech: None,
            kind,
            custom_attributes: BTreeMap::new(),
            edge_parameters: BTreeMap::new(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Fixed capacity, or `None` when the capacity is an optimization
    /// output (expandable).
    pub fn nominal_value(&self) -> Option<f64> {
        match &self.kind {
            FacadeKind::Dispatchable(p) => p.nominal_value(),
            FacadeKind::Volatile(p) => p.nominal_value(),
            FacadeKind::Storage(p) => p.nominal_value(),
            FacadeKind::Link(p) => p.nominal_value(),
            FacadeKind::Conversion(p) => p.nominal_value(),
            FacadeKind::Reservoir(p) => p.nominal_value(),
            FacadeKind::Load(_)
            | FacadeKind::Commodity(_)
            | FacadeKind::Excess(_)
            | FacadeKind::Shortage(_) => None,
        }
    }

    /// Capacity-investment descriptor for expandable facades.
    pub fn investment(&self) -> EnerpackResult<Option<Investment>> {
        match &self.kind {
            FacadeKind::Dispatchable(p) => p.investment(),
            FacadeKind::Volatile(p) => p.investment(),
            FacadeKind::Storage(p) => p.investment(),
            FacadeKind::Link(p) => p.investment(),
            FacadeKind::Conversion(p) => p.investment(),
            FacadeKind::Reservoir(p) => p.investment(),
            FacadeKind::Load(_)
            | FacadeKind::Commodity(_)
            | FacadeKind::Excess(_)
            | FacadeKind::Shortage(_) => Ok(None),
        }
    }

    /// Translate domain attributes into ports, flows, and owned subnodes,
    /// then apply any per-edge parameter overrides.
    pub fn build_ports(&self) -> EnerpackResult<PortSet> {
        let mut ports = match &self.kind {
            FacadeKind::Dispatchable(p) => p.build_ports(&self.label)?,
            FacadeKind::Volatile(p) => p.build_ports(&self.label)?,
            FacadeKind::Load(p) => p.build_ports(&self.label)?,
            FacadeKind::Storage(p) => p.build_ports(&self.label)?,
            FacadeKind::Link(p) => p.build_ports(&self.label)?,
            FacadeKind::Conversion(p) => p.build_ports(&self.label)?,
            FacadeKind::Commodity(p) => p.build_ports(&self.label)?,
            FacadeKind::Excess(p) => p.build_ports(&self.label)?,
            FacadeKind::Shortage(p) => p.build_ports(&self.label)?,
            FacadeKind::Reservoir(p) => p.build_ports(&self.label)?,
        };
        let mut unknown = Vec::new();
        for port in ports.inputs.iter_mut().chain(ports.outputs.iter_mut()) {
            unknown.extend(apply_flow_parameters(&mut port.flow, &self.edge_parameters));
        }
        unknown.sort();
        unknown.dedup();
        ports.unknown_edge_parameters = unknown;
        Ok(ports)
    }
}

/// Result of [`Facade::build_ports`]: input/output attachments plus any
/// implicitly created subnodes.
#[derive(Debug, Clone, Default)]
pub struct PortSet {
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    pub subnodes: Vec<Subnode>,
    /// Edge-parameter keys that matched no flow field (reported upstream)
    pub unknown_edge_parameters: Vec<String>,
}

/// An auxiliary component owned by its parent facade, added to the graph
/// only alongside it. A subnode's ports may target its parent's label.
#[derive(Debug, Clone)]
pub struct Subnode {
    pub facade: Facade,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

/// Shared investment construction: no descriptor unless expandable, else
/// bounded by `potential - existing`.
///
/// A periodic (series) potential is bounded by its tightest entry; the
/// literal per-period values stay on the payload.
pub(crate) fn build_investment(
    expandable: bool,
    existing: Option<f64>,
    potential: Option<&FieldValue>,
    cost: Option<&FieldValue>,
) -> EnerpackResult<Option<Investment>> {
    if !expandable {
        return Ok(None);
    }
    let existing = existing.unwrap_or(0.0);
    let potential = potential.map(|p| match p {
        FieldValue::Scalar(v) => *v,
        FieldValue::Series(s) => s.iter().copied().fold(f64::INFINITY, f64::min),
    });
    Investment::new(potential, existing, cost.cloned()).map(Some)
}

/// Apply edge-parameter overrides onto a flow. Returns the keys that match
/// no flow field.
pub(crate) fn apply_flow_parameters(
    flow: &mut Flow,
    params: &BTreeMap<String, Value>,
) -> Vec<String> {
    let mut unknown = Vec::new();
    for (key, value) in params {
        let field = value_to_field(value);
        match (key.as_str(), field) {
            ("min", Some(v)) => flow.min = Some(v),
            ("max", Some(v)) => flow.max = Some(v),
            ("fix", Some(v)) => flow.fix = Some(v),
            ("variable_costs", Some(v)) => flow.variable_costs = Some(v),
            ("fixed_costs", Some(v)) => flow.fixed_costs = Some(v),
            ("conversion_factor", Some(v)) => flow.conversion_factor = Some(v),
            ("full_load_time_max", Some(v)) => flow.full_load_time_max = v.leading(),
            _ => unknown.push(key.clone()),
        }
    }
    unknown
}

/// Finish facade construction: pop the generic fields and sweep the rest
/// into the custom-attribute bag.
pub(crate) fn finish(label: String, bag: &mut AttributeBag, kind: FacadeKind) -> Facade {
    let carrier = bag.take_string("carrier");
    let tech = bag.take_string("tech");
    let edge_parameters = bag.take_object("edge_parameters");
    let custom_attributes = std::mem::take(bag).into_custom();
    Facade {
        label,
        carrier,
        tech,
        kind,
        custom_attributes,
        edge_parameters,
    }
}
