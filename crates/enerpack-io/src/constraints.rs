//! Constraint facades built from `constraints` resources.
//!
//! Constraint rows are typed through their own lookup table
//! ([`ConstraintTypemap`]), separate from the component typemap. Each
//! facade normalizes into a [`ConstraintExpr`], a weighted sum of flows
//! with an upper bound, which the downstream optimization model consumes.

use std::collections::BTreeMap;

use serde_json::Value;

use enerpack_core::{
    facades::value_to_field, AttributeBag, EnerpackError, EnerpackResult, EnergySystem, Node,
};

use crate::reader::ConstraintRow;

/// Builder signature for one constraint kind.
pub type ConstraintConstructorFn =
    fn(String, &mut AttributeBag) -> EnerpackResult<ConstraintFacade>;

/// The closed set of constraint kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// Caps the keyword-weighted sum of all flows over the horizon
    /// (e.g. an emission limit with `keyword = "emission_factor"`).
    GenericIntegralLimit { keyword: String, limit: f64 },
    /// Caps the summed additional capacity across all investment flows.
    JointExtensionLimit { limit: f64 },
}

/// A typed constraint row, ready to be applied to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintFacade {
    pub name: String,
    pub kind: ConstraintKind,
    pub custom_attributes: BTreeMap<String, Value>,
}

/// One weighted flow term of a normalized constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintTerm {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

/// A normalized constraint: `sum(weight * flow) <= upper_bound`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintExpr {
    pub name: String,
    pub terms: Vec<ConstraintTerm>,
    pub upper_bound: f64,
}

fn construct_integral_limit(
    name: String,
    bag: &mut AttributeBag,
) -> EnerpackResult<ConstraintFacade> {
    let keyword = bag.require_string("keyword", "generic_integral_limit", &name)?;
    let limit = bag.require_f64("limit", "generic_integral_limit", &name)?;
    Ok(ConstraintFacade {
        name,
        kind: ConstraintKind::GenericIntegralLimit { keyword, limit },
        custom_attributes: std::mem::take(bag).into_custom(),
    })
}

fn construct_extension_limit(
    name: String,
    bag: &mut AttributeBag,
) -> EnerpackResult<ConstraintFacade> {
    let limit = bag.require_f64("limit", "joint_extension_limit", &name)?;
    Ok(ConstraintFacade {
        name,
        kind: ConstraintKind::JointExtensionLimit { limit },
        custom_attributes: std::mem::take(bag).into_custom(),
    })
}

/// Registry of constraint kinds, keyed by type tag.
#[derive(Clone)]
pub struct ConstraintTypemap {
    entries: BTreeMap<String, ConstraintConstructorFn>,
}

impl ConstraintTypemap {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, tag: impl Into<String>, ctor: ConstraintConstructorFn) -> &mut Self {
        self.entries.insert(tag.into(), ctor);
        self
    }

    pub fn lookup(&self, tag: &str) -> EnerpackResult<ConstraintConstructorFn> {
        self.entries.get(tag.trim()).copied().ok_or_else(|| {
            EnerpackError::Build(format!(
                "no constraint typemap entry for type '{}'",
                tag.trim()
            ))
        })
    }
}

impl Default for ConstraintTypemap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.insert("generic_integral_limit", construct_integral_limit);
        map.insert("joint_extension_limit", construct_extension_limit);
        map
    }
}

impl std::fmt::Debug for ConstraintTypemap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintTypemap")
            .field("tags", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConstraintFacade {
    /// Build a constraint facade from a raw row through the typemap.
    pub fn from_row(row: &ConstraintRow, typemap: &ConstraintTypemap) -> EnerpackResult<Self> {
        let ctor = typemap.lookup(&row.type_tag)?;
        let mut bag = AttributeBag::from_map(row.parameters.clone());
        ctor(row.name.clone(), &mut bag)
    }

    /// Normalize against a deserialized system.
    pub fn build_constraint(&self, system: &EnergySystem) -> EnerpackResult<ConstraintExpr> {
        match &self.kind {
            ConstraintKind::GenericIntegralLimit { keyword, limit } => {
                let mut terms = Vec::new();
                for (source, target, _flow) in system.flows() {
                    let Some(Node::Component(facade)) = system.node(source) else {
                        continue;
                    };
                    let weight = facade
                        .edge_parameters
                        .get(keyword)
                        .or_else(|| facade.custom_attributes.get(keyword))
                        .and_then(value_to_field)
                        .and_then(|v| v.leading());
                    if let Some(weight) = weight {
                        terms.push(ConstraintTerm {
                            source: source.to_string(),
                            target: target.to_string(),
                            weight,
                        });
                    }
                }
                Ok(ConstraintExpr {
                    name: self.name.clone(),
                    terms,
                    upper_bound: *limit,
                })
            }
            ConstraintKind::JointExtensionLimit { limit } => {
                let terms = system
                    .flows()
                    .into_iter()
                    .filter(|(_, _, flow)| flow.investment.is_some())
                    .map(|(source, target, _)| ConstraintTerm {
                        source: source.to_string(),
                        target: target.to_string(),
                        weight: 1.0,
                    })
                    .collect();
                Ok(ConstraintExpr {
                    name: self.name.clone(),
                    terms,
                    upper_bound: *limit,
                })
            }
        }
    }
}
