//! Demand-side kinds: loads plus the excess/shortage slack components.

use serde::{Deserialize, Serialize};

use crate::error::EnerpackResult;
use crate::facades::{finish, AttributeBag, Facade, FacadeKind, PortSet};
use crate::flow::{FieldValue, Flow, Port};

pub const LOAD_REQUIRED: &[&str] = &["bus", "amount", "profile"];
pub const EXCESS_REQUIRED: &[&str] = &["bus"];
pub const SHORTAGE_REQUIRED: &[&str] = &["bus"];

/// A fixed demand: `amount` scaled by a per-timestep profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub bus: String,
    pub amount: f64,
    pub profile: FieldValue,
}

impl Load {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "load", label)?;
        let amount = bag.require_f64("amount", "load", label)?;
        let profile = bag.require_field_value("profile", "load", label)?;
        Ok(Self {
            bus,
            amount,
            profile,
        })
    }

    pub fn build_ports(&self, _label: &str) -> EnerpackResult<PortSet> {
        let flow = Flow::new()
            .with_nominal_value(Some(self.amount))
            .with_fix(self.profile.clone());
        Ok(PortSet {
            inputs: vec![Port::new(&self.bus, flow)],
            ..PortSet::default()
        })
    }
}

pub fn construct_load(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("load", &label, LOAD_REQUIRED)?;
    let payload = Load::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Load(payload)))
}

/// Slack sink absorbing surplus on a bus, at a cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excess {
    pub bus: String,
    pub marginal_cost: Option<FieldValue>,
}

impl Excess {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "excess", label)?;
        Ok(Self {
            bus,
            marginal_cost: bag.take_field_value("marginal_cost")?,
        })
    }

    /// Bare slack sink on the given bus.
    pub fn slack(bus: impl Into<String>) -> Self {
        Self {
            bus: bus.into(),
            marginal_cost: None,
        }
    }

    pub fn build_ports(&self, _label: &str) -> EnerpackResult<PortSet> {
        let flow = Flow::new().with_variable_costs(self.marginal_cost.clone());
        Ok(PortSet {
            inputs: vec![Port::new(&self.bus, flow)],
            ..PortSet::default()
        })
    }
}

pub fn construct_excess(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("excess", &label, EXCESS_REQUIRED)?;
    let payload = Excess::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Excess(payload)))
}

/// Slack source covering unmet demand on a bus, at a cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    pub bus: String,
    pub marginal_cost: Option<FieldValue>,
}

impl Shortage {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "shortage", label)?;
        Ok(Self {
            bus,
            marginal_cost: bag.take_field_value("marginal_cost")?,
        })
    }

    pub fn build_ports(&self, _label: &str) -> EnerpackResult<PortSet> {
        let flow = Flow::new().with_variable_costs(self.marginal_cost.clone());
        Ok(PortSet {
            outputs: vec![Port::new(&self.bus, flow)],
            ..PortSet::default()
        })
    }
}

pub fn construct_shortage(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("shortage", &label, SHORTAGE_REQUIRED)?;
    let payload = Shortage::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Shortage(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(entries: &[(&str, serde_json::Value)]) -> AttributeBag {
        let mut b = AttributeBag::new();
        for (k, v) in entries {
            b.insert(*k, v.clone());
        }
        b
    }

    #[test]
    fn test_load_fixed_demand() {
        let mut b = bag(&[
            ("bus", json!("electricity")),
            ("amount", json!(100.0)),
            ("profile", json!([0.3, 0.2, 0.5])),
        ]);
        let facade = construct_load("demand-el".into(), &mut b).unwrap();
        let ports = facade.build_ports().unwrap();
        assert_eq!(ports.inputs.len(), 1);
        assert_eq!(ports.outputs.len(), 0);
        assert_eq!(ports.inputs[0].flow.nominal_value, Some(100.0));
        assert_eq!(
            ports.inputs[0].flow.fix,
            Some(FieldValue::Series(vec![0.3, 0.2, 0.5]))
        );
    }

    #[test]
    fn test_load_missing_amount() {
        let mut b = bag(&[
            ("bus", json!("electricity")),
            ("profile", json!([1.0])),
        ]);
        let err = construct_load("demand-el".into(), &mut b).unwrap_err();
        assert!(err.to_string().contains("amount"));
        assert!(err.to_string().contains("load"));
    }

    #[test]
    fn test_shortage_is_a_source() {
        let mut b = bag(&[("bus", json!("heat")), ("marginal_cost", json!(3000.0))]);
        let facade = construct_shortage("heat-shortage".into(), &mut b).unwrap();
        let ports = facade.build_ports().unwrap();
        assert!(ports.inputs.is_empty());
        assert_eq!(ports.outputs[0].bus, "heat");
    }
}
