//! Storage components with paired charge/discharge flows.

use serde::{Deserialize, Serialize};

use crate::error::EnerpackResult;
use crate::facades::{build_investment, finish, AttributeBag, Facade, FacadeKind, PortSet};
use crate::flow::{FieldValue, Flow, Investment, Port};

pub const REQUIRED: &[&str] = &["bus", "carrier", "tech"];

/// A storage: energy content (`storage_capacity`) with symmetric
/// charge/discharge power (`capacity`).
///
/// The initial fill level follows the half-of-capacity convention: half of
/// the nominal storage capacity unless the storage is expandable, in which
/// case the level is left free for the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub bus: String,
    /// Energy content limit; periodic list in multi-period models
    pub storage_capacity: Option<FieldValue>,
    /// Charge/discharge power limit
    pub capacity: Option<f64>,
    pub efficiency: f64,
    /// Relative loss of stored energy per timestep
    pub loss_rate: f64,
    /// Absolute fill level at the first timestep
    pub initial_fill: Option<f64>,
    pub marginal_cost: Option<FieldValue>,
    pub fixed_costs: Option<FieldValue>,
    pub capacity_cost: Option<FieldValue>,
    pub capacity_potential: Option<FieldValue>,
    pub storage_capacity_cost: Option<FieldValue>,
    pub storage_capacity_potential: Option<FieldValue>,
    pub expandable: bool,
}

impl Storage {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "storage", label)?;
        let storage_capacity = bag.take_field_value("storage_capacity")?;
        let expandable = bag.take_bool("expandable")?.unwrap_or(false);
        let initial_fill = if expandable {
            None
        } else {
            storage_capacity
                .as_ref()
                .and_then(FieldValue::leading)
                .map(|c| c * 0.5)
        };
        Ok(Self {
            bus,
            storage_capacity,
            capacity: bag.take_f64("capacity")?,
            efficiency: bag.take_f64("efficiency")?.unwrap_or(1.0),
            loss_rate: bag.take_f64("loss_rate")?.unwrap_or(0.0),
            initial_fill,
            marginal_cost: bag.take_field_value("marginal_cost")?,
            fixed_costs: bag.take_field_value("fixed_costs")?,
            capacity_cost: bag.take_field_value("capacity_cost")?,
            capacity_potential: bag.take_field_value("capacity_potential")?,
            storage_capacity_cost: bag.take_field_value("storage_capacity_cost")?,
            storage_capacity_potential: bag.take_field_value("storage_capacity_potential")?,
            expandable,
        })
    }

    pub fn nominal_value(&self) -> Option<f64> {
        if self.expandable {
            None
        } else {
            self.capacity
        }
    }

    /// Investment on the charge/discharge power.
    pub fn investment(&self) -> EnerpackResult<Option<Investment>> {
        build_investment(
            self.expandable,
            self.capacity,
            self.capacity_potential.as_ref(),
            self.capacity_cost.as_ref(),
        )
    }

    /// Investment on the energy content.
    pub fn storage_investment(&self) -> EnerpackResult<Option<Investment>> {
        build_investment(
            self.expandable,
            self.storage_capacity.as_ref().and_then(FieldValue::leading),
            self.storage_capacity_potential.as_ref(),
            self.storage_capacity_cost.as_ref(),
        )
    }

    pub fn build_ports(&self, _label: &str) -> EnerpackResult<PortSet> {
        let investment = self.investment()?;
        let charge = Flow::new()
            .with_nominal_value(self.nominal_value())
            .with_conversion_factor(FieldValue::Scalar(self.efficiency))
            .with_investment(investment.clone());
        let discharge = Flow::new()
            .with_nominal_value(self.nominal_value())
            .with_conversion_factor(FieldValue::Scalar(self.efficiency))
            .with_variable_costs(self.marginal_cost.clone())
            .with_fixed_costs(self.fixed_costs.clone())
            .with_investment(investment);
        Ok(PortSet {
            inputs: vec![Port::new(&self.bus, charge)],
            outputs: vec![Port::new(&self.bus, discharge)],
            ..PortSet::default()
        })
    }
}

pub fn construct(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("storage", &label, REQUIRED)?;
    let payload = Storage::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Storage(payload)))
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
    fn test_default_fill_is_half_capacity() {
        let mut b = bag(&[
            ("bus", json!("electricity")),
            ("carrier", json!("lithium")),
            ("tech", json!("battery")),
            ("storage_capacity", json!(100.0)),
            ("capacity", json!(25.0)),
        ]);
        let facade = construct("battery-1".into(), &mut b).unwrap();
        match &facade.kind {
            FacadeKind::Storage(s) => assert_eq!(s.initial_fill, Some(50.0)),
            other => panic!("unexpected kind {:?}", other.name()),
        }
    }

    #[test]
    fn test_expandable_leaves_fill_free() {
        let mut b = bag(&[
            ("bus", json!("electricity")),
            ("carrier", json!("lithium")),
            ("tech", json!("battery")),
            ("storage_capacity", json!(100.0)),
            ("storage_capacity_potential", json!(500.0)),
            ("expandable", json!(true)),
        ]);
        let facade = construct("battery-2".into(), &mut b).unwrap();
        match &facade.kind {
            FacadeKind::Storage(s) => {
                assert_eq!(s.initial_fill, None);
                let inv = s.storage_investment().unwrap().unwrap();
                assert_eq!(inv.maximum, 400.0);
            }
            other => panic!("unexpected kind {:?}", other.name()),
        }
    }

    #[test]
    fn test_paired_ports_share_bus() {
        let mut b = bag(&[
            ("bus", json!("electricity")),
            ("carrier", json!("lithium")),
            ("tech", json!("battery")),
            ("storage_capacity", json!(40.0)),
            ("capacity", json!(10.0)),
            ("efficiency", json!(0.95)),
        ]);
        let facade = construct("battery-3".into(), &mut b).unwrap();
        let ports = facade.build_ports().unwrap();
        assert_eq!(ports.inputs.len(), 1);
        assert_eq!(ports.outputs.len(), 1);
        assert_eq!(ports.inputs[0].bus, ports.outputs[0].bus);
        assert_eq!(
            ports.inputs[0].flow.conversion_factor,
            Some(FieldValue::Scalar(0.95))
        );
    }

    #[test]
    fn test_storage_potential_violation() {
        let mut b = bag(&[
            ("bus", json!("electricity")),
            ("carrier", json!("lithium")),
            ("tech", json!("battery")),
            ("storage_capacity", json!(800.0)),
            ("storage_capacity_potential", json!(500.0)),
            ("expandable", json!(true)),
        ]);
        let facade = construct("battery-4".into(), &mut b).unwrap();
        match &facade.kind {
            FacadeKind::Storage(s) => assert!(s.storage_investment().is_err()),
            other => panic!("unexpected kind {:?}", other.name()),
        }
    }
}
