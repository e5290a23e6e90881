//! One-input one-output conversion units (boilers, electrolysers, ...).

use serde::{Deserialize, Serialize};

use crate::error::EnerpackResult;
use crate::facades::{build_investment, finish, AttributeBag, Facade, FacadeKind, PortSet};
use crate::flow::{FieldValue, Flow, Investment, Port};

pub const REQUIRED: &[&str] = &["from_bus", "to_bus", "carrier", "tech"];

/// Converts a carrier from one bus into another with a fixed efficiency.
/// Capacity refers to the output side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub from_bus: String,
    pub to_bus: String,
    pub capacity: Option<f64>,
    pub efficiency: f64,
    pub marginal_cost: Option<FieldValue>,
    pub fixed_costs: Option<FieldValue>,
    pub capacity_cost: Option<FieldValue>,
    pub capacity_potential: Option<FieldValue>,
    pub expandable: bool,
}

impl Conversion {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let from_bus = bag.require_string("from_bus", "conversion", label)?;
        let to_bus = bag.require_string("to_bus", "conversion", label)?;
        Ok(Self {
            from_bus,
            to_bus,
            capacity: bag.take_f64("capacity")?,
            efficiency: bag.take_f64("efficiency")?.unwrap_or(1.0),
            marginal_cost: bag.take_field_value("marginal_cost")?,
            fixed_costs: bag.take_field_value("fixed_costs")?,
            capacity_cost: bag.take_field_value("capacity_cost")?,
            capacity_potential: bag.take_field_value("capacity_potential")?,
            expandable: bag.take_bool("expandable")?.unwrap_or(false),
        })
    }

    pub fn nominal_value(&self) -> Option<f64> {
        if self.expandable {
            None
        } else {
            self.capacity
        }
    }

    pub fn investment(&self) -> EnerpackResult<Option<Investment>> {
        build_investment(
            self.expandable,
            self.capacity,
            self.capacity_potential.as_ref(),
            self.capacity_cost.as_ref(),
        )
    }

    pub fn build_ports(&self, _label: &str) -> EnerpackResult<PortSet> {
        let output = Flow::new()
            .with_nominal_value(self.nominal_value())
            .with_conversion_factor(FieldValue::Scalar(self.efficiency))
            .with_variable_costs(self.marginal_cost.clone())
            .with_fixed_costs(self.fixed_costs.clone())
            .with_investment(self.investment()?);
        Ok(PortSet {
            inputs: vec![Port::new(&self.from_bus, Flow::new())],
            outputs: vec![Port::new(&self.to_bus, output)],
            ..PortSet::default()
        })
    }
}

pub fn construct(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("conversion", &label, REQUIRED)?;
    let payload = Conversion::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Conversion(payload)))
}
