//! Hydro reservoirs: a storage body fed by an implicitly created inflow
//! source.
//!
//! The inflow source is the canonical subnode case: it is owned exclusively
//! by its reservoir, carries a derived label (`<label>-inflow`), and enters
//! the graph only when the reservoir does. Its output targets the reservoir
//! itself rather than a bus.

use serde::{Deserialize, Serialize};

use crate::error::EnerpackResult;
use crate::facades::{
    build_investment, finish, AttributeBag, Facade, FacadeKind, PortSet, Subnode, Volatile,
};
use crate::flow::{FieldValue, Flow, Investment, Port};

pub const REQUIRED: &[&str] = &[
    "bus",
    "carrier",
    "tech",
    "storage_capacity",
    "capacity",
    "profile",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservoir {
    pub bus: String,
    /// Energy content limit of the reservoir body
    pub storage_capacity: FieldValue,
    /// Turbine power limit
    pub capacity: f64,
    /// Natural inflow profile, in units of energy per timestep
    pub profile: FieldValue,
    pub efficiency: f64,
    /// Absolute fill level at the first timestep
    pub initial_fill: Option<f64>,
    pub marginal_cost: Option<FieldValue>,
    pub capacity_cost: Option<FieldValue>,
    pub capacity_potential: Option<FieldValue>,
    pub expandable: bool,
}

impl Reservoir {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "reservoir", label)?;
        let storage_capacity = bag.require_field_value("storage_capacity", "reservoir", label)?;
        let capacity = bag.require_f64("capacity", "reservoir", label)?;
        let profile = bag.require_field_value("profile", "reservoir", label)?;
        let expandable = bag.take_bool("expandable")?.unwrap_or(false);
        let initial_fill = if expandable {
            None
        } else {
            storage_capacity.leading().map(|c| c * 0.5)
        };
        Ok(Self {
            bus,
            storage_capacity,
            capacity,
            profile,
            efficiency: bag.take_f64("efficiency")?.unwrap_or(1.0),
            initial_fill,
            marginal_cost: bag.take_field_value("marginal_cost")?,
            capacity_cost: bag.take_field_value("capacity_cost")?,
            capacity_potential: bag.take_field_value("capacity_potential")?,
            expandable,
        })
    }

    pub fn nominal_value(&self) -> Option<f64> {
        if self.expandable {
            None
        } else {
            Some(self.capacity)
        }
    }

    pub fn investment(&self) -> EnerpackResult<Option<Investment>> {
        build_investment(
            self.expandable,
            Some(self.capacity),
            self.capacity_potential.as_ref(),
            self.capacity_cost.as_ref(),
        )
    }

    pub fn build_ports(&self, label: &str) -> EnerpackResult<PortSet> {
        let turbine = Flow::new()
            .with_nominal_value(self.nominal_value())
            .with_conversion_factor(FieldValue::Scalar(self.efficiency))
            .with_variable_costs(self.marginal_cost.clone())
            .with_investment(self.investment()?);

        // The inflow source feeds the reservoir body directly, not a bus.
        let inflow = Volatile {
            bus: label.to_string(),
            capacity: Some(1.0),
            profile: self.profile.clone(),
            marginal_cost: None,
            fixed_costs: None,
            capacity_cost: None,
            capacity_potential: None,
            expandable: false,
        };
        let inflow_ports = inflow.build_ports(label)?;
        let inflow_facade = Facade::new(
            format!("{}-inflow", label),
            FacadeKind::Volatile(inflow),
        );

        Ok(PortSet {
            inputs: Vec::new(),
            outputs: vec![Port::new(&self.bus, turbine)],
            subnodes: vec![Subnode {
                facade: inflow_facade,
                inputs: inflow_ports.inputs,
                outputs: inflow_ports.outputs,
            }],
            unknown_edge_parameters: Vec::new(),
        })
    }
}

pub fn construct(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("reservoir", &label, REQUIRED)?;
    let payload = Reservoir::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Reservoir(payload)))
}
