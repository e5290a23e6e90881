//! Supply-side kinds: dispatchable and volatile generators, commodities.

use serde::{Deserialize, Serialize};

use crate::error::EnerpackResult;
use crate::facades::{build_investment, finish, AttributeBag, Facade, FacadeKind, PortSet};
use crate::flow::{FieldValue, Flow, Investment, Port};

pub const DISPATCHABLE_REQUIRED: &[&str] = &["bus", "carrier", "tech"];
pub const VOLATILE_REQUIRED: &[&str] = &["bus", "carrier", "tech", "profile"];
pub const COMMODITY_REQUIRED: &[&str] = &["bus", "carrier", "amount"];

/// A generator whose output is freely dispatched up to its capacity,
/// optionally limited by a per-timestep availability profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatchable {
    pub bus: String,
    pub capacity: Option<f64>,
    /// Per-timestep ceiling relative to capacity
    pub profile: Option<FieldValue>,
    pub marginal_cost: Option<FieldValue>,
    pub fixed_costs: Option<FieldValue>,
    pub capacity_cost: Option<FieldValue>,
    pub capacity_potential: Option<FieldValue>,
    pub expandable: bool,
}

impl Dispatchable {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "dispatchable", label)?;
        Ok(Self {
            bus,
            capacity: bag.take_f64("capacity")?,
            profile: bag.take_field_value("profile")?,
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
        let mut flow = Flow::new()
            .with_nominal_value(self.nominal_value())
            .with_variable_costs(self.marginal_cost.clone())
            .with_fixed_costs(self.fixed_costs.clone())
            .with_investment(self.investment()?);
        if let Some(profile) = &self.profile {
            flow = flow.with_max(profile.clone());
        }
        Ok(PortSet {
            outputs: vec![Port::new(&self.bus, flow)],
            ..PortSet::default()
        })
    }
}

pub fn construct_dispatchable(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("dispatchable", &label, DISPATCHABLE_REQUIRED)?;
    let payload = Dispatchable::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Dispatchable(payload)))
}

/// A generator whose output follows a fixed per-timestep profile
/// (wind, solar, run-of-river).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volatile {
    pub bus: String,
    pub capacity: Option<f64>,
    /// Fixed generation profile relative to capacity
    pub profile: FieldValue,
    pub marginal_cost: Option<FieldValue>,
    pub fixed_costs: Option<FieldValue>,
    pub capacity_cost: Option<FieldValue>,
    pub capacity_potential: Option<FieldValue>,
    pub expandable: bool,
}

impl Volatile {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "volatile", label)?;
        let profile = bag.require_field_value("profile", "volatile", label)?;
        Ok(Self {
            bus,
            capacity: bag.take_f64("capacity")?,
            profile,
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
        let flow = Flow::new()
            .with_nominal_value(self.nominal_value())
            .with_fix(self.profile.clone())
            .with_variable_costs(self.marginal_cost.clone())
            .with_fixed_costs(self.fixed_costs.clone())
            .with_investment(self.investment()?);
        Ok(PortSet {
            outputs: vec![Port::new(&self.bus, flow)],
            ..PortSet::default()
        })
    }
}

pub fn construct_volatile(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("volatile", &label, VOLATILE_REQUIRED)?;
    let payload = Volatile::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Volatile(payload)))
}

/// A finite stock of a carrier, capped over the whole horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub bus: String,
    /// Total available amount over the horizon
    pub amount: f64,
    pub marginal_cost: Option<FieldValue>,
}

impl Commodity {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let bus = bag.require_string("bus", "commodity", label)?;
        let amount = bag.require_f64("amount", "commodity", label)?;
        Ok(Self {
            bus,
            amount,
            marginal_cost: bag.take_field_value("marginal_cost")?,
        })
    }

    pub fn build_ports(&self, _label: &str) -> EnerpackResult<PortSet> {
        // nominal_value = amount with one full-load hour caps the horizon
        // total at exactly `amount`
        let flow = Flow::new()
            .with_nominal_value(Some(self.amount))
            .with_full_load_time_max(Some(1.0))
            .with_variable_costs(self.marginal_cost.clone());
        Ok(PortSet {
            outputs: vec![Port::new(&self.bus, flow)],
            ..PortSet::default()
        })
    }
}

pub fn construct_commodity(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("commodity", &label, COMMODITY_REQUIRED)?;
    let payload = Commodity::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Commodity(payload)))
}
