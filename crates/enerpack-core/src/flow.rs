//! Flow payloads and the capacity-investment descriptor.
//!
//! A [`Flow`] is the edge payload between a component and a bus: capacity
//! bounds, per-timestep profiles, costs, and the optional [`Investment`]
//! descriptor when the capacity is an optimization output rather than a
//! fixed input.

use serde::{Deserialize, Serialize};

use crate::error::{EnerpackError, EnerpackResult};

/// A numeric attribute that is either a scalar or a per-step series.
///
/// Periodic attributes in multi-period models are stored as `Series` with
/// one entry per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(f64),
    Series(Vec<f64>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FieldValue::Scalar(v) => Some(*v),
            FieldValue::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            FieldValue::Scalar(_) => None,
            FieldValue::Series(s) => Some(s),
        }
    }

    /// Scalar value, or the first entry of a series.
    pub fn leading(&self) -> Option<f64> {
        match self {
            FieldValue::Scalar(v) => Some(*v),
            FieldValue::Series(s) => s.first().copied(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Scalar(v)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        FieldValue::Series(v)
    }
}

/// Capacity-investment descriptor for expandable components.
///
/// `maximum` is the additional capacity the optimizer may build on top of
/// `existing`. Constructed via [`Investment::new`], which enforces
/// `existing <= potential`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    /// Maximum additional capacity (`potential - existing`)
    pub maximum: f64,
    /// Capacity already installed
    pub existing: f64,
    /// Cost per unit of added capacity (scalar, or one value per period)
    pub cost: Option<FieldValue>,
}

impl Investment {
    /// Build an investment descriptor bounded by `potential - existing`.
    ///
    /// `potential` defaults to unbounded when `None`.
    pub fn new(
        potential: Option<f64>,
        existing: f64,
        cost: Option<FieldValue>,
    ) -> EnerpackResult<Self> {
        let potential = potential.unwrap_or(f64::INFINITY);
        if existing > potential {
            return Err(EnerpackError::Validation(format!(
                "existing capacity {} exceeds capacity potential {}",
                existing, potential
            )));
        }
        Ok(Self {
            maximum: potential - existing,
            existing,
            cost,
        })
    }
}

/// Edge payload between a component and a bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Fixed capacity; `None` when the capacity is optimized (see `investment`)
    pub nominal_value: Option<f64>,
    /// Fixed per-timestep profile (actual flow = profile * nominal_value)
    pub fix: Option<FieldValue>,
    /// Lower bound relative to nominal value
    pub min: Option<FieldValue>,
    /// Upper bound relative to nominal value (per-timestep ceiling)
    pub max: Option<FieldValue>,
    /// Cost per unit of flow
    pub variable_costs: Option<FieldValue>,
    /// Cost per unit of capacity and year, independent of dispatch
    pub fixed_costs: Option<FieldValue>,
    /// Cap on flow summed over the horizon, in hours at nominal value
    pub full_load_time_max: Option<f64>,
    /// Conversion factor applied along this flow (links, conversion units)
    pub conversion_factor: Option<FieldValue>,
    /// Investment descriptor when the capacity is expandable
    pub investment: Option<Investment>,
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            nominal_value: None,
            fix: None,
            min: None,
            max: None,
            variable_costs: None,
            fixed_costs: None,
            full_load_time_max: None,
            conversion_factor: None,
            investment: None,
        }
    }
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nominal_value(mut self, nominal_value: Option<f64>) -> Self {
        self.nominal_value = nominal_value;
        self
    }

    pub fn with_fix(mut self, fix: FieldValue) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn with_conversion_factor(mut self, factor: FieldValue) -> Self {
        self.conversion_factor = Some(factor);
        self
    }

    pub fn with_max(mut self, max: FieldValue) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_min(mut self, min: FieldValue) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_variable_costs(mut self, costs: Option<FieldValue>) -> Self {
        self.variable_costs = costs;
        self
    }

    pub fn with_fixed_costs(mut self, costs: Option<FieldValue>) -> Self {
        self.fixed_costs = costs;
        self
    }

    pub fn with_full_load_time_max(mut self, hours: Option<f64>) -> Self {
        self.full_load_time_max = hours;
        self
    }

    pub fn with_investment(mut self, investment: Option<Investment>) -> Self {
        self.investment = investment;
        self
    }

    /// A flow is expandable when it carries an investment descriptor.
    pub fn is_expandable(&self) -> bool {
        self.investment.is_some()
    }
}

/// A directed attachment of a component to a bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub bus: String,
    pub flow: Flow,
}

impl Port {
    pub fn new(bus: impl Into<String>, flow: Flow) -> Self {
        Self {
            bus: bus.into(),
            flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_investment_bound() {
        let inv = Investment::new(Some(100.0), 40.0, None).unwrap();
        assert_eq!(inv.maximum, 60.0);
        assert_eq!(inv.existing, 40.0);
    }

    #[test]
    fn test_investment_infeasible() {
        let err = Investment::new(Some(50.0), 80.0, None).unwrap_err();
        assert!(err.to_string().contains("exceeds capacity potential"));
    }

    #[test]
    fn test_investment_unbounded_potential() {
        let inv = Investment::new(None, 10.0, Some(FieldValue::Scalar(25.0))).unwrap();
        assert!(inv.maximum.is_infinite());
    }

    #[test]
    fn test_flow_builders() {
        let flow = Flow::new()
            .with_nominal_value(Some(1000.0))
            .with_max(FieldValue::Series(vec![0.3, 0.2, 0.5]))
            .with_variable_costs(Some(FieldValue::Scalar(12.0)));
        assert_eq!(flow.nominal_value, Some(1000.0));
        assert!(!flow.is_expandable());
        assert_eq!(flow.max.unwrap().as_series().unwrap().len(), 3);
    }
}
