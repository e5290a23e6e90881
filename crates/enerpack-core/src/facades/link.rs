//! Bidirectional connection between two buses with transfer losses.

use serde::{Deserialize, Serialize};

use crate::error::EnerpackResult;
use crate::facades::{build_investment, finish, AttributeBag, Facade, FacadeKind, PortSet};
use crate::flow::{FieldValue, Flow, Investment, Port};

pub const REQUIRED: &[&str] = &["from_bus", "to_bus"];

/// A transmission link: two directional edges sharing one `(1 - loss)`
/// conversion factor and one capacity limit per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub from_bus: String,
    pub to_bus: String,
    pub capacity: Option<f64>,
    /// Fraction of transferred energy lost, applied in both directions
    pub loss: f64,
    pub marginal_cost: Option<FieldValue>,
    pub capacity_cost: Option<FieldValue>,
    pub capacity_potential: Option<FieldValue>,
    pub expandable: bool,
}

impl Link {
    pub fn from_bag(label: &str, bag: &mut AttributeBag) -> EnerpackResult<Self> {
        let from_bus = bag.require_string("from_bus", "link", label)?;
        let to_bus = bag.require_string("to_bus", "link", label)?;
        Ok(Self {
            from_bus,
            to_bus,
            capacity: bag.take_f64("capacity")?,
            loss: bag.take_f64("loss")?.unwrap_or(0.0),
            marginal_cost: bag.take_field_value("marginal_cost")?,
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
        let factor = FieldValue::Scalar(1.0 - self.loss);
        let investment = self.investment()?;
        let directed = || {
            Flow::new()
                .with_nominal_value(self.nominal_value())
                .with_conversion_factor(factor.clone())
                .with_variable_costs(self.marginal_cost.clone())
                .with_investment(investment.clone())
        };
        Ok(PortSet {
            inputs: vec![
                Port::new(&self.from_bus, Flow::new()),
                Port::new(&self.to_bus, Flow::new()),
            ],
            outputs: vec![
                Port::new(&self.to_bus, directed()),
                Port::new(&self.from_bus, directed()),
            ],
            ..PortSet::default()
        })
    }
}

pub fn construct(label: String, bag: &mut AttributeBag) -> EnerpackResult<Facade> {
    bag.ensure_required("link", &label, REQUIRED)?;
    let payload = Link::from_bag(&label, bag)?;
    Ok(finish(label, bag, FacadeKind::Link(payload)))
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
    fn test_shared_loss_factor_both_directions() {
        let mut b = bag(&[
            ("from_bus", json!("el-north")),
            ("to_bus", json!("el-south")),
            ("capacity", json!(500.0)),
            ("loss", json!(0.04)),
        ]);
        let facade = construct("north-south".into(), &mut b).unwrap();
        let ports = facade.build_ports().unwrap();
        assert_eq!(ports.inputs.len(), 2);
        assert_eq!(ports.outputs.len(), 2);
        for port in &ports.outputs {
            assert_eq!(
                port.flow.conversion_factor,
                Some(FieldValue::Scalar(0.96))
            );
            assert_eq!(port.flow.nominal_value, Some(500.0));
        }
    }

    #[test]
    fn test_missing_to_bus() {
        let mut b = bag(&[("from_bus", json!("el-north"))]);
        let err = construct("broken-link".into(), &mut b).unwrap_err();
        assert!(err.to_string().contains("to_bus"));
    }
}
