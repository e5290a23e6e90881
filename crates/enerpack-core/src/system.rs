//! The materialized energy system: a directed graph of buses and typed
//! components connected by flows, plus the assembled time index.
//!
//! Buses and components are nodes; every port built by a facade becomes a
//! directed edge carrying its [`Flow`] payload. Inputs point from the bus
//! into the component, outputs from the component into the bus, so bus
//! balances and flow directions stay explicit for the downstream
//! optimization model.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::error::{EnerpackError, EnerpackResult};
use crate::facades::{Facade, Typemap};
use crate::flow::Flow;
use crate::time::{Periods, TimeIndex};

/// A carrier balance point. Buses have no temporal state of their own;
/// they exist as edge endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub label: String,
    /// Whether inflows and outflows must balance each timestep
    pub balanced: bool,
}

impl Bus {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            balanced: true,
        }
    }

    pub fn unbalanced(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            balanced: false,
        }
    }
}

/// A node of the system graph.
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Component(Facade),
}

impl Node {
    /// Human-readable label of the node.
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.label,
            Node::Component(facade) => &facade.label,
        }
    }

    pub fn is_bus(&self) -> bool {
        matches!(self, Node::Bus(_))
    }
}

/// Outcome of inserting a component: its index, the indices of any
/// subnodes added alongside it, and edge-parameter keys that matched no
/// flow field (surfaced as warnings by the import layer).
#[derive(Debug)]
pub struct ComponentInsert {
    pub index: NodeIndex,
    pub subnode_indices: Vec<NodeIndex>,
    pub unknown_edge_parameters: Vec<String>,
}

/// The deserialized energy system handed to the optimization engine.
#[derive(Debug)]
pub struct EnergySystem {
    pub graph: DiGraph<Node, Flow>,
    pub timeindex: TimeIndex,
    pub periods: Option<Periods>,
    pub typemap: Typemap,
    labels: HashMap<String, NodeIndex>,
}

impl EnergySystem {
    pub fn new(timeindex: TimeIndex, typemap: Typemap) -> Self {
        Self {
            graph: DiGraph::new(),
            timeindex,
            periods: None,
            typemap,
            labels: HashMap::new(),
        }
    }

    pub fn with_periods(mut self, periods: Option<Periods>) -> Self {
        self.periods = periods;
        self
    }

    fn register(&mut self, label: &str, index: NodeIndex) -> EnerpackResult<()> {
        if self.labels.contains_key(label) {
            return Err(EnerpackError::Validation(format!(
                "duplicate label '{}': names must be unique within a package",
                label
            )));
        }
        self.labels.insert(label.to_string(), index);
        Ok(())
    }

    /// Add a bus. Buses must exist before the components referencing them.
    pub fn add_bus(&mut self, bus: Bus) -> EnerpackResult<NodeIndex> {
        let label = bus.label.clone();
        let index = self.graph.add_node(Node::Bus(bus));
        if let Err(err) = self.register(&label, index) {
            self.graph.remove_node(index);
            return Err(err);
        }
        Ok(index)
    }

    /// Add a component facade: builds its ports, inserts the node, wires
    /// the flows, and adds any owned subnodes (flattened one level).
    pub fn add_component(&mut self, facade: Facade) -> EnerpackResult<ComponentInsert> {
        let ports = facade.build_ports()?;
        let label = facade.label.clone();

        let index = self.graph.add_node(Node::Component(facade));
        if let Err(err) = self.register(&label, index) {
            self.graph.remove_node(index);
            return Err(err);
        }

        for port in ports.inputs {
            let bus_index = self.resolve_endpoint(&port.bus, &label)?;
            self.graph.add_edge(bus_index, index, port.flow);
        }
        for port in ports.outputs {
            let bus_index = self.resolve_endpoint(&port.bus, &label)?;
            self.graph.add_edge(index, bus_index, port.flow);
        }

        let mut subnode_indices = Vec::with_capacity(ports.subnodes.len());
        for subnode in ports.subnodes {
            let sub_label = subnode.facade.label.clone();
            let sub_index = self.graph.add_node(Node::Component(subnode.facade));
            self.register(&sub_label, sub_index)?;
            for port in subnode.inputs {
                let endpoint = self.resolve_endpoint(&port.bus, &sub_label)?;
                self.graph.add_edge(endpoint, sub_index, port.flow);
            }
            for port in subnode.outputs {
                let endpoint = self.resolve_endpoint(&port.bus, &sub_label)?;
                self.graph.add_edge(sub_index, endpoint, port.flow);
            }
            subnode_indices.push(sub_index);
        }

        Ok(ComponentInsert {
            index,
            subnode_indices,
            unknown_edge_parameters: ports.unknown_edge_parameters,
        })
    }

    fn resolve_endpoint(&self, endpoint: &str, component: &str) -> EnerpackResult<NodeIndex> {
        self.labels.get(endpoint).copied().ok_or_else(|| {
            EnerpackError::Graph(format!(
                "component '{}' references unknown node '{}'",
                component, endpoint
            ))
        })
    }

    pub fn index_of(&self, label: &str) -> Option<NodeIndex> {
        self.labels.get(label).copied()
    }

    pub fn node(&self, label: &str) -> Option<&Node> {
        self.index_of(label).and_then(|ix| self.graph.node_weight(ix))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// All buses in insertion order.
    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// All components (facades and their subnodes).
    pub fn components(&self) -> Vec<&Facade> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Component(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// All flows as (source label, target label, payload).
    pub fn flows(&self) -> Vec<(&str, &str, &Flow)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| {
                let (source, target) = self.graph.edge_endpoints(edge)?;
                Some((
                    self.graph[source].label(),
                    self.graph[target].label(),
                    self.graph.edge_weight(edge)?,
                ))
            })
            .collect()
    }

    pub fn stats(&self) -> SystemStats {
        let mut stats = SystemStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Component(_) => stats.num_components += 1,
            }
        }
        stats.num_flows = self.graph.edge_count();
        stats.num_timesteps = self.timeindex.len();
        stats
    }
}

/// Size summary of a deserialized system.
#[derive(Debug, Clone, Default)]
pub struct SystemStats {
    pub num_buses: usize,
    pub num_components: usize,
    pub num_flows: usize,
    pub num_timesteps: usize,
}

impl std::fmt::Display for SystemStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} components, {} flows, {} timesteps",
            self.num_buses, self.num_components, self.num_flows, self.num_timesteps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facades::{AttributeBag, Typemap};
    use chrono::NaiveDate;
    use serde_json::json;

    fn one_step_index() -> TimeIndex {
        TimeIndex::single(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn dispatchable(label: &str, bus: &str, capacity: f64) -> Facade {
        let mut bag = AttributeBag::new();
        bag.insert("bus", json!(bus));
        bag.insert("carrier", json!("gas"));
        bag.insert("tech", json!("ccgt"));
        bag.insert("capacity", json!(capacity));
        let typemap = Typemap::default();
        match typemap.lookup("dispatchable").unwrap().role {
            crate::facades::TypeRole::Component(ctor) => ctor(label.into(), &mut bag).unwrap(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut system = EnergySystem::new(one_step_index(), Typemap::default());
        system.add_bus(Bus::new("electricity")).unwrap();
        let err = system.add_bus(Bus::new("electricity")).unwrap_err();
        assert!(err.to_string().contains("duplicate label"));
    }

    #[test]
    fn test_component_wires_to_bus() {
        let mut system = EnergySystem::new(one_step_index(), Typemap::default());
        system.add_bus(Bus::new("electricity")).unwrap();
        let insert = system
            .add_component(dispatchable("ccgt-1", "electricity", 400.0))
            .unwrap();
        assert!(insert.subnode_indices.is_empty());

        let stats = system.stats();
        assert_eq!(stats.num_buses, 1);
        assert_eq!(stats.num_components, 1);
        assert_eq!(stats.num_flows, 1);

        let flows = system.flows();
        assert_eq!(flows[0].0, "ccgt-1");
        assert_eq!(flows[0].1, "electricity");
        assert_eq!(flows[0].2.nominal_value, Some(400.0));
    }

    #[test]
    fn test_unknown_bus_is_a_graph_error() {
        let mut system = EnergySystem::new(one_step_index(), Typemap::default());
        let err = system
            .add_component(dispatchable("ccgt-1", "electricity", 400.0))
            .unwrap_err();
        assert!(matches!(err, EnerpackError::Graph(_)));
        assert!(err.to_string().contains("electricity"));
    }

    #[test]
    fn test_component_and_bus_share_namespace() {
        let mut system = EnergySystem::new(one_step_index(), Typemap::default());
        system.add_bus(Bus::new("electricity")).unwrap();
        system
            .add_component(dispatchable("unit-a", "electricity", 10.0))
            .unwrap();
        let err = system.add_bus(Bus::new("unit-a")).unwrap_err();
        assert!(err.to_string().contains("duplicate label"));
    }
}
