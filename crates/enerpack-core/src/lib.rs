//! # enerpack-core: Energy System Domain Model
//!
//! Provides the typed component model and graph container that tabular
//! datapackage descriptions are deserialized into.
//!
//! ## Design Philosophy
//!
//! Systems are modeled as **directed graphs** where:
//! - **Nodes**: Buses (carrier balance points) and Components (typed
//!   facades: generators, loads, storages, links, ...)
//! - **Edges**: Flows, carrying capacity bounds, profiles, costs, and
//!   optional investment descriptors
//!
//! Component kinds form a closed enum ([`FacadeKind`]) with a generic
//! [`Facade`] wrapper holding the common fields (label, carrier, tech,
//! custom attributes). Construction is driven by a [`Typemap`] mapping
//! type-name strings to constructor functions, so the I/O layer never
//! needs to know kind internals.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enerpack_core::*;
//! use chrono::NaiveDate;
//!
//! let timeindex = TimeIndex::single(
//!     NaiveDate::from_ymd_opt(2024, 1, 1)
//!         .unwrap()
//!         .and_hms_opt(0, 0, 0)
//!         .unwrap(),
//! );
//! let mut system = EnergySystem::new(timeindex, Typemap::default());
//!
//! system.add_bus(Bus::new("electricity")).unwrap();
//!
//! let wind = Facade::new(
//!     "wind-onshore",
//!     FacadeKind::Volatile(Volatile {
//!         bus: "electricity".into(),
//!         capacity: Some(120.0),
//!         profile: FieldValue::Series(vec![0.2, 0.7, 0.4]),
//!         marginal_cost: None,
//!         fixed_costs: None,
//!         capacity_cost: None,
//!         capacity_potential: None,
//!         expandable: false,
//!     }),
//! );
//! system.add_component(wind).unwrap();
//!
//! println!("{}", system.stats());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Unified error type for the enerpack ecosystem
//! - [`facades`] - Component kinds, attribute bags, type/attribute maps
//! - [`flow`] - Flow payloads and the investment descriptor
//! - [`system`] - The `EnergySystem` graph container
//! - [`time`] - Time index and period data structures
//!
//! ## Integration with enerpack-io
//!
//! The enerpack-io crate reads datapackage directories (CSV resources plus
//! a JSON manifest), resolves foreign keys, and constructs [`EnergySystem`]
//! graphs through the typemap. See `enerpack_io` documentation.

pub mod error;
pub mod facades;
pub mod flow;
pub mod system;
pub mod time;

pub use error::{EnerpackError, EnerpackResult};
pub use facades::{
    AttributeBag, AttributeMap, Commodity, ComponentType, ConstructorFn, Conversion, Dispatchable,
    Excess, Facade, FacadeKind, Link, Load, PortSet, Reservoir, Shortage, Storage, Subnode,
    TypeRole, Typemap, Volatile,
};
pub use flow::{FieldValue, Flow, Investment, Port};
pub use petgraph::graph::NodeIndex;
pub use system::{Bus, ComponentInsert, EnergySystem, Node, SystemStats};
pub use time::{Periods, TimeIndex};
