//! # enerpack-io: Datapackage Reading & Deserialization
//!
//! Reads tabular datapackage descriptions of an energy system (CSV
//! resources plus a `datapackage.json` manifest) and deserializes them
//! into [`enerpack_core::EnergySystem`] graphs ready for optimization.
//!
//! ## Design Philosophy
//!
//! **Two-pass construction**: foreign keys across element resources form a
//! reference graph that is topologically sorted before any facade is
//! constructed. Reference cycles are detected and rejected instead of
//! overflowing the stack on recursive construction.
//!
//! **Schema-light reading**: element tables have unknown, variable
//! columns. Cells are sniffed into JSON values (inline JSON, booleans,
//! numbers, strings) and typed by the facade constructors, so new
//! parameters flow through without reader changes.
//!
//! **Diagnostics over panics**: non-fatal conditions (unsupported
//! descriptor version, heuristic multi-period expansion, unmatched edge
//! parameters) are collected in [`helpers::ImportDiagnostics`] and
//! mirrored as `tracing` events; hard errors abort the whole call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enerpack_io::deserialize_energy_system;
//!
//! fn main() -> enerpack_core::EnerpackResult<()> {
//!     let result = deserialize_energy_system("dispatch-example")?;
//!     let system = result.system;
//!
//!     if result.diagnostics.has_issues() {
//!         for issue in &result.diagnostics.issues {
//!             eprintln!("{:?}: {}", issue.severity, issue.message);
//!         }
//!     }
//!     println!("{}", system.stats());
//!     Ok(())
//! }
//! ```
//!
//! ## Package Layout
//!
//! | Category | Path convention | Contents |
//! |----------|-----------------|----------|
//! | elements | `data/elements/*.csv` | typed component rows keyed by `name` |
//! | sequences | `data/sequences/*.csv` | float columns keyed by `timeindex` |
//! | hubs | `data/hubs/*.csv` or `data/buses/*.csv` | bus declarations |
//! | periods | `data/periods/*.csv` | multi-period time data |
//! | tsa_parameters | `data/tsa_parameters/*.csv` | aggregation metadata per period |
//! | temporal | `data/temporal/*.csv` | reduced weighted index |
//! | constraints | `data/constraints/*.csv` | global constraint rows |
//!
//! ## Module Organization
//!
//! - [`package`] - Manifest parsing and resource classification
//! - [`reader`] - Row-level CSV readers per resource category
//! - [`resolve`] - Foreign-key resolution and dependency extraction
//! - [`build`] - The two-pass deserializer and the `create` factory
//! - [`constraints`] - Constraint facades and their typemap
//! - [`helpers`] - Import diagnostics and result types

pub mod build;
pub mod constraints;
pub mod helpers;
pub mod package;
pub mod reader;
pub mod resolve;

pub use build::{create, deserialize_energy_system, deserialize_energy_system_with, DeserializeOptions};
pub use constraints::{
    ConstraintExpr, ConstraintFacade, ConstraintKind, ConstraintTerm, ConstraintTypemap,
};
pub use helpers::{ImportDiagnostics, ImportIssue, ImportResult, ImportStats, Severity};
pub use package::{Datapackage, PackageDescriptor, ResourceClass, ResourceDescriptor};
pub use reader::{ConstraintRow, ElementRow, HubRow, SequenceTable};
pub use resolve::Tables;
