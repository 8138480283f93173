//! paramtree - hierarchical parameter distribution
//!
//! Route a flat `name → string` mapping through a tree of dispatcher nodes,
//! coercing each value to the kind its binding declares.

pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod params;
pub mod setter;
pub mod value;

pub use config::{AppliedLog, AppliedValue, BuiltTree, TreeConfig};
pub use constants::ConstantMap;
pub use dispatcher::{DispatcherTree, NodeId, ParamMap};
pub use error::{FixSuggestion, ParamError};
pub use params::{parse_properties, ParameterStore};
pub use setter::{ParameterOwner, Setter};
pub use value::{ParamValue, ValueKind};
