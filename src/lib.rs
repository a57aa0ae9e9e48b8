#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod binding;
mod blueprint;
mod compiler;
mod config;
mod core;
mod entity;
mod error;
mod graph;
mod launch;
mod local;
mod promote;
mod task;
mod types;
mod utils;
pub mod wire;

#[cfg(test)]
mod fixtures;

pub use crate::binding::{Binding, Promise, ResolvedInputs, Resolver};
pub use crate::blueprint::{Blueprint, NodeDef, NodeHandle};
pub use crate::compiler::{EntitySet, flatten, flatten_into, gather_dependent_entities};
pub use crate::config::Settings;
pub use crate::core::{Identity, NodeId, ResourceKind};
pub use crate::entity::{Entity, GraphNodeTarget, Origin};
pub use crate::error::*;
pub use crate::graph::{Graph, Node, NodeMetadata};
pub use crate::launch::{LaunchConfig, LaunchConfigBuilder, LaunchMetadata};
pub use crate::promote::{Auxiliary, Promoter, Provisional, promote};
pub use crate::task::{Executor, Task, TaskBuilder, TaskMetadata};
pub use crate::types::{Literal, LiteralMap, LiteralType, Parameter, TypedInterface};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
