//! The closed set of things a graph node can point at.
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Identity, ResourceKind};
use crate::error::UnresolvedReferenceError;
use crate::graph::Graph;
use crate::launch::LaunchConfig;
use crate::task::Task;
use crate::types::TypedInterface;

/// Where an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Authored in this process.
    Local,
    /// Rebuilt from a serialized model, so it has no local implementation.
    Remote,
}

/// A task, graph or launch configuration.
///
/// Cloning is cheap, all variants are shared. Two entities are equal when
/// their identities are equal.
#[derive(Clone)]
pub enum Entity {
    Task(Arc<Task>),
    Graph(Arc<Graph>),
    LaunchConfig(Arc<LaunchConfig>),
}

impl Entity {
    pub fn id(&self) -> &Identity {
        match self {
            Entity::Task(task) => task.id(),
            Entity::Graph(graph) => graph.id(),
            Entity::LaunchConfig(lp) => lp.id(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.id().kind
    }

    /// The interface callers bind against.
    ///
    /// For a launch configuration this is the effective interface: fixed
    /// inputs are gone and defaults are applied.
    pub fn interface(&self) -> &TypedInterface {
        match self {
            Entity::Task(task) => task.interface(),
            Entity::Graph(graph) => graph.interface(),
            Entity::LaunchConfig(lp) => lp.interface(),
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            Entity::Task(task) => task.origin(),
            Entity::Graph(graph) => graph.origin(),
            Entity::LaunchConfig(lp) => lp.origin(),
        }
    }

    pub fn as_task(&self) -> Option<&Arc<Task>> {
        match self {
            Entity::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_graph(&self) -> Option<&Arc<Graph>> {
        match self {
            Entity::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn as_launch_config(&self) -> Option<&Arc<LaunchConfig>> {
        match self {
            Entity::LaunchConfig(lp) => Some(lp),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Task(_) => write!(f, "Entity::Task({})", self.id()),
            Entity::Graph(_) => write!(f, "Entity::Graph({})", self.id()),
            Entity::LaunchConfig(_) => write!(f, "Entity::LaunchConfig({})", self.id()),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl From<Arc<Task>> for Entity {
    fn from(value: Arc<Task>) -> Self {
        Entity::Task(value)
    }
}

impl From<Arc<Graph>> for Entity {
    fn from(value: Arc<Graph>) -> Self {
        Entity::Graph(value)
    }
}

impl From<Arc<LaunchConfig>> for Entity {
    fn from(value: Arc<LaunchConfig>) -> Self {
        Entity::LaunchConfig(value)
    }
}

impl From<&Arc<Task>> for Entity {
    fn from(value: &Arc<Task>) -> Self {
        Entity::Task(value.clone())
    }
}

impl From<&Arc<Graph>> for Entity {
    fn from(value: &Arc<Graph>) -> Self {
        Entity::Graph(value.clone())
    }
}

impl From<&Arc<LaunchConfig>> for Entity {
    fn from(value: &Arc<LaunchConfig>) -> Self {
        Entity::LaunchConfig(value.clone())
    }
}

impl From<&Entity> for Entity {
    fn from(value: &Entity) -> Self {
        value.clone()
    }
}

/// Anything that can be placed in a graph as a node.
///
/// Fails only for models that cannot stand on their own yet, such as a
/// provisional workflow still waiting for its dependencies.
pub trait GraphNodeTarget {
    fn target(&self) -> Result<Entity, UnresolvedReferenceError>;
}

impl GraphNodeTarget for Entity {
    fn target(&self) -> Result<Entity, UnresolvedReferenceError> {
        Ok(self.clone())
    }
}

impl GraphNodeTarget for Arc<Task> {
    fn target(&self) -> Result<Entity, UnresolvedReferenceError> {
        Ok(Entity::Task(self.clone()))
    }
}

impl GraphNodeTarget for Arc<Graph> {
    fn target(&self) -> Result<Entity, UnresolvedReferenceError> {
        Ok(Entity::Graph(self.clone()))
    }
}

impl GraphNodeTarget for Arc<LaunchConfig> {
    fn target(&self) -> Result<Entity, UnresolvedReferenceError> {
        Ok(Entity::LaunchConfig(self.clone()))
    }
}
