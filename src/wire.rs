//! The serializable, identity-referenced form of every entity.
//!
//! Nothing in this module holds a pointer to another entity: a node names its
//! target by [`Identity`], a launch plan names its workflow the same way. This
//! is what makes a flattened set self-contained and transportable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::core::{Identity, NodeId, ResourceKind};
use crate::entity::Entity;
use crate::error::WireError;
use crate::graph::NodeMetadata;
use crate::launch::LaunchMetadata;
use crate::task::TaskMetadata;
use crate::types::{LiteralMap, TypedInterface};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: Identity,
    #[serde(rename = "type")]
    pub task_type: String,
    pub interface: TypedInterface,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// What a node invokes, by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TargetRef {
    Task(Identity),
    Workflow(Identity),
    LaunchPlan(Identity),
}

impl TargetRef {
    pub fn of(entity: &Entity) -> Self {
        let id = entity.id().clone();
        match entity {
            Entity::Task(_) => TargetRef::Task(id),
            Entity::Graph(_) => TargetRef::Workflow(id),
            Entity::LaunchConfig(_) => TargetRef::LaunchPlan(id),
        }
    }

    pub fn id(&self) -> &Identity {
        match self {
            TargetRef::Task(id) | TargetRef::Workflow(id) | TargetRef::LaunchPlan(id) => id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            TargetRef::Task(_) => ResourceKind::Task,
            TargetRef::Workflow(_) => ResourceKind::Workflow,
            TargetRef::LaunchPlan(_) => ResourceKind::LaunchPlan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub metadata: NodeMetadata,
    #[serde(default)]
    pub inputs: IndexMap<String, Binding>,
    #[serde(default)]
    pub upstream_node_ids: Vec<NodeId>,
    pub target: TargetRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: Identity,
    pub interface: TypedInterface,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub outputs: IndexMap<String, Binding>,
}

impl WorkflowTemplate {
    /// Identities of node targets, in node order and without repetition.
    pub fn references(&self) -> Vec<Identity> {
        let mut refs: Vec<Identity> = Vec::new();
        for node in &self.nodes {
            let id = node.target.id();
            if !refs.contains(id) {
                refs.push(id.clone());
            }
        }
        refs
    }
}

/// A workflow template plus the identities of every graph it embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub template: WorkflowTemplate,
    /// Transitive, dependency-first.
    #[serde(default)]
    pub sub_workflows: Vec<Identity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchPlanSpec {
    pub id: Identity,
    pub workflow_id: Identity,
    #[serde(default)]
    pub default_inputs: LiteralMap,
    #[serde(default)]
    pub fixed_inputs: LiteralMap,
    #[serde(default)]
    pub metadata: LaunchMetadata,
}

/// Any serialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEntity {
    Task(TaskTemplate),
    Workflow(WorkflowSpec),
    LaunchPlan(LaunchPlanSpec),
}

impl WireEntity {
    pub fn id(&self) -> &Identity {
        match self {
            WireEntity::Task(task) => &task.id,
            WireEntity::Workflow(spec) => &spec.template.id,
            WireEntity::LaunchPlan(lp) => &lp.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            WireEntity::Task(_) => ResourceKind::Task,
            WireEntity::Workflow(_) => ResourceKind::Workflow,
            WireEntity::LaunchPlan(_) => ResourceKind::LaunchPlan,
        }
    }

    /// Every identity this model needs in order to be promoted.
    pub fn references(&self) -> Vec<Identity> {
        match self {
            WireEntity::Task(_) => Vec::new(),
            WireEntity::Workflow(spec) => {
                let mut refs = spec.template.references();
                for id in &spec.sub_workflows {
                    if !refs.contains(id) {
                        refs.push(id.clone());
                    }
                }
                refs
            }
            WireEntity::LaunchPlan(lp) => vec![lp.workflow_id.clone()],
        }
    }

    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, WireError> {
        let mut buffer = Vec::new();
        ciborium::into_writer(self, &mut buffer)?;
        Ok(buffer)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

impl From<TaskTemplate> for WireEntity {
    fn from(value: TaskTemplate) -> Self {
        WireEntity::Task(value)
    }
}

impl From<WorkflowSpec> for WireEntity {
    fn from(value: WorkflowSpec) -> Self {
        WireEntity::Workflow(value)
    }
}

impl From<LaunchPlanSpec> for WireEntity {
    fn from(value: LaunchPlanSpec) -> Self {
        WireEntity::LaunchPlan(value)
    }
}
