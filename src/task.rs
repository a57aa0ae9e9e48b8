//! Tasks: the leaves of every workflow.
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Identity, ResourceKind};
use crate::entity::Origin;
use crate::error::{Error, Result};
use crate::types::{LiteralMap, TypedInterface};
use crate::wire::TaskTemplate;

/// Function used to run an authored task in process.
pub type Executor = Arc<dyn Fn(&LiteralMap) -> anyhow::Result<LiteralMap> + Send + Sync>;

/// Execution hints carried to the control plane unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub interruptible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_version: Option<String>,
}

/// A single unit of remote work.
///
/// The payload is opaque to this crate: it is produced by whatever builds the
/// container or plugin definition and is passed through untouched.
pub struct Task {
    pub(crate) id: Identity,
    pub(crate) interface: TypedInterface,
    pub(crate) task_type: String,
    pub(crate) metadata: TaskMetadata,
    pub(crate) payload: serde_json::Value,
    pub(crate) origin: Origin,
    pub(crate) executor: Option<Executor>,
}

impl Task {
    pub fn builder(id: Identity, interface: TypedInterface) -> TaskBuilder {
        TaskBuilder {
            id,
            interface,
            task_type: "container".to_string(),
            metadata: TaskMetadata::default(),
            payload: serde_json::Value::Null,
            executor: None,
        }
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn interface(&self) -> &TypedInterface {
        &self.interface
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn metadata(&self) -> &TaskMetadata {
        &self.metadata
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Whether [`Task::call`] can run this task in process.
    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local && self.executor.is_some()
    }

    pub fn to_template(&self) -> TaskTemplate {
        TaskTemplate {
            id: self.id.clone(),
            task_type: self.task_type.clone(),
            interface: self.interface.clone(),
            metadata: self.metadata.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Rebuilds a task from its wire form. The result can only run remotely.
    pub(crate) fn from_template(template: &TaskTemplate) -> Self {
        Self {
            id: template.id.clone(),
            interface: template.interface.clone(),
            task_type: template.task_type.clone(),
            metadata: template.metadata.clone(),
            payload: template.payload.clone(),
            origin: Origin::Remote,
            executor: None,
        }
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("task_type", &self.task_type)
            .field("origin", &self.origin)
            .field("executor", &self.executor.as_ref().map(|_| "*"))
            .finish_non_exhaustive()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

pub struct TaskBuilder {
    id: Identity,
    interface: TypedInterface,
    task_type: String,
    metadata: TaskMetadata,
    payload: serde_json::Value,
    executor: Option<Executor>,
}

impl TaskBuilder {
    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.metadata.retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.metadata.timeout = Some(timeout);
        self
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.metadata.interruptible = interruptible;
        self
    }

    pub fn cache_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.cache_version = Some(version.into());
        self
    }

    /// Makes the task runnable in process through [`Task::call`].
    pub fn executor<F>(mut self, func: F) -> Self
    where
        F: Fn(&LiteralMap) -> anyhow::Result<LiteralMap> + Send + Sync + 'static,
    {
        self.executor = Some(Arc::new(func));
        self
    }

    pub fn build(self) -> Result<Arc<Task>> {
        if self.id.kind != ResourceKind::Task {
            return Err(Error::KindMismatch {
                expected: ResourceKind::Task,
                found: self.id,
            });
        }

        Ok(Arc::new(Task {
            id: self.id,
            interface: self.interface,
            task_type: self.task_type,
            metadata: self.metadata,
            payload: self.payload,
            origin: Origin::Local,
            executor: self.executor,
        }))
    }
}
