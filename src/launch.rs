//! Launch configurations: a graph plus input overrides and scheduling data.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Identity, ResourceKind};
use crate::entity::Origin;
use crate::error::{BindingError, Error, Result, Site, TypeMismatchError};
use crate::graph::Graph;
use crate::types::{Literal, LiteralMap, TypedInterface};
use crate::wire::LaunchPlanSpec;

/// Scheduling, notification and auth settings. Opaque to this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct LaunchConfig {
    pub(crate) id: Identity,
    pub(crate) graph: Arc<Graph>,
    pub(crate) default_inputs: LiteralMap,
    pub(crate) fixed_inputs: LiteralMap,
    pub(crate) metadata: LaunchMetadata,
    pub(crate) interface: TypedInterface,
    pub(crate) origin: Origin,
}

impl LaunchConfig {
    pub fn builder(id: Identity, graph: &Arc<Graph>) -> LaunchConfigBuilder {
        LaunchConfigBuilder {
            id,
            graph: graph.clone(),
            default_inputs: LiteralMap::new(),
            fixed_inputs: LiteralMap::new(),
            metadata: LaunchMetadata::default(),
            origin: Origin::Local,
        }
    }

    /// The launch configuration every graph implicitly has: same name and
    /// version, no overrides.
    pub fn default_for(graph: &Arc<Graph>) -> Arc<LaunchConfig> {
        Arc::new(assemble(
            graph.id().with_kind(ResourceKind::LaunchPlan),
            graph.clone(),
            LiteralMap::new(),
            LiteralMap::new(),
            LaunchMetadata::default(),
            graph.origin(),
        ))
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn default_inputs(&self) -> &LiteralMap {
        &self.default_inputs
    }

    pub fn fixed_inputs(&self) -> &LiteralMap {
        &self.fixed_inputs
    }

    pub fn metadata(&self) -> &LaunchMetadata {
        &self.metadata
    }

    /// Graph inputs minus the fixed ones, with defaults overridden.
    pub fn interface(&self) -> &TypedInterface {
        &self.interface
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn to_spec(&self) -> LaunchPlanSpec {
        LaunchPlanSpec {
            id: self.id.clone(),
            workflow_id: self.graph.id().clone(),
            default_inputs: self.default_inputs.clone(),
            fixed_inputs: self.fixed_inputs.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl PartialEq for LaunchConfig {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LaunchConfig {}

pub struct LaunchConfigBuilder {
    id: Identity,
    graph: Arc<Graph>,
    default_inputs: LiteralMap,
    fixed_inputs: LiteralMap,
    metadata: LaunchMetadata,
    origin: Origin,
}

impl LaunchConfigBuilder {
    pub fn default_input(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.default_inputs.insert(name.into(), value.into());
        self
    }

    pub fn fixed_input(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.fixed_inputs.insert(name.into(), value.into());
        self
    }

    pub fn schedule(mut self, schedule: serde_json::Value) -> Self {
        self.metadata.schedule = Some(schedule);
        self
    }

    pub fn notification(mut self, notification: serde_json::Value) -> Self {
        self.metadata.notifications.push(notification);
        self
    }

    pub fn auth(mut self, auth: serde_json::Value) -> Self {
        self.metadata.auth = Some(auth);
        self
    }

    pub(crate) fn metadata(mut self, metadata: LaunchMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn build(self) -> Result<Arc<LaunchConfig>> {
        if self.id.kind != ResourceKind::LaunchPlan {
            return Err(Error::KindMismatch {
                expected: ResourceKind::LaunchPlan,
                found: self.id,
            });
        }

        let declared = &self.graph.interface().inputs;
        for (name, value) in self.default_inputs.iter().chain(&self.fixed_inputs) {
            let site = Site::LaunchInput { input: name.clone() };
            let Some(param) = declared.get(name) else {
                return Err(BindingError::UnknownInput { site }.into());
            };
            if !value.conforms_to(&param.ty) {
                return Err(TypeMismatchError {
                    site,
                    expected: param.ty.clone(),
                    found: value.describe(),
                }
                .into());
            }
        }

        Ok(Arc::new(assemble(
            self.id,
            self.graph,
            self.default_inputs,
            self.fixed_inputs,
            self.metadata,
            self.origin,
        )))
    }
}

fn assemble(
    id: Identity,
    graph: Arc<Graph>,
    default_inputs: LiteralMap,
    fixed_inputs: LiteralMap,
    metadata: LaunchMetadata,
    origin: Origin,
) -> LaunchConfig {
    let mut interface = graph.interface().clone();
    interface.inputs.retain(|name, _| !fixed_inputs.contains_key(name));
    for (name, value) in &default_inputs {
        if let Some(param) = interface.inputs.get_mut(name) {
            param.default = Some(value.clone());
        }
    }

    LaunchConfig {
        id,
        graph,
        default_inputs,
        fixed_inputs,
        metadata,
        interface,
        origin,
    }
}
