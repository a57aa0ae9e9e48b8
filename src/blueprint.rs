use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::binding::{Binding, Promise, Resolver};
use crate::core::{Identity, NodeId, ResourceKind};
use crate::entity::{Entity, GraphNodeTarget, Origin};
use crate::error::{BindingError, Error, Result, UnresolvedReferenceError};
use crate::graph::{Graph, Node, NodeMetadata, direct_sub_graphs};
use crate::types::{Literal, LiteralType, Parameter, TypedInterface};

/// The blueprint for a workflow.
///
/// `Blueprint` is used to define the node graph of a workflow. You declare
/// inputs, add nodes and wire them together using the [`Promise`]s handed out
/// by each [`NodeHandle`]. Every binding is checked the moment its node is
/// added, so a blueprint never holds a dangling reference.
///
/// Once configured, you seal it into a [`Graph`] with [`Blueprint::finish`].
///
/// # Example
///
/// ```rust
/// use wirefold::{Binding, Blueprint, Identity, LiteralType, Task, TypedInterface};
///
/// let double = Task::builder(
///     Identity::task("p", "d", "double", "v1"),
///     TypedInterface::new()
///         .with_input("x", LiteralType::Integer)
///         .with_output("o", LiteralType::Integer),
/// )
/// .build()?;
///
/// let mut blueprint = Blueprint::new(Identity::workflow("p", "d", "wf", "v1"))?;
/// blueprint.input("x", LiteralType::Integer);
///
/// let node = blueprint.node(&double).bind("x", Binding::input("x")).add()?;
/// blueprint.output("o", LiteralType::Integer, node.output("o"))?;
///
/// let graph = blueprint.finish();
/// assert_eq!(graph.nodes().len(), 1);
/// # Ok::<(), wirefold::Error>(())
/// ```
pub struct Blueprint {
    id: Identity,
    interface: TypedInterface,
    nodes: IndexMap<NodeId, Node>,
    outputs: IndexMap<String, Binding>,
    origin: Origin,
}

impl Blueprint {
    /// Creates a new, empty workflow. `id` must name a workflow.
    pub fn new(id: Identity) -> Result<Self> {
        if id.kind != ResourceKind::Workflow {
            return Err(Error::KindMismatch {
                expected: ResourceKind::Workflow,
                found: id,
            });
        }

        Ok(Self {
            id,
            interface: TypedInterface::new(),
            nodes: IndexMap::new(),
            outputs: IndexMap::new(),
            origin: Origin::Local,
        })
    }

    /// A blueprint replaying a serialized workflow.
    pub(crate) fn remote(id: Identity, interface: TypedInterface) -> Result<Self> {
        Ok(Self {
            interface,
            origin: Origin::Remote,
            ..Self::new(id)?
        })
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    /// Declares a required workflow input.
    pub fn input(&mut self, name: impl Into<String>, ty: LiteralType) -> &mut Self {
        self.interface.inputs.insert(name.into(), Parameter::required(ty));
        self
    }

    pub fn input_with_default(
        &mut self,
        name: impl Into<String>,
        ty: LiteralType,
        default: impl Into<Literal>,
    ) -> &mut Self {
        self.interface.inputs.insert(
            name.into(),
            Parameter {
                ty,
                default: Some(default.into()),
            },
        );
        self
    }

    /// The entry point for adding a node invoking `target`.
    pub fn node<T>(&mut self, target: &T) -> NodeDef<'_>
    where
        T: GraphNodeTarget + ?Sized,
    {
        NodeDef {
            target: target.target(),
            blueprint: self,
            id: None,
            inputs: IndexMap::new(),
            after: Vec::new(),
            metadata: NodeMetadata::default(),
        }
    }

    /// Declares a workflow output and binds it.
    pub fn output(&mut self, name: impl Into<String>, ty: LiteralType, binding: impl Into<Binding>) -> Result<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(BindingError::DuplicateOutput(name).into());
        }

        let binding = binding.into();
        Resolver::new(&self.interface.inputs, &self.nodes).resolve_output(&name, &ty, &binding)?;

        self.interface.outputs.insert(name.clone(), ty);
        self.outputs.insert(name, binding);
        Ok(())
    }

    pub(crate) fn add_node(
        &mut self,
        id: Option<NodeId>,
        target: Entity,
        inputs: IndexMap<String, Binding>,
        after: Vec<NodeId>,
        metadata: NodeMetadata,
    ) -> Result<NodeHandle> {
        let id = match id {
            Some(id) if self.nodes.contains_key(&id) => {
                return Err(BindingError::DuplicateNode(id).into());
            }
            Some(id) => id,
            None => (self.nodes.len()..)
                .map(NodeId::auto)
                .find(|id| !self.nodes.contains_key(id))
                .unwrap_or_else(|| NodeId::auto(self.nodes.len())),
        };

        let resolved = Resolver::new(&self.interface.inputs, &self.nodes).resolve_node(&id, target.interface(), &inputs)?;

        let mut upstream = resolved.upstream;
        for dependency in after {
            if !self.nodes.contains_key(&dependency) {
                return Err(BindingError::UndefinedUpstream {
                    node: id,
                    upstream: dependency,
                }
                .into());
            }
            if !upstream.contains(&dependency) {
                upstream.push(dependency);
            }
        }

        tracing::trace!(node = %id, target = %target.id(), "adding node");

        let handle = NodeHandle {
            id: id.clone(),
            outputs: target.interface().outputs.clone(),
        };

        self.nodes.insert(
            id.clone(),
            Node {
                id,
                target,
                inputs: resolved.bindings,
                upstream,
                metadata,
            },
        );

        Ok(handle)
    }

    /// Seals the blueprint.
    pub fn finish(self) -> Arc<Graph> {
        let nodes: Vec<Node> = self.nodes.into_values().collect();
        let sub_graphs = direct_sub_graphs(&self.id, &nodes);

        Arc::new(Graph {
            id: self.id,
            interface: self.interface,
            nodes,
            outputs: self.outputs,
            sub_graphs,
            origin: self.origin,
        })
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("id", &self.id)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub struct NodeDef<'a> {
    blueprint: &'a mut Blueprint,
    target: Result<Entity, UnresolvedReferenceError>,
    id: Option<NodeId>,
    inputs: IndexMap<String, Binding>,
    after: Vec<NodeId>,
    metadata: NodeMetadata,
}

impl<'a> NodeDef<'a> {
    /// Overrides the generated node id.
    pub fn id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn bind(mut self, input: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.inputs.insert(input.into(), binding.into());
        self
    }

    /// Orders this node after `handle` without passing any data.
    pub fn after(mut self, handle: &NodeHandle) -> Self {
        self.after.push(handle.id.clone());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = Some(name.into());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.metadata.retries = Some(retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.metadata.timeout = Some(timeout);
        self
    }

    pub fn add(self) -> Result<NodeHandle> {
        let target = self.target.map_err(Error::from)?;
        self.blueprint
            .add_node(self.id, target, self.inputs, self.after, self.metadata)
    }
}

/// Returned by [`NodeDef::add`]; hands out promises for the node's outputs.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: NodeId,
    outputs: IndexMap<String, LiteralType>,
}

impl NodeHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// A promise of output `name`. It is checked when it is bound.
    pub fn output(&self, name: impl Into<String>) -> Promise {
        Promise::new(self.id.clone(), name)
    }

    pub fn outputs(&self) -> &IndexMap<String, LiteralType> {
        &self.outputs
    }
}
