use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::core::{Identity, NodeId};
use crate::entity::{Entity, Origin};
use crate::types::TypedInterface;
use crate::wire::{NodeSpec, TargetRef, WorkflowTemplate};

/// Per-node execution overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// One invocation of a target inside a graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) target: Entity,
    pub(crate) inputs: IndexMap<String, Binding>,
    pub(crate) upstream: Vec<NodeId>,
    pub(crate) metadata: NodeMetadata,
}

impl Node {
    /// A node with no bindings, for exercising resolvers in isolation.
    #[cfg(test)]
    pub(crate) fn new(id: NodeId, target: Entity) -> Self {
        Self {
            id,
            target,
            inputs: IndexMap::new(),
            upstream: Vec::new(),
            metadata: NodeMetadata::default(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn target(&self) -> &Entity {
        &self.target
    }

    pub fn inputs(&self) -> &IndexMap<String, Binding> {
        &self.inputs
    }

    /// Nodes that must complete first, data dependencies before explicit ones.
    pub fn upstream(&self) -> &[NodeId] {
        &self.upstream
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    pub fn to_spec(&self) -> NodeSpec {
        NodeSpec {
            id: self.id.clone(),
            metadata: self.metadata.clone(),
            inputs: self.inputs.clone(),
            upstream_node_ids: self.upstream.clone(),
            target: TargetRef::of(&self.target),
        }
    }
}

/// A sealed workflow: typed inputs, a DAG of nodes and bound outputs.
///
/// Graphs are produced by [`Blueprint::finish`](crate::Blueprint::finish) or
/// by promotion and are immutable afterwards.
#[derive(Debug)]
pub struct Graph {
    pub(crate) id: Identity,
    pub(crate) interface: TypedInterface,
    pub(crate) nodes: Vec<Node>,
    pub(crate) outputs: IndexMap<String, Binding>,
    pub(crate) sub_graphs: Vec<Identity>,
    pub(crate) origin: Origin,
}

impl Graph {
    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn interface(&self) -> &TypedInterface {
        &self.interface
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn outputs(&self) -> &IndexMap<String, Binding> {
        &self.outputs
    }

    /// Graphs invoked directly by a node of this one, without repetition.
    pub fn sub_graphs(&self) -> &[Identity] {
        &self.sub_graphs
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn to_template(&self) -> WorkflowTemplate {
        WorkflowTemplate {
            id: self.id.clone(),
            interface: self.interface.clone(),
            nodes: self.nodes.iter().map(Node::to_spec).collect(),
            outputs: self.outputs.clone(),
        }
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Graph {}

/// Direct sub-graphs of a node list, skipping the graph's own identity.
pub(crate) fn direct_sub_graphs(owner: &Identity, nodes: &[Node]) -> Vec<Identity> {
    let mut seen = HashSet::new();
    nodes
        .iter()
        .filter_map(|node| node.target.as_graph())
        .map(|graph| graph.id())
        .filter(|id| *id != owner && seen.insert((*id).clone()))
        .cloned()
        .collect()
}

impl Display for Graph {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for node in &self.nodes {
            let label = node.metadata.name.as_deref().unwrap_or(&node.target.id().name);
            writeln!(f, "    {}[\"{}\"]", node.id, label.replace('"', "\\\""))?;
        }

        writeln!(f, "    Output[Output]")?;

        for node in &self.nodes {
            let mut data = HashSet::new();
            for binding in node.inputs.values() {
                for promise in binding.promises() {
                    data.insert(&promise.node_id);
                    writeln!(f, "    {} -- \"{}\" --> {}", promise.node_id, promise.output, node.id)?;
                }
            }
            for upstream in node.upstream.iter().filter(|id| !data.contains(id)) {
                writeln!(f, "    {upstream} -.-> {}", node.id)?;
            }
        }

        for (name, binding) in &self.outputs {
            for promise in binding.promises() {
                writeln!(f, "    {} -- \"{}\" --> Output", promise.node_id, name)?;
            }
        }

        Ok(())
    }
}
