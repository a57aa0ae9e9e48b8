//! Flattening: from a root entity to its ordered, deduplicated closure.
use std::fmt::{self, Display, Formatter};

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::Identity;
use crate::entity::Entity;
use crate::error::{CyclicGraphError, Result, WireError};
use crate::graph::Graph;
use crate::wire::{LaunchPlanSpec, TaskTemplate, WireEntity, WorkflowSpec, WorkflowTemplate};

/// Insertion-ordered, identity-keyed collection of wire entities.
///
/// A set produced by [`flatten`] is dependency-first: every entity comes after
/// everything it references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<WireEntity>", into = "Vec<WireEntity>")]
pub struct EntitySet {
    entries: IndexMap<Identity, WireEntity>,
}

/// Two sets are equal when they hold the same entities in the same order.
impl PartialEq for EntitySet {
    fn eq(&self, other: &Self) -> bool {
        self.entries.iter().eq(other.entries.iter())
    }
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &Identity) -> Option<&WireEntity> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.entries.contains_key(id)
    }

    /// Position of `id` in the set.
    pub fn index_of(&self, id: &Identity) -> Option<usize> {
        self.entries.get_index_of(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &Identity> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WireEntity> {
        self.entries.values()
    }

    /// Appends `entity` unless its identity is already present.
    pub fn insert(&mut self, entity: WireEntity) -> bool {
        match self.entries.entry(entity.id().clone()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    /// Union by identity. Entries already here keep their place, new entries
    /// from `other` are appended in `other`'s order.
    ///
    /// Merging a child's set first and the parent's after it keeps the result
    /// dependency-first.
    pub fn merge(&mut self, other: &EntitySet) {
        for entity in other.iter() {
            if !self.contains(entity.id()) {
                self.insert(entity.clone());
            }
        }
    }

    /// Templates of every graph embedded in workflow `id`, dependency-first.
    pub fn sub_workflows_of(&self, id: &Identity) -> Vec<&WorkflowTemplate> {
        let Some(WireEntity::Workflow(spec)) = self.get(id) else {
            return Vec::new();
        };

        spec.sub_workflows
            .iter()
            .filter_map(|sub| match self.get(sub) {
                Some(WireEntity::Workflow(spec)) => Some(&spec.template),
                _ => None,
            })
            .collect()
    }

    /// Reference graph over the set. Edges point from a dependency to the
    /// entity that needs it, node indices follow set order.
    pub fn dependency_graph(&self) -> DiGraph<Identity, ()> {
        let mut graph = DiGraph::with_capacity(self.len(), 0);
        let indices: Vec<NodeIndex> = self.ids().map(|id| graph.add_node(id.clone())).collect();

        for (index, entity) in self.iter().enumerate() {
            for reference in entity.references() {
                if let Some(dependency) = self.index_of(&reference) {
                    graph.add_edge(indices[dependency], indices[index], ());
                }
            }
        }

        graph
    }

    /// Whether every entity comes after all of its dependencies in the set.
    pub fn is_dependency_ordered(&self) -> bool {
        let graph = self.dependency_graph();
        graph.edge_indices().all(|edge| {
            graph
                .edge_endpoints(edge)
                .is_some_and(|(source, target)| source.index() < target.index())
        })
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

impl From<Vec<WireEntity>> for EntitySet {
    fn from(value: Vec<WireEntity>) -> Self {
        let mut set = EntitySet::new();
        for entity in value {
            set.insert(entity);
        }
        set
    }
}

impl From<EntitySet> for Vec<WireEntity> {
    fn from(value: EntitySet) -> Self {
        value.entries.into_values().collect()
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a WireEntity;
    type IntoIter = indexmap::map::Values<'a, Identity, WireEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl Display for EntitySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        let graph = self.dependency_graph();
        for index in graph.node_indices() {
            let name = graph[index].to_string().replace('"', "\\\"");
            writeln!(f, "    {:?}[\"{}\"]", index.index(), name)?;
        }

        for edge in graph.edge_indices() {
            if let Some((source, target)) = graph.edge_endpoints(edge) {
                writeln!(f, "    {:?} --> {:?}", source.index(), target.index())?;
            }
        }

        Ok(())
    }
}

/// Flattens `root` into a fresh set.
pub fn flatten(root: impl Into<Entity>) -> Result<EntitySet> {
    let mut set = EntitySet::new();
    flatten_into(&mut set, root)?;
    Ok(set)
}

/// Flattens `root` on top of a caller-owned set, skipping anything it
/// already holds. Returns the root's identity.
///
/// The set is only extended once the whole traversal has succeeded.
pub fn flatten_into(set: &mut EntitySet, root: impl Into<Entity>) -> Result<Identity> {
    let root = root.into();
    let _span = tracing::debug_span!("flatten", root = %root.id()).entered();

    let emitted = {
        let mut compiler = Compiler::new(set);
        compiler.visit(&root)?;
        compiler.emitted
    };

    debug!(count = emitted.len(), "flattened");
    set.entries.extend(emitted);
    Ok(root.id().clone())
}

/// Splits a set by kind, keeping relative order within each kind.
pub fn gather_dependent_entities(
    set: &EntitySet,
) -> (
    IndexMap<Identity, TaskTemplate>,
    IndexMap<Identity, WorkflowSpec>,
    IndexMap<Identity, LaunchPlanSpec>,
) {
    let mut tasks = IndexMap::new();
    let mut workflows = IndexMap::new();
    let mut launch_plans = IndexMap::new();

    for entity in set {
        match entity {
            WireEntity::Task(task) => {
                tasks.insert(task.id.clone(), task.clone());
            }
            WireEntity::Workflow(spec) => {
                workflows.insert(spec.template.id.clone(), spec.clone());
            }
            WireEntity::LaunchPlan(lp) => {
                launch_plans.insert(lp.id.clone(), lp.clone());
            }
        }
    }

    (tasks, workflows, launch_plans)
}

struct Compiler<'a> {
    seed: &'a EntitySet,
    emitted: IndexMap<Identity, WireEntity>,
    in_progress: IndexSet<Identity>,
}

impl<'a> Compiler<'a> {
    fn new(seed: &'a EntitySet) -> Self {
        Self {
            seed,
            emitted: IndexMap::new(),
            in_progress: IndexSet::new(),
        }
    }

    fn lookup(&self, id: &Identity) -> Option<&WireEntity> {
        self.emitted.get(id).or_else(|| self.seed.get(id))
    }

    fn visit(&mut self, entity: &Entity) -> Result<()> {
        let id = entity.id();

        if self.lookup(id).is_some() {
            trace!(%id, "already flattened");
            return Ok(());
        }

        if let Some(start) = self.in_progress.get_index_of(id) {
            let mut path: Vec<Identity> = self.in_progress.iter().skip(start).cloned().collect();
            path.push(id.clone());
            return Err(CyclicGraphError::Entities(path).into());
        }

        self.in_progress.insert(id.clone());

        let wire = match entity {
            Entity::Task(task) => WireEntity::Task(task.to_template()),
            Entity::LaunchConfig(lp) => {
                self.visit(&Entity::Graph(lp.graph().clone()))?;
                WireEntity::LaunchPlan(lp.to_spec())
            }
            Entity::Graph(graph) => {
                for node in graph.nodes() {
                    self.visit(node.target())?;
                }
                WireEntity::Workflow(WorkflowSpec {
                    template: graph.to_template(),
                    sub_workflows: self.sub_workflows(graph),
                })
            }
        };

        self.in_progress.pop();

        debug!(%id, kind = %id.kind, "emitting");
        self.emitted.insert(id.clone(), wire);
        Ok(())
    }

    /// Every graph embedded in `graph`, nested ones before their parent.
    fn sub_workflows(&self, graph: &Graph) -> Vec<Identity> {
        let mut acc = IndexSet::new();
        for sub in graph.sub_graphs() {
            if let Some(WireEntity::Workflow(spec)) = self.lookup(sub) {
                acc.extend(spec.sub_workflows.iter().cloned());
            }
            acc.insert(sub.clone());
        }
        acc.shift_remove(graph.id());
        acc.into_iter().collect()
    }
}
