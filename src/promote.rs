//! Promotion: rebuilding composable entities from their wire form.
//!
//! A promoted entity is a regular [`Entity`] with [`Origin::Remote`]. It can
//! be placed in a new [`Blueprint`] like anything authored locally; only
//! running it in process is refused.
//!
//! [`Origin::Remote`]: crate::Origin::Remote
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};

use crate::blueprint::Blueprint;
use crate::compiler::EntitySet;
use crate::core::{Identity, ResourceKind};
use crate::entity::{Entity, GraphNodeTarget, Origin};
use crate::error::{BindingError, CyclicGraphError, Error, Result, Site, UnresolvedReferenceError};
use crate::graph::Graph;
use crate::launch::LaunchConfig;
use crate::task::Task;
use crate::wire::{LaunchPlanSpec, NodeSpec, TargetRef, TaskTemplate, WireEntity, WorkflowSpec, WorkflowTemplate};

/// Entities a wire model refers to but does not carry itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Auxiliary {
    pub tasks: IndexMap<Identity, TaskTemplate>,
    pub workflows: IndexMap<Identity, WorkflowTemplate>,
    pub launch_plans: IndexMap<Identity, LaunchPlanSpec>,
}

impl Auxiliary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: TaskTemplate) -> Self {
        self.tasks.insert(task.id.clone(), task);
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowTemplate) -> Self {
        self.workflows.insert(workflow.id.clone(), workflow);
        self
    }

    pub fn with_launch_plan(mut self, lp: LaunchPlanSpec) -> Self {
        self.launch_plans.insert(lp.id.clone(), lp);
        self
    }

    /// Adds `entity` unless its identity is already known.
    pub fn insert(&mut self, entity: WireEntity) {
        match entity {
            WireEntity::Task(task) => {
                self.tasks.entry(task.id.clone()).or_insert(task);
            }
            WireEntity::Workflow(spec) => {
                self.workflows.entry(spec.template.id.clone()).or_insert(spec.template);
            }
            WireEntity::LaunchPlan(lp) => {
                self.launch_plans.entry(lp.id.clone()).or_insert(lp);
            }
        }
    }

    pub fn merge(&mut self, other: &Auxiliary) {
        for (id, task) in &other.tasks {
            self.tasks.entry(id.clone()).or_insert_with(|| task.clone());
        }
        for (id, workflow) in &other.workflows {
            self.workflows.entry(id.clone()).or_insert_with(|| workflow.clone());
        }
        for (id, lp) in &other.launch_plans {
            self.launch_plans.entry(id.clone()).or_insert_with(|| lp.clone());
        }
    }

    pub fn contains(&self, id: &Identity) -> bool {
        match id.kind {
            ResourceKind::Task => self.tasks.contains_key(id),
            ResourceKind::Workflow => self.workflows.contains_key(id),
            ResourceKind::LaunchPlan => self.launch_plans.contains_key(id),
        }
    }

    /// What the entity `id` refers to, or `None` if it is not held here.
    fn references_of(&self, id: &Identity) -> Option<Vec<Identity>> {
        match id.kind {
            ResourceKind::Task => self.tasks.get(id).map(|_| Vec::new()),
            ResourceKind::Workflow => self.workflows.get(id).map(WorkflowTemplate::references),
            ResourceKind::LaunchPlan => self.launch_plans.get(id).map(|lp| vec![lp.workflow_id.clone()]),
        }
    }
}

impl From<&EntitySet> for Auxiliary {
    fn from(value: &EntitySet) -> Self {
        let mut auxiliary = Auxiliary::new();
        for entity in value {
            auxiliary.insert(entity.clone());
        }
        auxiliary
    }
}

impl
    From<(
        IndexMap<Identity, TaskTemplate>,
        IndexMap<Identity, WorkflowSpec>,
        IndexMap<Identity, LaunchPlanSpec>,
    )> for Auxiliary
{
    fn from(
        (tasks, workflows, launch_plans): (
            IndexMap<Identity, TaskTemplate>,
            IndexMap<Identity, WorkflowSpec>,
            IndexMap<Identity, LaunchPlanSpec>,
        ),
    ) -> Self {
        Self {
            tasks,
            workflows: workflows
                .into_iter()
                .map(|(id, spec)| (id, spec.template))
                .collect(),
            launch_plans,
        }
    }
}

/// Promotes `model`, which must be of kind `kind`.
pub fn promote(kind: ResourceKind, model: &WireEntity, auxiliary: &Auxiliary) -> Result<Entity> {
    if model.kind() != kind {
        return Err(Error::KindMismatch {
            expected: kind,
            found: model.id().clone(),
        });
    }

    Promoter::new(auxiliary).promote(model)
}

/// Promotes wire models against one auxiliary set, memoizing by identity.
///
/// Entities shared between several models are promoted once per promoter,
/// so reusing it across calls keeps them shared.
pub struct Promoter<'a> {
    auxiliary: &'a Auxiliary,
    promoted: HashMap<Identity, Entity>,
    in_progress: IndexSet<Identity>,
}

impl<'a> Promoter<'a> {
    pub fn new(auxiliary: &'a Auxiliary) -> Self {
        Self {
            auxiliary,
            promoted: HashMap::new(),
            in_progress: IndexSet::new(),
        }
    }

    pub fn promote(&mut self, model: &WireEntity) -> Result<Entity> {
        let _span = tracing::debug_span!("promote", id = %model.id()).entered();

        match model {
            WireEntity::Task(task) => Ok(self.promote_task(task)?.into()),
            WireEntity::Workflow(spec) => {
                for sub in &spec.sub_workflows {
                    if !self.auxiliary.workflows.contains_key(sub) && !self.promoted.contains_key(sub) {
                        return Err(UnresolvedReferenceError::Entity {
                            referrer: spec.template.id.clone(),
                            missing: sub.clone(),
                        }
                        .into());
                    }
                }
                Ok(self.promote_workflow(&spec.template)?.into())
            }
            WireEntity::LaunchPlan(lp) => Ok(self.promote_launch_plan(lp)?.into()),
        }
    }

    pub fn promote_task(&mut self, template: &TaskTemplate) -> Result<Arc<Task>> {
        expect_kind(ResourceKind::Task, &template.id)?;
        if let Some(Entity::Task(task)) = self.promoted.get(&template.id) {
            trace!(id = %template.id, "already promoted");
            return Ok(task.clone());
        }

        let task = Arc::new(Task::from_template(template));
        debug!(id = %template.id, "promoted task");
        self.promoted.insert(template.id.clone(), Entity::Task(task.clone()));
        Ok(task)
    }

    pub fn promote_workflow(&mut self, template: &WorkflowTemplate) -> Result<Arc<Graph>> {
        expect_kind(ResourceKind::Workflow, &template.id)?;
        if let Some(Entity::Graph(graph)) = self.promoted.get(&template.id) {
            trace!(id = %template.id, "already promoted");
            return Ok(graph.clone());
        }

        self.enter(&template.id)?;
        let result = self.replay_workflow(template);
        self.in_progress.pop();
        let graph = result?;

        debug!(id = %template.id, nodes = graph.nodes().len(), "promoted workflow");
        self.promoted.insert(template.id.clone(), Entity::Graph(graph.clone()));
        Ok(graph)
    }

    /// Rebuilds the graph node by node, so every binding goes through the
    /// same checks as an authored one.
    fn replay_workflow(&mut self, template: &WorkflowTemplate) -> Result<Arc<Graph>> {
        let mut interface = template.interface.clone();
        interface.outputs.clear();
        let mut blueprint = Blueprint::remote(template.id.clone(), interface)?;

        for spec in order_nodes(template)? {
            let target = self.resolve(&template.id, &spec.target)?;
            blueprint.add_node(
                Some(spec.id.clone()),
                target,
                spec.inputs.clone(),
                spec.upstream_node_ids.clone(),
                spec.metadata.clone(),
            )?;
        }

        for name in template.outputs.keys() {
            if !template.interface.outputs.contains_key(name) {
                return Err(BindingError::UnknownInput {
                    site: Site::GraphOutput { output: name.clone() },
                }
                .into());
            }
        }

        for (name, ty) in &template.interface.outputs {
            let Some(binding) = template.outputs.get(name) else {
                return Err(BindingError::MissingInput {
                    site: Site::GraphOutput { output: name.clone() },
                }
                .into());
            };
            blueprint.output(name.clone(), ty.clone(), binding.clone())?;
        }

        Ok(blueprint.finish())
    }

    pub fn promote_launch_plan(&mut self, spec: &LaunchPlanSpec) -> Result<Arc<LaunchConfig>> {
        expect_kind(ResourceKind::LaunchPlan, &spec.id)?;
        if let Some(Entity::LaunchConfig(lp)) = self.promoted.get(&spec.id) {
            trace!(id = %spec.id, "already promoted");
            return Ok(lp.clone());
        }

        self.enter(&spec.id)?;
        let result = self.rebuild_launch_plan(spec);
        self.in_progress.pop();
        let lp = result?;

        debug!(id = %spec.id, "promoted launch plan");
        self.promoted.insert(spec.id.clone(), Entity::LaunchConfig(lp.clone()));
        Ok(lp)
    }

    fn rebuild_launch_plan(&mut self, spec: &LaunchPlanSpec) -> Result<Arc<LaunchConfig>> {
        let graph = match self.resolve(&spec.id, &TargetRef::Workflow(spec.workflow_id.clone()))? {
            Entity::Graph(graph) => graph,
            other => {
                return Err(Error::KindMismatch {
                    expected: ResourceKind::Workflow,
                    found: other.id().clone(),
                });
            }
        };

        let mut builder = LaunchConfig::builder(spec.id.clone(), &graph)
            .metadata(spec.metadata.clone())
            .origin(Origin::Remote);
        for (name, value) in &spec.default_inputs {
            builder = builder.default_input(name.clone(), value.clone());
        }
        for (name, value) in &spec.fixed_inputs {
            builder = builder.fixed_input(name.clone(), value.clone());
        }
        builder.build()
    }

    fn enter(&mut self, id: &Identity) -> Result<()> {
        if let Some(start) = self.in_progress.get_index_of(id) {
            let mut path: Vec<Identity> = self.in_progress.iter().skip(start).cloned().collect();
            path.push(id.clone());
            return Err(CyclicGraphError::Entities(path).into());
        }
        self.in_progress.insert(id.clone());
        Ok(())
    }

    fn resolve(&mut self, referrer: &Identity, target: &TargetRef) -> Result<Entity> {
        let id = target.id();
        expect_kind(target.kind(), id)?;
        if let Some(entity) = self.promoted.get(id) {
            expect_kind(target.kind(), entity.id())?;
            return Ok(entity.clone());
        }

        let auxiliary = self.auxiliary;
        let missing = || UnresolvedReferenceError::Entity {
            referrer: referrer.clone(),
            missing: id.clone(),
        };

        match target {
            TargetRef::Task(_) => {
                let template = auxiliary.tasks.get(id).ok_or_else(missing)?;
                Ok(self.promote_task(template)?.into())
            }
            TargetRef::Workflow(_) => {
                let template = auxiliary.workflows.get(id).ok_or_else(missing)?;
                Ok(self.promote_workflow(template)?.into())
            }
            TargetRef::LaunchPlan(_) => {
                let spec = auxiliary.launch_plans.get(id).ok_or_else(missing)?;
                Ok(self.promote_launch_plan(spec)?.into())
            }
        }
    }
}

/// Fails unless `id` names an entity of kind `expected`.
fn expect_kind(expected: ResourceKind, id: &Identity) -> Result<()> {
    if id.kind != expected {
        return Err(Error::KindMismatch {
            expected,
            found: id.clone(),
        });
    }
    Ok(())
}

/// Nodes of `template` in an order where every node follows its upstream.
///
/// Declaration order is kept when it already satisfies this.
fn order_nodes(template: &WorkflowTemplate) -> Result<Vec<&NodeSpec>> {
    let mut graph = DiGraph::<&NodeSpec, ()>::with_capacity(template.nodes.len(), 0);
    let mut indices = HashMap::new();
    for spec in &template.nodes {
        let index = graph.add_node(spec);
        indices.entry(&spec.id).or_insert(index);
    }

    let mut in_order = true;
    for (position, spec) in template.nodes.iter().enumerate() {
        let promised = spec.inputs.values().flat_map(|b| b.promises()).map(|p| &p.node_id);
        let mut seen = HashSet::new();
        for upstream in spec.upstream_node_ids.iter().chain(promised) {
            if !seen.insert(upstream) {
                continue;
            }
            let Some(&source) = indices.get(upstream) else {
                return Err(UnresolvedReferenceError::Node {
                    graph: template.id.clone(),
                    node: spec.id.clone(),
                    upstream: upstream.clone(),
                }
                .into());
            };
            in_order &= source.index() < position;
            graph.add_edge(source, NodeIndex::new(position), ());
        }
    }

    for (output, binding) in &template.outputs {
        for promise in binding.promises() {
            if !indices.contains_key(&promise.node_id) {
                return Err(UnresolvedReferenceError::Output {
                    graph: template.id.clone(),
                    output: output.clone(),
                    upstream: promise.node_id.clone(),
                }
                .into());
            }
        }
    }

    if in_order {
        return Ok(template.nodes.iter().collect());
    }

    let sorted = toposort(&graph, None).map_err(|cycle| CyclicGraphError::Nodes {
        graph: template.id.clone(),
        node: graph[cycle.node_id()].id.clone(),
    })?;

    Ok(sorted.into_iter().map(|index| graph[index]).collect())
}

/// A promotion waiting for some of the entities its model refers to.
///
/// Until [`Provisional::attach_auxiliary`] has supplied everything, the
/// model cannot be used as a node target.
#[derive(Debug, Clone)]
pub struct Provisional {
    model: WireEntity,
    auxiliary: Auxiliary,
    promoted: Option<Entity>,
}

impl Provisional {
    pub fn new(model: WireEntity) -> Self {
        Self {
            model,
            auxiliary: Auxiliary::new(),
            promoted: None,
        }
    }

    pub fn id(&self) -> &Identity {
        self.model.id()
    }

    /// Identities still needed, in discovery order.
    pub fn missing(&self) -> Vec<Identity> {
        let mut missing = Vec::new();
        let mut seen: HashSet<Identity> = HashSet::from([self.id().clone()]);
        let mut queue: VecDeque<Identity> = self.model.references().into();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            match self.auxiliary.references_of(&id) {
                Some(refs) => queue.extend(refs),
                None => missing.push(id),
            }
        }

        missing
    }

    pub fn is_complete(&self) -> bool {
        self.promoted.is_some()
    }

    /// The promoted entity, once complete.
    pub fn entity(&self) -> Option<&Entity> {
        self.promoted.as_ref()
    }

    /// Adds `auxiliary` and promotes as soon as nothing is missing.
    ///
    /// Returns whether the model is now complete. A promotion error, for
    /// example a binding that does not type check, is returned as is and
    /// leaves the model provisional.
    pub fn attach_auxiliary(&mut self, auxiliary: &Auxiliary) -> Result<bool> {
        if self.promoted.is_some() {
            return Ok(true);
        }

        self.auxiliary.merge(auxiliary);
        if !self.missing().is_empty() {
            return Ok(false);
        }

        let entity = promote(self.model.kind(), &self.model, &self.auxiliary)?;
        self.promoted = Some(entity);
        Ok(true)
    }
}

impl GraphNodeTarget for Provisional {
    fn target(&self) -> Result<Entity, UnresolvedReferenceError> {
        self.promoted
            .clone()
            .ok_or_else(|| UnresolvedReferenceError::Incomplete {
                entity: self.id().clone(),
                missing: self.missing(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, Promise};
    use crate::compiler::{flatten, gather_dependent_entities};
    use crate::core::NodeId;
    use crate::fixtures;
    use crate::types::LiteralType;

    fn sub_wf_model() -> (WireEntity, Auxiliary) {
        let set = flatten(fixtures::sub_wf()).unwrap();
        let model = set.get(fixtures::sub_wf().id()).unwrap().clone();
        (model, Auxiliary::from(gather_dependent_entities(&set)))
    }

    #[test]
    fn test_round_trip() {
        let original = fixtures::sub_wf();
        let set = flatten(original.clone()).unwrap();
        let (model, auxiliary) = sub_wf_model();

        let promoted = promote(ResourceKind::Workflow, &model, &auxiliary).unwrap();
        assert_eq!(promoted.id(), original.id());
        assert_eq!(promoted.interface(), original.interface());
        assert_eq!(promoted.origin(), Origin::Remote);

        assert_eq!(flatten(promoted).unwrap(), set);
    }

    #[test]
    fn test_promoted_task_with_node_id_override() {
        let t1 = WireEntity::Task(fixtures::t1().to_template());
        let task = promote(ResourceKind::Task, &t1, &Auxiliary::new()).unwrap();

        let mut bp = Blueprint::new(fixtures::settings().workflow_id("w")).unwrap();
        bp.input("a", LiteralType::Integer);
        let node = bp.node(&task).id("foobar").bind("a", Binding::input("a")).add().unwrap();
        bp.output("o", LiteralType::Integer, node.output("o")).unwrap();
        let w = bp.finish();

        assert_eq!(w.nodes()[0].id(), "foobar");
        assert_eq!(w.outputs()["o"], Binding::Promise(Promise::new("foobar", "o")));
        assert_eq!(w.nodes()[0].target().origin(), Origin::Remote);
    }

    #[test]
    fn test_promoted_launch_plan_is_referenced() {
        let graph = fixtures::sub_wf();
        let mut set = flatten(LaunchConfig::default_for(&graph)).unwrap();
        let lp_id = graph.id().with_kind(ResourceKind::LaunchPlan);
        let model = set.get(&lp_id).unwrap().clone();

        let lp = promote(ResourceKind::LaunchPlan, &model, &Auxiliary::from(&set)).unwrap();

        let mut bp = Blueprint::new(fixtures::settings().workflow_id("w2")).unwrap();
        bp.node(&lp).bind("a", 3i64).bind("b", "x").add().unwrap();
        let w2 = bp.finish();
        assert!(w2.sub_graphs().is_empty());

        let w2_set = flatten(w2.clone()).unwrap();
        let Some(WireEntity::Workflow(spec)) = w2_set.get(w2.id()) else {
            panic!("w2 missing");
        };
        assert_eq!(spec.template.nodes[0].target, TargetRef::LaunchPlan(lp_id.clone()));
        assert!(w2_set.contains(&lp_id));
        assert!(w2_set.contains(graph.id()));

        set.merge(&w2_set);
        assert_eq!(set.ids().filter(|&id| id == graph.id()).count(), 1);
        assert_eq!(set.len(), 5);
        assert!(set.is_dependency_ordered());
    }

    #[test]
    fn test_kind_mismatch() {
        let (model, auxiliary) = sub_wf_model();
        let err = promote(ResourceKind::Task, &model, &auxiliary).unwrap_err();
        assert!(matches!(err, Error::KindMismatch { expected: ResourceKind::Task, .. }));
    }

    #[test]
    fn test_model_kind_must_match_identity() {
        let mut template = fixtures::t1().to_template();
        template.id = fixtures::settings().workflow_id("t1");
        let err = promote(ResourceKind::Task, &WireEntity::Task(template), &Auxiliary::new()).unwrap_err();
        assert!(matches!(err, Error::KindMismatch { expected: ResourceKind::Task, .. }));

        let err = with_template(|template| template.id = fixtures::settings().task_id("sub_wf")).unwrap_err();
        assert!(matches!(err, Error::KindMismatch { expected: ResourceKind::Workflow, .. }));
    }

    #[test]
    fn test_target_kind_must_match_identity() {
        let err = with_template(|template| {
            template.nodes[0].target = TargetRef::Task(fixtures::settings().workflow_id("t1"));
        })
        .unwrap_err();
        assert!(matches!(
            err,
            Error::KindMismatch { expected: ResourceKind::Task, found } if found.kind == ResourceKind::Workflow
        ));
    }

    #[test]
    fn test_missing_auxiliary_task() {
        let (model, _) = sub_wf_model();
        let partial = Auxiliary::new().with_task(fixtures::t1().to_template());
        let err = promote(ResourceKind::Workflow, &model, &partial).unwrap_err();
        assert!(matches!(
            err,
            Error::Unresolved(UnresolvedReferenceError::Entity { missing, .. }) if missing.name == "t2"
        ));
    }

    #[test]
    fn test_missing_declared_sub_workflow() {
        let (mut model, auxiliary) = sub_wf_model();
        if let WireEntity::Workflow(spec) = &mut model {
            spec.sub_workflows.push(fixtures::settings().workflow_id("ghost"));
        }
        let err = promote(ResourceKind::Workflow, &model, &auxiliary).unwrap_err();
        assert!(matches!(
            err,
            Error::Unresolved(UnresolvedReferenceError::Entity { missing, .. }) if missing.name == "ghost"
        ));
    }

    fn with_template(edit: impl FnOnce(&mut WorkflowTemplate)) -> Result<Entity> {
        let (mut model, auxiliary) = sub_wf_model();
        if let WireEntity::Workflow(spec) = &mut model {
            edit(&mut spec.template);
        }
        promote(ResourceKind::Workflow, &model, &auxiliary)
    }

    #[test]
    fn test_wire_nodes_out_of_order_are_sorted() {
        let entity = with_template(|template| template.nodes.reverse()).unwrap();
        let graph = entity.as_graph().unwrap();
        let ids: Vec<_> = graph.nodes().iter().map(|n| n.id().to_string()).collect();
        assert_eq!(ids, ["n0", "n1"]);
    }

    #[test]
    fn test_node_cycle_is_rejected() {
        let err = with_template(|template| {
            template.nodes[0].upstream_node_ids.push(NodeId::new("n1"));
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cycle(CyclicGraphError::Nodes { .. })));
    }

    #[test]
    fn test_unknown_upstream_fails_eagerly() {
        let err = with_template(|template| {
            template.nodes[1]
                .inputs
                .insert("a".to_string(), Promise::new("zz", "o").into());
        })
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Unresolved(UnresolvedReferenceError::Node { upstream, .. }) if upstream == "zz"
        ));

        let err = with_template(|template| {
            template.outputs.insert("x".to_string(), Promise::new("zz", "o").into());
        })
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Unresolved(UnresolvedReferenceError::Output { output, .. }) if output == "x"
        ));
    }

    #[test]
    fn test_interior_bindings_are_type_checked() {
        let err = with_template(|template| {
            template.nodes[1].inputs.insert("b".to_string(), Binding::literal(7i64));
        })
        .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_unbound_output_is_rejected() {
        let err = with_template(|template| {
            template.outputs.shift_remove("y");
        })
        .unwrap_err();
        assert!(matches!(err, Error::Binding(BindingError::MissingInput { .. })));
    }

    #[test]
    fn test_promoter_shares_entities() {
        let (_, auxiliary) = sub_wf_model();
        let mut promoter = Promoter::new(&auxiliary);
        let t1 = fixtures::t1().to_template();

        let a = promoter.promote_task(&t1).unwrap();
        let b = promoter.promote_task(&t1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let graph = promoter
            .promote_workflow(&auxiliary.workflows[fixtures::sub_wf().id()])
            .unwrap();
        assert!(Arc::ptr_eq(graph.nodes()[0].target().as_task().unwrap(), &a));
    }

    #[test]
    fn test_nested_promotion_keeps_sub_workflows() {
        let (model, auxiliary) = sub_wf_model();
        let inner = promote(ResourceKind::Workflow, &model, &auxiliary).unwrap();

        let mut middle = Blueprint::new(fixtures::settings().workflow_id("middle")).unwrap();
        middle.input("a", LiteralType::Integer);
        let node = middle
            .node(&inner)
            .bind("a", Binding::input("a"))
            .bind("b", "hello")
            .add()
            .unwrap();
        middle.output("y", LiteralType::String, node.output("y")).unwrap();
        let middle = middle.finish();

        let set = flatten(middle.clone()).unwrap();
        let promoted_middle = promote(
            ResourceKind::Workflow,
            set.get(middle.id()).unwrap(),
            &Auxiliary::from(&set),
        )
        .unwrap();

        let mut top = Blueprint::new(fixtures::settings().workflow_id("top")).unwrap();
        top.node(&promoted_middle).bind("a", 1i64).add().unwrap();
        let top = top.finish();

        let set = flatten(top.clone()).unwrap();
        let Some(WireEntity::Workflow(spec)) = set.get(top.id()) else {
            panic!("top missing");
        };
        assert_eq!(spec.sub_workflows.len(), 2);
        assert_eq!(spec.sub_workflows, [inner.id().clone(), middle.id().clone()]);
    }

    #[test]
    fn test_provisional_two_phase() {
        let sub = fixtures::sub_wf();
        let mut parent = Blueprint::new(fixtures::settings().workflow_id("parent")).unwrap();
        parent.node(&sub).bind("a", 1i64).bind("b", "x").add().unwrap();
        let parent = parent.finish();

        let set = flatten(parent.clone()).unwrap();
        let mut provisional = Provisional::new(set.get(parent.id()).unwrap().clone());

        let tasks_only = Auxiliary {
            tasks: gather_dependent_entities(&set).0,
            ..Auxiliary::new()
        };
        assert!(!provisional.attach_auxiliary(&tasks_only).unwrap());
        assert!(!provisional.is_complete());
        assert_eq!(provisional.missing(), [sub.id().clone()]);

        let mut bp = Blueprint::new(fixtures::settings().workflow_id("user")).unwrap();
        let err = bp.node(&provisional).add().unwrap_err();
        assert!(matches!(
            err,
            Error::Unresolved(UnresolvedReferenceError::Incomplete { missing, .. }) if missing.len() == 1
        ));

        let rest = Auxiliary::new().with_workflow(sub.to_template());
        assert!(provisional.attach_auxiliary(&rest).unwrap());
        assert!(provisional.is_complete());
        assert!(provisional.missing().is_empty());

        bp.node(&provisional).add().unwrap();
        let user = bp.finish();
        assert_eq!(user.sub_graphs(), [parent.id().clone()]);

        let flattened = flatten(user).unwrap();
        assert!(flattened.is_dependency_ordered());
        assert_eq!(flattened.len(), 5);
    }
}
