//! In-process invocation of authored entities.
//!
//! Nodes run one after another in declaration order. Anything promoted from a
//! wire model is refused up front, before a single executor has run.
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::binding::Binding;
use crate::core::{Identity, NodeId};
use crate::entity::{Entity, Origin};
use crate::error::{BindingError, Error, RemoteExecutionNotSupportedError, Result, Site, TypeMismatchError};
use crate::graph::Graph;
use crate::launch::LaunchConfig;
use crate::task::Task;
use crate::types::{Literal, LiteralMap, TypedInterface};

impl Task {
    /// Runs the task's executor on `inputs`.
    ///
    /// Defaults are applied and every input and output is type checked. A
    /// promoted task, or one built without an executor, cannot be called.
    pub fn call(&self, inputs: &LiteralMap) -> Result<LiteralMap> {
        ensure_task(self)?;
        run_task(self, inputs)
    }
}

impl Graph {
    pub fn call(&self, inputs: &LiteralMap) -> Result<LiteralMap> {
        ensure_graph(self, &mut HashSet::new())?;
        run_graph(self, inputs)
    }
}

impl LaunchConfig {
    /// Calls the graph with fixed inputs applied on top of `inputs`.
    pub fn call(&self, inputs: &LiteralMap) -> Result<LiteralMap> {
        ensure_launch_config(self, &mut HashSet::new())?;
        run_launch_config(self, inputs)
    }
}

impl Entity {
    pub fn call(&self, inputs: &LiteralMap) -> Result<LiteralMap> {
        ensure_local(self, &mut HashSet::new())?;
        run(self, inputs)
    }
}

fn remote(id: &Identity) -> RemoteExecutionNotSupportedError {
    RemoteExecutionNotSupportedError { entity: id.clone() }
}

fn ensure_task(task: &Task) -> Result<(), RemoteExecutionNotSupportedError> {
    if task.is_local() { Ok(()) } else { Err(remote(task.id())) }
}

fn ensure_graph(graph: &Graph, seen: &mut HashSet<Identity>) -> Result<(), RemoteExecutionNotSupportedError> {
    if graph.origin() == Origin::Remote {
        return Err(remote(graph.id()));
    }
    for node in graph.nodes() {
        ensure_local(node.target(), seen)?;
    }
    Ok(())
}

fn ensure_launch_config(
    lp: &LaunchConfig,
    seen: &mut HashSet<Identity>,
) -> Result<(), RemoteExecutionNotSupportedError> {
    if lp.origin() == Origin::Remote {
        return Err(remote(lp.id()));
    }
    ensure_graph(lp.graph(), seen)
}

fn ensure_local(entity: &Entity, seen: &mut HashSet<Identity>) -> Result<(), RemoteExecutionNotSupportedError> {
    if !seen.insert(entity.id().clone()) {
        return Ok(());
    }
    match entity {
        Entity::Task(task) => ensure_task(task),
        Entity::Graph(graph) => ensure_graph(graph, seen),
        Entity::LaunchConfig(lp) => ensure_launch_config(lp, seen),
    }
}

fn run(entity: &Entity, inputs: &LiteralMap) -> Result<LiteralMap> {
    match entity {
        Entity::Task(task) => run_task(task, inputs),
        Entity::Graph(graph) => run_graph(graph, inputs),
        Entity::LaunchConfig(lp) => run_launch_config(lp, inputs),
    }
}

fn run_task(task: &Task, inputs: &LiteralMap) -> Result<LiteralMap> {
    let inputs = prepare(task.id(), task.interface(), inputs)?;
    let Some(executor) = &task.executor else {
        return Err(remote(task.id()).into());
    };

    debug!(task = %task.id(), "running task");
    let outputs = executor(&inputs).map_err(|source| Error::Execution {
        entity: task.id().clone(),
        source,
    })?;

    check_outputs(task.id(), task.interface(), outputs)
}

fn run_graph(graph: &Graph, inputs: &LiteralMap) -> Result<LiteralMap> {
    let _span = tracing::debug_span!("call", graph = %graph.id()).entered();
    let inputs = prepare(graph.id(), graph.interface(), inputs)?;

    let mut results: HashMap<&NodeId, LiteralMap> = HashMap::new();
    for node in graph.nodes() {
        let mut args = LiteralMap::new();
        for (name, binding) in node.inputs() {
            let site = Site::Node {
                node: node.id().clone(),
                input: name.clone(),
            };
            args.insert(name.clone(), evaluate(&site, binding, &inputs, &results)?);
        }

        let outputs = run(node.target(), &args)?;
        results.insert(node.id(), outputs);
    }

    let mut outputs = LiteralMap::new();
    for (name, binding) in graph.outputs() {
        let site = Site::GraphOutput { output: name.clone() };
        outputs.insert(name.clone(), evaluate(&site, binding, &inputs, &results)?);
    }

    check_outputs(graph.id(), graph.interface(), outputs)
}

fn run_launch_config(lp: &LaunchConfig, inputs: &LiteralMap) -> Result<LiteralMap> {
    let mut inputs = prepare(lp.id(), lp.interface(), inputs)?;
    for (name, value) in lp.fixed_inputs() {
        inputs.insert(name.clone(), value.clone());
    }
    run_graph(lp.graph(), &inputs)
}

fn evaluate(
    site: &Site,
    binding: &Binding,
    inputs: &LiteralMap,
    results: &HashMap<&NodeId, LiteralMap>,
) -> Result<Literal> {
    match binding {
        Binding::Scalar(literal) => Ok(literal.clone()),
        Binding::GraphInput(name) => inputs.get(name).cloned().ok_or_else(|| {
            BindingError::UndefinedGraphInput {
                site: site.clone(),
                input: name.clone(),
            }
            .into()
        }),
        Binding::Promise(promise) => results
            .get(&promise.node_id)
            .and_then(|outputs| outputs.get(&promise.output))
            .cloned()
            .ok_or_else(|| {
                BindingError::UndefinedOutput {
                    site: site.clone(),
                    node: promise.node_id.clone(),
                    output: promise.output.clone(),
                }
                .into()
            }),
        Binding::Collection(items) => items
            .iter()
            .map(|item| evaluate(site, item, inputs, results))
            .collect::<Result<Vec<_>>>()
            .map(Literal::List),
        Binding::Map(entries) => {
            let mut map = LiteralMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), evaluate(site, value, inputs, results)?);
            }
            Ok(Literal::Map(map))
        }
    }
}

/// Checks `inputs` against `interface` and fills in defaults.
fn prepare(entity: &Identity, interface: &TypedInterface, inputs: &LiteralMap) -> Result<LiteralMap> {
    let site = |input: &str| Site::Invocation {
        entity: entity.clone(),
        input: input.to_string(),
    };

    if let Some(unknown) = inputs.keys().find(|name| !interface.inputs.contains_key(*name)) {
        return Err(BindingError::UnknownInput { site: site(unknown.as_str()) }.into());
    }

    let mut prepared = LiteralMap::new();
    for (name, param) in &interface.inputs {
        let value = match (inputs.get(name), &param.default) {
            (Some(value), _) => value,
            (None, Some(default)) => default,
            (None, None) => {
                return Err(BindingError::MissingInput { site: site(name.as_str()) }.into());
            }
        };

        if !value.conforms_to(&param.ty) {
            return Err(TypeMismatchError {
                site: site(name.as_str()),
                expected: param.ty.clone(),
                found: value.describe(),
            }
            .into());
        }

        prepared.insert(name.clone(), value.clone());
    }

    Ok(prepared)
}

/// Checks produced outputs and puts them in interface order.
fn check_outputs(entity: &Identity, interface: &TypedInterface, mut outputs: LiteralMap) -> Result<LiteralMap> {
    let site = |output: &str| Site::Produced {
        entity: entity.clone(),
        output: output.to_string(),
    };

    if let Some(unknown) = outputs.keys().find(|name| !interface.outputs.contains_key(*name)) {
        return Err(BindingError::UnknownInput { site: site(unknown.as_str()) }.into());
    }

    let mut checked = LiteralMap::new();
    for (name, ty) in &interface.outputs {
        let Some(value) = outputs.shift_remove(name) else {
            return Err(BindingError::MissingInput { site: site(name.as_str()) }.into());
        };
        if !value.conforms_to(ty) {
            return Err(TypeMismatchError {
                site: site(name.as_str()),
                expected: ty.clone(),
                found: value.describe(),
            }
            .into());
        }
        checked.insert(name.clone(), value);
    }

    Ok(checked)
}
