//! Bindings wire node inputs to their sources.
//!
//! A [`Binding`] is either a literal, a [`Promise`] of an upstream node's
//! output, a reference to an input of the enclosing workflow, or a collection
//! of nested bindings. The [`Resolver`] checks a set of bindings against the
//! interface of the node's target and against everything the enclosing
//! workflow has declared so far.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::NodeId;
use crate::error::{BindingError, Result, Site, TypeMismatchError};
use crate::graph::Node;
use crate::types::{Literal, LiteralType, Parameter, TypedInterface};

/// The declared source of a single input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    Scalar(Literal),
    Promise(Promise),
    GraphInput(String),
    Collection(Vec<Binding>),
    Map(IndexMap<String, Binding>),
}

impl Binding {
    /// Binds to an input of the enclosing workflow.
    pub fn input(name: impl Into<String>) -> Self {
        Binding::GraphInput(name.into())
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        Binding::Scalar(value.into())
    }

    pub fn collection(items: impl IntoIterator<Item = Binding>) -> Self {
        Binding::Collection(items.into_iter().collect())
    }

    /// All promises in this binding tree, depth first.
    pub fn promises(&self) -> Vec<&Promise> {
        let mut acc = Vec::new();
        self.collect_promises(&mut acc);
        acc
    }

    fn collect_promises<'a>(&'a self, acc: &mut Vec<&'a Promise>) {
        match self {
            Binding::Promise(promise) => acc.push(promise),
            Binding::Collection(items) => items.iter().for_each(|b| b.collect_promises(acc)),
            Binding::Map(entries) => entries.values().for_each(|b| b.collect_promises(acc)),
            Binding::Scalar(_) | Binding::GraphInput(_) => {}
        }
    }
}

impl From<Promise> for Binding {
    fn from(value: Promise) -> Self {
        Binding::Promise(value)
    }
}

impl From<Literal> for Binding {
    fn from(value: Literal) -> Self {
        Binding::Scalar(value)
    }
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Scalar(value.into())
    }
}

impl From<f64> for Binding {
    fn from(value: f64) -> Self {
        Binding::Scalar(value.into())
    }
}

impl From<bool> for Binding {
    fn from(value: bool) -> Self {
        Binding::Scalar(value.into())
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Scalar(value.into())
    }
}

impl From<String> for Binding {
    fn from(value: String) -> Self {
        Binding::Scalar(value.into())
    }
}

/// A reference to an output of an upstream node.
///
/// Promises are resolved while the workflow is being authored, never at run
/// time: the node they name must already be part of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Promise {
    pub node_id: NodeId,
    pub output: String,
}

impl Promise {
    pub fn new(node_id: impl Into<NodeId>, output: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            output: output.into(),
        }
    }
}

/// Validated inputs of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    /// Bindings in the order of the target's interface.
    pub bindings: IndexMap<String, Binding>,
    /// Upstream nodes, in order of first reference.
    pub upstream: Vec<NodeId>,
}

/// Checks bindings against a workflow under construction.
///
/// The resolver only sees the workflow's inputs and the nodes added so far,
/// so a promise can never point forward or at the node being added.
pub struct Resolver<'a> {
    graph_inputs: &'a IndexMap<String, Parameter>,
    nodes: &'a IndexMap<NodeId, Node>,
}

impl<'a> Resolver<'a> {
    pub fn new(graph_inputs: &'a IndexMap<String, Parameter>, nodes: &'a IndexMap<NodeId, Node>) -> Self {
        Self {
            graph_inputs,
            nodes,
        }
    }

    /// Validates the inputs of node `node` whose target declares `target`.
    pub fn resolve_node(
        &self,
        node: &NodeId,
        target: &TypedInterface,
        inputs: &IndexMap<String, Binding>,
    ) -> Result<ResolvedInputs> {
        let site = |input: &str| Site::Node {
            node: node.clone(),
            input: input.to_string(),
        };

        if let Some(unknown) = inputs.keys().find(|name| !target.inputs.contains_key(*name)) {
            return Err(BindingError::UnknownInput { site: site(unknown.as_str()) }.into());
        }

        let mut bindings = IndexMap::new();
        let mut upstream = Vec::new();

        for (name, param) in &target.inputs {
            match inputs.get(name) {
                Some(binding) => {
                    self.check(&site(name.as_str()), &param.ty, binding, &mut upstream)?;
                    bindings.insert(name.clone(), binding.clone());
                }
                None if param.is_required() => {
                    return Err(BindingError::MissingInput { site: site(name.as_str()) }.into());
                }
                None => {}
            }
        }

        Ok(ResolvedInputs { bindings, upstream })
    }

    /// Validates the binding of a workflow output declared with type `ty`.
    pub fn resolve_output(&self, output: &str, ty: &LiteralType, binding: &Binding) -> Result<Vec<NodeId>> {
        let site = Site::GraphOutput {
            output: output.to_string(),
        };
        let mut upstream = Vec::new();
        self.check(&site, ty, binding, &mut upstream)?;
        Ok(upstream)
    }

    fn check(&self, site: &Site, ty: &LiteralType, binding: &Binding, upstream: &mut Vec<NodeId>) -> Result<()> {
        let mismatch = |found: String| TypeMismatchError {
            site: site.clone(),
            expected: ty.clone(),
            found,
        };

        match binding {
            Binding::Scalar(literal) => {
                if !literal.conforms_to(ty) {
                    return Err(mismatch(literal.describe()).into());
                }
            }
            Binding::Promise(promise) => {
                let node = self.nodes.get(&promise.node_id).ok_or_else(|| BindingError::UndefinedNode {
                    site: site.clone(),
                    node: promise.node_id.clone(),
                })?;

                let found = node
                    .target()
                    .interface()
                    .outputs
                    .get(&promise.output)
                    .ok_or_else(|| BindingError::UndefinedOutput {
                        site: site.clone(),
                        node: promise.node_id.clone(),
                        output: promise.output.clone(),
                    })?;

                if found != ty {
                    return Err(mismatch(found.to_string()).into());
                }

                if !upstream.contains(&promise.node_id) {
                    upstream.push(promise.node_id.clone());
                }
            }
            Binding::GraphInput(name) => {
                let param = self
                    .graph_inputs
                    .get(name)
                    .ok_or_else(|| BindingError::UndefinedGraphInput {
                        site: site.clone(),
                        input: name.clone(),
                    })?;

                if &param.ty != ty {
                    return Err(mismatch(param.ty.to_string()).into());
                }
            }
            Binding::Collection(items) => {
                let LiteralType::List(item_ty) = ty else {
                    return Err(mismatch("list".to_string()).into());
                };
                for item in items {
                    self.check(site, item_ty, item, upstream)?;
                }
            }
            Binding::Map(entries) => {
                let LiteralType::Map(value_ty) = ty else {
                    return Err(mismatch("map".to_string()).into());
                };
                for value in entries.values() {
                    self.check(site, value_ty, value, upstream)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fixtures;

    fn graph_inputs() -> IndexMap<String, Parameter> {
        let mut inputs = IndexMap::new();
        inputs.insert("a".to_string(), Parameter::required(LiteralType::Integer));
        inputs.insert("b".to_string(), Parameter::required(LiteralType::String));
        inputs
    }

    fn upstream_nodes() -> IndexMap<NodeId, Node> {
        let mut nodes = IndexMap::new();
        let node = Node::new(NodeId::new("n0"), fixtures::t1().into());
        nodes.insert(node.id().clone(), node);
        nodes
    }

    fn t2_inputs(a: Binding, b: Binding) -> IndexMap<String, Binding> {
        let mut inputs = IndexMap::new();
        inputs.insert("a".to_string(), a);
        inputs.insert("b".to_string(), b);
        inputs
    }

    #[test]
    fn test_resolves_promise_and_graph_input() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);

        let resolved = resolver
            .resolve_node(
                &NodeId::new("n1"),
                fixtures::t2().interface(),
                &t2_inputs(Promise::new("n0", "o").into(), Binding::input("b")),
            )
            .unwrap();

        assert_eq!(resolved.upstream, vec![NodeId::new("n0")]);
        assert_eq!(resolved.bindings.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_undefined_node_is_rejected() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);

        let err = resolver
            .resolve_node(
                &NodeId::new("n1"),
                fixtures::t2().interface(),
                &t2_inputs(Promise::new("n9", "o").into(), Binding::input("b")),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Binding(BindingError::UndefinedNode { node, .. }) if node == "n9"
        ));
    }

    #[test]
    fn test_undefined_output_and_graph_input() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);
        let id = NodeId::new("n1");
        let iface = fixtures::t2().interface().clone();

        let err = resolver
            .resolve_node(&id, &iface, &t2_inputs(Promise::new("n0", "zzz").into(), "x".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Binding(BindingError::UndefinedOutput { .. })));

        let err = resolver
            .resolve_node(&id, &iface, &t2_inputs(1i64.into(), Binding::input("c")))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Binding(BindingError::UndefinedGraphInput { input, .. }) if input == "c"
        ));
    }

    #[test]
    fn test_literal_type_mismatch() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);

        let err = resolver
            .resolve_node(
                &NodeId::new("n1"),
                fixtures::t2().interface(),
                &t2_inputs("not a number".into(), "b".into()),
            )
            .unwrap_err();

        match err {
            Error::TypeMismatch(err) => {
                assert_eq!(err.expected, LiteralType::Integer);
                assert_eq!(err.found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_promise_type_mismatch() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);

        // t1's output is an integer, t2's "b" is a string.
        let err = resolver
            .resolve_node(
                &NodeId::new("n1"),
                fixtures::t2().interface(),
                &t2_inputs(1i64.into(), Promise::new("n0", "o").into()),
            )
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_missing_and_unknown_inputs() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);
        let iface = fixtures::t2().interface().clone();

        let mut only_a = IndexMap::new();
        only_a.insert("a".to_string(), Binding::literal(1i64));
        let err = resolver.resolve_node(&NodeId::new("n1"), &iface, &only_a).unwrap_err();
        assert!(matches!(err, Error::Binding(BindingError::MissingInput { .. })));

        let mut extra = t2_inputs(1i64.into(), "b".into());
        extra.insert("c".to_string(), Binding::literal(true));
        let err = resolver.resolve_node(&NodeId::new("n1"), &iface, &extra).unwrap_err();
        assert!(matches!(err, Error::Binding(BindingError::UnknownInput { .. })));
    }

    #[test]
    fn test_defaulted_input_may_be_omitted() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);
        let iface = TypedInterface::new()
            .with_input("a", LiteralType::Integer)
            .with_default("b", LiteralType::String, "hello");

        let mut only_a = IndexMap::new();
        only_a.insert("a".to_string(), Binding::input("a"));
        let resolved = resolver.resolve_node(&NodeId::new("n1"), &iface, &only_a).unwrap();
        assert_eq!(resolved.bindings.len(), 1);
        assert!(resolved.upstream.is_empty());
    }

    #[test]
    fn test_collections_recurse() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);
        let ints = LiteralType::list(LiteralType::Integer);

        let ok = Binding::collection([
            Binding::from(Promise::new("n0", "o")),
            Binding::input("a"),
            Binding::from(3i64),
        ]);
        assert_eq!(resolver.resolve_output("xs", &ints, &ok).unwrap(), vec![NodeId::new("n0")]);

        let bad = Binding::collection([Binding::input("b")]);
        assert!(matches!(
            resolver.resolve_output("xs", &ints, &bad),
            Err(Error::TypeMismatch(_))
        ));

        let not_a_list = Binding::Collection(vec![]);
        assert!(matches!(
            resolver.resolve_output("x", &LiteralType::Integer, &not_a_list),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_maps_recurse() {
        let inputs = graph_inputs();
        let nodes = upstream_nodes();
        let resolver = Resolver::new(&inputs, &nodes);
        let ints = LiteralType::map(LiteralType::Integer);

        let entries = |values: Vec<(&str, Binding)>| {
            Binding::Map(values.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
        };

        let ok = entries(vec![
            ("x", Binding::input("a")),
            ("y", Binding::from(Promise::new("n0", "o"))),
            ("z", Binding::from(3i64)),
        ]);
        assert_eq!(resolver.resolve_output("m", &ints, &ok).unwrap(), vec![NodeId::new("n0")]);

        // Maps nested in lists, and the other way round.
        let nested = Binding::collection([entries(vec![("k", Binding::from(Promise::new("n0", "o")))])]);
        let ty = LiteralType::list(ints.clone());
        assert_eq!(resolver.resolve_output("ms", &ty, &nested).unwrap(), vec![NodeId::new("n0")]);

        let bad_value = entries(vec![("x", Binding::input("b"))]);
        match resolver.resolve_output("m", &ints, &bad_value).unwrap_err() {
            Error::TypeMismatch(err) => {
                assert_eq!(err.expected, LiteralType::Integer);
                assert_eq!(err.found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }

        let not_a_map = entries(vec![]);
        assert!(matches!(
            resolver.resolve_output("m", &LiteralType::Integer, &not_a_map),
            Err(Error::TypeMismatch(_))
        ));

        let dangling = entries(vec![("x", Binding::from(Promise::new("n9", "o")))]);
        assert!(matches!(
            resolver.resolve_output("m", &ints, &dangling),
            Err(Error::Binding(BindingError::UndefinedNode { node, .. })) if node == "n9"
        ));
    }

    #[test]
    fn test_promises_walk() {
        let mut map = IndexMap::new();
        map.insert("k".to_string(), Binding::from(Promise::new("n1", "o")));
        let binding = Binding::collection([Binding::from(Promise::new("n0", "o")), Binding::Map(map)]);
        let ids: Vec<_> = binding.promises().iter().map(|p| p.node_id.to_string()).collect();
        assert_eq!(ids, ["n0", "n1"]);
    }
}
