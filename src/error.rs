use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::core::{Identity, NodeId, ResourceKind};
use crate::types::LiteralType;

/// Crate-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    #[error(transparent)]
    Cycle(#[from] CyclicGraphError),

    #[error(transparent)]
    Unresolved(#[from] UnresolvedReferenceError),

    #[error(transparent)]
    RemoteExecution(#[from] RemoteExecutionNotSupportedError),

    #[error("Expected a {expected} model, got '{found}'")]
    KindMismatch {
        expected: ResourceKind,
        found: Identity,
    },

    #[error("'{entity}' failed while running locally:\n{source}")]
    Execution {
        entity: Identity,
        #[source]
        source: anyhow::Error,
    },

    #[error("Wire encoding error:\n{0}")]
    Wire(#[from] WireError),

    #[error("Configuration error:\n{0}")]
    Config(#[from] ConfigError),
}

/// The position of a binding, used to point at the offending input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    /// Input of a node inside a graph.
    Node { node: NodeId, input: String },
    /// Output of the graph under construction.
    GraphOutput { output: String },
    /// Default or fixed input of a launch plan.
    LaunchInput { input: String },
    /// Input passed to an entity invoked directly.
    Invocation { entity: Identity, input: String },
    /// Output produced by an entity invoked directly.
    Produced { entity: Identity, output: String },
}

impl Display for Site {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Site::Node { node, input } => write!(f, "input '{input}' of node '{node}'"),
            Site::GraphOutput { output } => write!(f, "workflow output '{output}'"),
            Site::LaunchInput { input } => write!(f, "launch plan input '{input}'"),
            Site::Invocation { entity, input } => write!(f, "input '{input}' of '{entity}'"),
            Site::Produced { entity, output } => write!(f, "output '{output}' of '{entity}'"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("{site} references node '{node}' which is not defined before it")]
    UndefinedNode { site: Site, node: NodeId },

    #[error("{site} references output '{output}' which node '{node}' does not declare")]
    UndefinedOutput {
        site: Site,
        node: NodeId,
        output: String,
    },

    #[error("{site} references workflow input '{input}' which is not declared")]
    UndefinedGraphInput { site: Site, input: String },

    #[error("{site} is required but was not bound and has no default")]
    MissingInput { site: Site },

    #[error("{site} is not declared by the target interface")]
    UnknownInput { site: Site },

    #[error("Node '{node}' is ordered after '{upstream}' which is not defined before it")]
    UndefinedUpstream { node: NodeId, upstream: NodeId },

    #[error("Node id '{0}' is already used in this workflow")]
    DuplicateNode(NodeId),

    #[error("Workflow output '{0}' is declared twice")]
    DuplicateOutput(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{site} expects {expected}, got {found}")]
pub struct TypeMismatchError {
    pub site: Site,
    pub expected: LiteralType,
    pub found: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CyclicGraphError {
    #[error("Reference cycle between entities: {}", join_path(.0))]
    Entities(Vec<Identity>),

    #[error("Workflow '{graph}' has a dependency cycle through node '{node}'")]
    Nodes { graph: Identity, node: NodeId },
}

fn join_path(path: &[Identity]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnresolvedReferenceError {
    #[error("'{referrer}' references '{missing}' which was not supplied")]
    Entity { referrer: Identity, missing: Identity },

    #[error("Workflow '{graph}': node '{node}' depends on unknown node '{upstream}'")]
    Node {
        graph: Identity,
        node: NodeId,
        upstream: NodeId,
    },

    #[error("Workflow '{graph}': output '{output}' is bound to unknown node '{upstream}'")]
    Output {
        graph: Identity,
        output: String,
        upstream: NodeId,
    },

    #[error("'{entity}' is still provisional, missing: {}", join_list(.missing))]
    Incomplete {
        entity: Identity,
        missing: Vec<Identity>,
    },
}

fn join_list(ids: &[Identity]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{entity}' is a remote entity and cannot be run locally")]
pub struct RemoteExecutionNotSupportedError {
    pub entity: Identity,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdentityError {
    #[error("Expected 'kind:project:domain:name:version', got '{0}'")]
    Shape(String),

    #[error("Unknown resource kind '{0}'")]
    UnknownKind(String),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error(transparent)]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read settings file.\n{0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't parse settings file.\n{0}")]
    Json(#[from] serde_json::Error),

    #[error("Environment variable {0} is not set")]
    MissingVar(&'static str),
}
