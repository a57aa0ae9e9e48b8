//! Identities shared by every entity in the system.
//!
//! An [`Identity`] is the only key used for deduplication and the only way
//! one serialized entity refers to another. It is a pure value: computing it
//! never requires a registry lookup.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseIdentityError;

/// The kind of resource an [`Identity`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Task,
    Workflow,
    LaunchPlan,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Task => "task",
            ResourceKind::Workflow => "workflow",
            ResourceKind::LaunchPlan => "launch_plan",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(ResourceKind::Task),
            "workflow" => Ok(ResourceKind::Workflow),
            "launch_plan" => Ok(ResourceKind::LaunchPlan),
            other => Err(ParseIdentityError::UnknownKind(other.to_string())),
        }
    }
}

/// Globally unique name of a task, workflow or launch plan.
///
/// Two entities carrying equal identities are the same entity, whatever their
/// structure. The text form is `kind:project:domain:name:version`.
///
/// Fields are not escaped in the text form, so an identity with a `:` in
/// one of its fields prints fine but does not parse back. The serde form
/// has no such limit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "resource_type")]
    pub kind: ResourceKind,
    pub project: String,
    pub domain: String,
    pub name: String,
    pub version: String,
}

impl Identity {
    pub fn new(
        kind: ResourceKind,
        project: impl Into<String>,
        domain: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            project: project.into(),
            domain: domain.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn task(
        project: impl Into<String>,
        domain: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(ResourceKind::Task, project, domain, name, version)
    }

    pub fn workflow(
        project: impl Into<String>,
        domain: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(ResourceKind::Workflow, project, domain, name, version)
    }

    pub fn launch_plan(
        project: impl Into<String>,
        domain: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(ResourceKind::LaunchPlan, project, domain, name, version)
    }

    /// The identity of the same project/domain/name/version under another kind.
    pub fn with_kind(&self, kind: ResourceKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.kind, self.project, self.domain, self.name, self.version
        )
    }
}

impl FromStr for Identity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [kind, project, domain, name, version] = parts.as_slice() else {
            return Err(ParseIdentityError::Shape(s.to_string()));
        };

        if [project, domain, name, version].iter().any(|p| p.is_empty()) {
            return Err(ParseIdentityError::Shape(s.to_string()));
        }

        Ok(Identity::new(kind.parse()?, *project, *domain, *name, *version))
    }
}

/// Identifier of a node, unique within its owning graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Box<str>);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    /// Id given to the node at `index` when the author does not pick one.
    pub fn auto(index: usize) -> Self {
        Self::new(format!("n{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::new(value)
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_text_form() {
        let id = Identity::task("project", "domain", "t1", "version");
        assert_eq!(id.to_string(), "task:project:domain:t1:version");
        assert_eq!(id.to_string().parse::<Identity>().unwrap(), id);
    }

    #[test]
    fn test_identity_parse_rejects_bad_shape() {
        assert!("task:project:domain:t1".parse::<Identity>().is_err());
        assert!("task:project::t1:v".parse::<Identity>().is_err());
        assert!(matches!(
            "job:p:d:n:v".parse::<Identity>(),
            Err(ParseIdentityError::UnknownKind(kind)) if kind == "job"
        ));
    }

    #[test]
    fn test_with_kind_keeps_coordinates() {
        let wf = Identity::workflow("p", "d", "wf", "v1");
        let lp = wf.with_kind(ResourceKind::LaunchPlan);
        assert_eq!(lp, Identity::launch_plan("p", "d", "wf", "v1"));
        assert_ne!(lp, wf);
    }

    #[test]
    fn test_identity_json_shape() {
        let id = Identity::launch_plan("p", "d", "lp", "v");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["resource_type"], "launch_plan");
        assert_eq!(json["name"], "lp");
    }

    #[test]
    fn test_colon_in_field_does_not_parse_back() {
        let id = Identity::task("p", "d", "ns:t1", "v");
        let text = id.to_string();
        assert_eq!(text, "task:p:d:ns:t1:v");
        assert!(matches!(text.parse::<Identity>(), Err(ParseIdentityError::Shape(_))));

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<Identity>(&json).unwrap(), id);
    }

    #[test]
    fn test_auto_node_id() {
        assert_eq!(NodeId::auto(3), "n3");
    }

    #[test]
    fn test_node_id_is_a_plain_string_on_the_wire() {
        let id = NodeId::new("foobar");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("foobar"));
        assert_eq!(serde_json::from_str::<NodeId>(r#""foobar""#).unwrap(), id);
    }
}
