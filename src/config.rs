//! Project coordinates shared by every identity a program authors.
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::core::{Identity, ResourceKind};
use crate::error::ConfigError;

const ENV_PROJECT: &str = "WIREFOLD_PROJECT";
const ENV_DOMAIN: &str = "WIREFOLD_DOMAIN";
const ENV_VERSION: &str = "WIREFOLD_VERSION";

/// Where authored entities are registered, and under which version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub project: String,
    pub domain: String,
    pub version: String,
}

impl Settings {
    pub fn new(project: impl Into<String>, domain: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            domain: domain.into(),
            version: version.into(),
        }
    }

    /// Reads settings from a JSON file.
    pub fn from_file(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reads `WIREFOLD_PROJECT`, `WIREFOLD_DOMAIN` and `WIREFOLD_VERSION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key| lookup(key).ok_or(ConfigError::MissingVar(key));
        Ok(Self {
            project: read(ENV_PROJECT)?,
            domain: read(ENV_DOMAIN)?,
            version: read(ENV_VERSION)?,
        })
    }

    pub fn identity(&self, kind: ResourceKind, name: impl Into<String>) -> Identity {
        Identity::new(kind, &self.project, &self.domain, name, &self.version)
    }

    pub fn task_id(&self, name: impl Into<String>) -> Identity {
        self.identity(ResourceKind::Task, name)
    }

    pub fn workflow_id(&self, name: impl Into<String>) -> Identity {
        self.identity(ResourceKind::Workflow, name)
    }

    pub fn launch_plan_id(&self, name: impl Into<String>) -> Identity {
        self.identity(ResourceKind::LaunchPlan, name)
    }
}
