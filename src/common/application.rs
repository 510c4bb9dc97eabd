use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::error::{AgentError, AgentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Git,
    Hg,
}

/// `manifest.json` bundled in a deployment package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub application: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub repo_type: Option<RepoType>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub repo_revision: Option<String>,
    #[serde(default)]
    pub runtime_args: Vec<String>,
}

impl Manifest {
    pub fn parse(raw: &str) -> AgentResult<Self> {
        let manifest: Manifest =
            serde_json::from_str(raw).map_err(|e| AgentError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> AgentResult<()> {
        let name = self.application.as_str();
        if name.is_empty() {
            return Err(AgentError::InvalidManifest("application name is empty".into()));
        }
        // the name ends up in file names, keys and supervisor program names
        let valid = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
        if !valid || name.starts_with('.') {
            return Err(AgentError::InvalidManifest(format!(
                "invalid application name: {}",
                name
            )));
        }
        if self.repo_type.is_some() != self.repo_url.is_some() {
            return Err(AgentError::InvalidManifest(
                "repo_type and repo_url must be given together".into(),
            ));
        }
        Ok(())
    }
}

/// Persisted per-application configuration, shared by every node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub repo_type: Option<RepoType>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub repo_revision: Option<String>,
    #[serde(default)]
    pub runtime_args: Vec<String>,
    /// node name -> reserved instance ports, in allocation order
    #[serde(default)]
    pub instances: BTreeMap<String, Vec<u16>>,
}

impl ApplicationConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Overwrites manifest-owned fields; `uuid` and `instances` survive.
    pub fn merge_manifest(&mut self, manifest: &Manifest) {
        self.name = manifest.application.clone();
        self.version = manifest.version.clone();
        self.packages = manifest.packages.clone();
        self.runtime = manifest.runtime.clone();
        self.repo_type = manifest.repo_type;
        self.repo_url = manifest.repo_url.clone();
        self.repo_revision = manifest.repo_revision.clone();
        self.runtime_args = manifest.runtime_args.clone();
    }

    pub fn ensure_uuid(&mut self) -> &str {
        self.uuid
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .as_str()
    }

    pub fn ports(&self, node: &str) -> &[u16] {
        self.instances.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}
