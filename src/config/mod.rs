// ABOUTME: Deployment plan types and parsing for kestrel.yml.
// ABOUTME: Handles YAML parsing, plan discovery, and validation against the stage list.

mod deserialize;
mod init;

pub use init::init_config;

use crate::controller::ControllerState;
use crate::deploy::DeploymentStage;
use crate::deploy::stage::{DEFAULT_STAGES, INSTALLED};
use crate::error::{Error, Result};
use deserialize::{deserialize_deployments, deserialize_state};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "kestrel.yml";
pub const CONFIG_FILENAME_ALT: &str = "kestrel.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".kestrel/plan.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Stages added on top of the defaults.
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    #[serde(default)]
    pub deployers: Vec<DeployerConfig>,

    #[serde(deserialize_with = "deserialize_deployments")]
    pub deployments: NonEmpty<DeploymentConfig>,

    /// Deployments to undeploy in a second batch.
    #[serde(default)]
    pub undeploy: Vec<String>,

    #[serde(default)]
    pub statistics: bool,

    #[serde(default, with = "humantime_serde")]
    pub slow_deployer_threshold: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl StageConfig {
    pub fn to_stage(&self) -> DeploymentStage {
        DeploymentStage::with_anchors(&self.name, self.before.clone(), self.after.clone())
    }
}

/// A deployer driven entirely by the plan.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployerConfig {
    pub name: String,
    pub stage: String,

    #[serde(default)]
    pub input: Option<String>,

    /// Extra inputs for ordering; `input` is always included.
    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    /// Attachments placed on each unit deployed.
    #[serde(default)]
    pub produces: Vec<String>,

    #[serde(default = "default_true")]
    pub parent_first: bool,

    #[serde(default)]
    pub top_level_only: bool,

    #[serde(default)]
    pub components_only: bool,

    #[serde(default = "default_true")]
    pub want_components: bool,

    #[serde(default)]
    pub all_inputs: bool,

    /// Unit names this deployer faults on.
    #[serde(default)]
    pub fail_on: Vec<String>,

    /// Unit names whose undeploy faults.
    #[serde(default)]
    pub fail_undeploy_on: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// One node of a deployment tree.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    pub name: String,

    /// Marker attachments present before any deployer runs.
    #[serde(default)]
    pub attachments: Vec<String>,

    #[serde(default)]
    pub children: Vec<UnitConfig>,

    #[serde(default)]
    pub components: Vec<UnitConfig>,
}

impl UnitConfig {
    /// Every node name in this subtree, depth first.
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for node in self.children.iter().chain(&self.components) {
            names.extend(node.names());
        }
        names
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    #[serde(flatten)]
    pub unit: UnitConfig,

    #[serde(default)]
    pub depends_on: Vec<DependencyConfig>,

    /// Whether a structure deployer claims this deployment.
    #[serde(default = "default_true")]
    pub recognized: bool,
}

impl DeploymentConfig {
    pub fn name(&self) -> &str {
        &self.unit.name
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub target: String,

    /// Stage this deployment cannot enter until the dependency resolves.
    #[serde(default = "default_state", deserialize_with = "deserialize_state")]
    pub when_required: ControllerState,

    /// Stage the target must have reached.
    #[serde(default = "default_state", deserialize_with = "deserialize_state")]
    pub dependent_state: ControllerState,
}

fn default_state() -> ControllerState {
    ControllerState::new(INSTALLED)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Every stage name the plan can refer to, defaults first.
    pub fn stage_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = DEFAULT_STAGES.to_vec();
        names.extend(self.stages.iter().map(|s| s.name.as_str()));
        names
    }

    fn validate(&self) -> Result<()> {
        let mut stages: HashSet<&str> = DEFAULT_STAGES.iter().copied().collect();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(invalid("stage name cannot be empty"));
            }
            for anchor in stage.before.iter().chain(&stage.after) {
                if !stages.contains(anchor.as_str()) {
                    return Err(invalid(format!(
                        "stage {} is anchored to unknown stage {}",
                        stage.name, anchor
                    )));
                }
            }
            stages.insert(&stage.name);
        }

        let mut deployers = HashSet::new();
        for deployer in &self.deployers {
            if !deployers.insert(deployer.name.as_str()) {
                return Err(invalid(format!("duplicate deployer: {}", deployer.name)));
            }
            if !stages.contains(deployer.stage.as_str()) {
                return Err(invalid(format!(
                    "deployer {} uses unknown stage {}",
                    deployer.name, deployer.stage
                )));
            }
            if deployer.top_level_only && deployer.components_only {
                return Err(invalid(format!(
                    "deployer {} cannot be both top_level_only and components_only",
                    deployer.name
                )));
            }
        }

        let mut units = HashSet::new();
        for deployment in &self.deployments {
            for name in deployment.unit.names() {
                if !units.insert(name) {
                    return Err(invalid(format!("duplicate deployment unit: {}", name)));
                }
            }
            for dependency in &deployment.depends_on {
                for state in [&dependency.when_required, &dependency.dependent_state] {
                    if !stages.contains(state.as_str()) {
                        return Err(invalid(format!(
                            "dependency of {} on {} uses unknown stage {}",
                            deployment.name(),
                            dependency.target,
                            state
                        )));
                    }
                }
            }
        }

        for name in &self.undeploy {
            if !self.deployments.iter().any(|d| d.name() == name) {
                return Err(invalid(format!("cannot undeploy unknown deployment {}", name)));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig(message.into())
}
