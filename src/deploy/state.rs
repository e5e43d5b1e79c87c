// ABOUTME: Lifecycle state of a deployment unit.
// ABOUTME: Tracks where a unit sits within one deploy/undeploy cycle.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a deployment unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Not deployed, either never seen or fully undeployed.
    #[default]
    Undeployed,
    /// Registered and moving forward through the stages.
    Deploying,
    /// Reached the final stage.
    Deployed,
    /// Moving backward through the stages.
    Undeploying,
    /// A fault stopped forward progress.
    Error,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Undeployed => "undeployed",
            DeploymentState::Deploying => "deploying",
            DeploymentState::Deployed => "deployed",
            DeploymentState::Undeploying => "undeploying",
            DeploymentState::Error => "error",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
