// ABOUTME: Deployment stages and the default stage sequence.
// ABOUTME: A stage is a named state with optional before/after anchors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::controller::{ControllerState, NOT_INSTALLED as CONTROLLER_NOT_INSTALLED};

pub const NOT_INSTALLED: &str = CONTROLLER_NOT_INSTALLED;
pub const PRE_PARSE: &str = "PreParse";
pub const PARSE: &str = "Parse";
pub const POST_PARSE: &str = "PostParse";
pub const PRE_DESCRIBE: &str = "PreDescribe";
pub const DESCRIBE: &str = "Describe";
pub const CLASSLOADER: &str = "ClassLoader";
pub const POST_CLASSLOADER: &str = "PostClassLoader";
pub const PRE_REAL: &str = "PreReal";
pub const REAL: &str = "Real";
pub const INSTALLED: &str = "Installed";

/// Default stage names, lowest first.
pub const DEFAULT_STAGES: [&str; 11] = [
    NOT_INSTALLED,
    PRE_PARSE,
    PARSE,
    POST_PARSE,
    PRE_DESCRIBE,
    DESCRIBE,
    CLASSLOADER,
    POST_CLASSLOADER,
    PRE_REAL,
    REAL,
    INSTALLED,
];

/// A named phase of the deployment pipeline.
///
/// `before` and `after` name another stage and are only consulted when the
/// stage is first registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentStage {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    after: Option<String>,
}

impl DeploymentStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    /// Stage to be placed immediately before `before`.
    pub fn before(name: impl Into<String>, before: impl Into<String>) -> Self {
        Self {
            before: Some(before.into()),
            ..Self::new(name)
        }
    }

    /// Stage to be placed immediately after `after`.
    pub fn after(name: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            after: Some(after.into()),
            ..Self::new(name)
        }
    }

    pub fn with_anchors(
        name: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            before,
            after,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn before_anchor(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn after_anchor(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn to_state(&self) -> ControllerState {
        ControllerState::new(self.name.clone())
    }

    /// The default stages, each anchored after its predecessor.
    pub fn defaults() -> Vec<DeploymentStage> {
        let mut stages = vec![DeploymentStage::new(NOT_INSTALLED)];
        for pair in DEFAULT_STAGES.windows(2) {
            stages.push(DeploymentStage::after(pair[1], pair[0]));
        }
        stages
    }
}

impl From<&str> for DeploymentStage {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
