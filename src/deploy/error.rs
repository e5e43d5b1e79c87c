// ABOUTME: Error types for deployer pipeline operations.
// ABOUTME: Deployer faults, registry rejections, and unknown stages or deployments.

use std::sync::Arc;

use super::IncompleteDeploymentError;
use crate::controller::ControllerError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Faults raised while moving a deployment through its stages.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    /// A deployer rejected a unit.
    #[error("deployer {deployer} failed on {unit}: {source}")]
    DeployerFailed {
        deployer: String,
        unit: String,
        #[source]
        source: BoxError,
    },

    /// A fault rethrown with extra context.
    #[error("{message}")]
    Wrapped {
        message: String,
        #[source]
        source: Arc<DeploymentError>,
    },

    /// No stage with that name is registered.
    #[error("unknown deployment stage: {0}")]
    UnknownStage(String),

    /// No deployment with that name is known.
    #[error("no deployment named {0}")]
    NotFound(String),

    /// A top-level deployment with that name already exists.
    #[error("deployment {0} is already deployed")]
    AlreadyDeployed(String),

    /// Only top-level deployments may be added or removed directly.
    #[error("{0} is not a top-level deployment")]
    NotTopLevel(String),

    /// The pipeline that owned this deployment has gone away.
    #[error("deployers for {0} have been shut down")]
    Shutdown(String),

    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Incomplete(#[from] IncompleteDeploymentError),

    #[error("{0}")]
    Message(String),
}

impl DeploymentError {
    pub fn message(message: impl Into<String>) -> Self {
        DeploymentError::Message(message.into())
    }

    /// Attribute an arbitrary failure to a deployer and unit.
    pub fn deployer_failed(
        deployer: impl Into<String>,
        unit: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        DeploymentError::DeployerFailed {
            deployer: deployer.into(),
            unit: unit.into(),
            source: source.into(),
        }
    }

    pub fn wrap(message: impl Into<String>, source: Arc<DeploymentError>) -> Self {
        DeploymentError::Wrapped {
            message: message.into(),
            source,
        }
    }

    /// The deployment fault carried by a controller error, or the controller
    /// error itself wrapped as one.
    pub fn from_controller(error: ControllerError) -> Arc<DeploymentError> {
        match error.deployment_error() {
            Some(source) => Arc::clone(source),
            None => Arc::new(DeploymentError::Controller(error)),
        }
    }
}

/// Reasons a deployer cannot be registered.
#[derive(Debug, thiserror::Error)]
pub enum DeployerRegistryError {
    /// Deployers must declare a stage.
    #[error("deployer {0} declares no stage")]
    MissingStage(String),

    /// Input/output declarations form a cycle within the stage.
    #[error("deployer {deployer} creates an input/output cycle in stage {stage}")]
    Cycle { deployer: String, stage: String },
}
