// ABOUTME: Controller error types with SNAFU pattern.
// ABOUTME: Covers unknown contexts, duplicate installs, unknown states and failed install actions.

use std::sync::Arc;

use snafu::Snafu;

use super::ControllerState;
use crate::deploy::DeploymentError;

/// Errors raised by a dependency controller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ControllerError {
    #[snafu(display("no controller context named {name}"))]
    NotFound { name: String },

    #[snafu(display("controller context {name} is already installed"))]
    AlreadyInstalled { name: String },

    #[snafu(display("unknown controller state {state}"))]
    UnknownState { state: ControllerState },

    #[snafu(display("error installing {name} to {state}: {source}"))]
    Install {
        name: String,
        state: ControllerState,
        source: Arc<DeploymentError>,
    },
}

impl ControllerError {
    /// The deployment fault behind a failed install action, if any.
    pub fn deployment_error(&self) -> Option<&Arc<DeploymentError>> {
        match self {
            ControllerError::Install { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
