// ABOUTME: Controller context registered for each top-level deployment.
// ABOUTME: Forwards the controller's state moves to the pipeline's install/uninstall.

use std::sync::{Arc, Weak};

use super::deployers::Shared;
use super::{DeploymentContext, DeploymentError};
use crate::controller::{ContextActions, ControllerState};

/// Bridges one deployment to the controller.
///
/// Holds the pipeline weakly so a registered context never keeps a shut
/// down pipeline alive.
pub(crate) struct DeploymentControllerContext {
    unit: DeploymentContext,
    deployers: Weak<Shared>,
}

impl DeploymentControllerContext {
    pub(crate) fn new(unit: DeploymentContext, deployers: Weak<Shared>) -> Self {
        Self { unit, deployers }
    }
}

impl ContextActions for DeploymentControllerContext {
    fn install(
        &self,
        from: &ControllerState,
        to: &ControllerState,
    ) -> Result<(), Arc<DeploymentError>> {
        match self.deployers.upgrade() {
            Some(deployers) => deployers.install(&self.unit, from, to),
            None => {
                let problem = Arc::new(DeploymentError::Shutdown(self.unit.name().to_string()));
                self.unit.mark_error(Arc::clone(&problem));
                Err(problem)
            }
        }
    }

    fn uninstall(&self, from: &ControllerState, to: &ControllerState) {
        match self.deployers.upgrade() {
            Some(deployers) => deployers.uninstall(&self.unit, from, to),
            None => tracing::debug!(
                "Skipping uninstall of {} from {}: deployers shut down",
                self.unit.name(),
                from
            ),
        }
    }
}
