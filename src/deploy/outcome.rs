// ABOUTME: Accumulator for best-effort undeploy faults.
// ABOUTME: Undeploy paths never abort; they record failures here and keep going.

use std::sync::Arc;

use super::DeploymentError;

/// Faults collected while undeploying.
#[derive(Debug, Default, Clone)]
pub struct UndeployOutcome {
    failures: Vec<UndeployFailure>,
}

impl UndeployOutcome {
    /// Record a failure, auto-logging it via tracing.
    pub fn record(&mut self, failure: UndeployFailure) {
        tracing::warn!(
            "Error during undeploy of {} by {}: {}",
            failure.unit,
            failure.deployer,
            failure.error
        );
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[UndeployFailure] {
        &self.failures
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Move every failure from `other` into this outcome.
    pub fn absorb(&mut self, other: UndeployOutcome) {
        self.failures.extend(other.failures);
    }

    pub fn take(&mut self) -> UndeployOutcome {
        std::mem::take(self)
    }
}

/// One undeploy call that faulted.
#[derive(Debug, Clone)]
pub struct UndeployFailure {
    pub deployer: String,
    pub unit: String,
    pub error: Arc<DeploymentError>,
}

impl UndeployFailure {
    pub fn new(deployer: impl Into<String>, unit: impl Into<String>, error: DeploymentError) -> Self {
        Self {
            deployer: deployer.into(),
            unit: unit.into(),
            error: Arc::new(error),
        }
    }
}
