// ABOUTME: Deployer whose behavior comes entirely from the deployment plan.
// ABOUTME: Attaches declared markers on deploy and faults on the units it is told to.

use crate::config::DeployerConfig;
use crate::deploy::{DeploymentContext, DeploymentError, DeploymentStage, Deployer};

/// A plan-declared deployer.
#[derive(Debug, Clone)]
pub struct ScriptedDeployer {
    config: DeployerConfig,
}

impl ScriptedDeployer {
    pub fn new(config: DeployerConfig) -> Self {
        Self { config }
    }
}

impl Deployer for ScriptedDeployer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn stage(&self) -> Option<DeploymentStage> {
        Some(DeploymentStage::new(&self.config.stage))
    }

    fn input(&self) -> Option<&str> {
        self.config.input.as_deref()
    }

    fn inputs(&self) -> Vec<String> {
        let mut inputs: Vec<String> = self.config.input.iter().cloned().collect();
        for input in &self.config.inputs {
            if !inputs.contains(input) {
                inputs.push(input.clone());
            }
        }
        inputs
    }

    fn outputs(&self) -> Vec<String> {
        self.config.outputs.clone()
    }

    fn is_all_inputs(&self) -> bool {
        self.config.all_inputs
    }

    fn is_top_level_only(&self) -> bool {
        self.config.top_level_only
    }

    fn is_components_only(&self) -> bool {
        self.config.components_only
    }

    fn is_want_components(&self) -> bool {
        self.config.want_components
    }

    fn is_parent_first(&self) -> bool {
        self.config.parent_first
    }

    fn deploy(&self, unit: &DeploymentContext) -> Result<(), DeploymentError> {
        if self.config.fail_on.iter().any(|n| n == unit.name()) {
            return Err(DeploymentError::deployer_failed(
                &self.config.name,
                unit.name(),
                format!("{} is configured to fail on {}", self.config.name, unit.name()),
            ));
        }
        for attachment in &self.config.produces {
            unit.attach_marker(attachment.clone());
        }
        Ok(())
    }

    fn undeploy(&self, unit: &DeploymentContext) -> Result<(), DeploymentError> {
        for attachment in &self.config.produces {
            unit.remove_attachment(attachment);
        }
        if self.config.fail_undeploy_on.iter().any(|n| n == unit.name()) {
            return Err(DeploymentError::message(format!(
                "{} is configured to fail undeploying {}",
                self.config.name,
                unit.name()
            )));
        }
        Ok(())
    }
}
