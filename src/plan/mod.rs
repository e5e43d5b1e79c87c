// ABOUTME: Turns a parsed deployment plan into a live pipeline.
// ABOUTME: Registers stages and scripted deployers, then queues every declared deployment.

mod scripted;
mod structure;

pub use scripted::ScriptedDeployer;
pub use structure::DeclaredStructure;

use std::sync::Arc;

use crate::config::Config;
use crate::controller::InMemoryController;
use crate::deploy::{Deployers, DeploymentContext, MainDeployer};
use crate::error::Result;

/// A pipeline built from a plan, with its deployments queued.
#[derive(Debug)]
pub struct Plan {
    pub main: MainDeployer,
    /// Deployments to remove in the second batch.
    pub undeploy: Vec<String>,
}

/// Build the pipeline described by `config`.
pub fn build(config: &Config) -> Result<Plan> {
    let controller = Arc::new(InMemoryController::new());
    let deployers = if config.statistics {
        Deployers::with_statistics(controller, config.slow_deployer_threshold)
    } else {
        Deployers::new(controller)
    };

    for stage in &config.stages {
        deployers.add_stage(&stage.to_stage());
    }
    for deployer in &config.deployers {
        deployers.add_deployer(Arc::new(ScriptedDeployer::new(deployer.clone())))?;
    }

    let main = MainDeployer::new(deployers);
    main.add_structure_deployer(Arc::new(DeclaredStructure::new(&config.deployments)));
    for deployment in &config.deployments {
        main.add_deployment(DeploymentContext::new(deployment.name()))?;
    }
    tracing::debug!(
        "Built plan with {} deployer(s) and {} deployment(s)",
        config.deployers.len(),
        config.deployments.len()
    );

    Ok(Plan {
        main,
        undeploy: config.undeploy.clone(),
    })
}

impl Plan {
    /// Queue the plan's undeploy list for the next batch.
    pub fn queue_undeploys(&self) -> usize {
        self.undeploy
            .iter()
            .filter(|name| self.main.remove_deployment(name))
            .count()
    }
}
