// ABOUTME: Stage-change driver: moves batches of deployments through the ordered stages.
// ABOUTME: Per-artifact failure isolation on deploy, best-effort progress on undeploy.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::completion::{self, IncompleteDeploymentError};
use super::controller_context::DeploymentControllerContext;
use super::registry::{DeployerRegistry, StageRegistry};
use super::stage::INSTALLED;
use super::traversal::Traversal;
use super::{
    DeployOutcome, Deployer, DeployerHandle, DeployerRegistryError, DeployerStatistics,
    DeploymentContext, DeploymentError, DeploymentStage, DeploymentState, UndeployOutcome,
};
use crate::controller::{Controller, ControllerContext, ControllerState};

/// State shared between the driver and the controller contexts it registers.
pub(crate) struct Shared {
    controller: Arc<dyn Controller>,
    stages: StageRegistry,
    registry: DeployerRegistry,
    statistics: Option<DeployerStatistics>,
    /// Failures from uninstall callbacks, drained into each batch report.
    undeploy_failures: Mutex<UndeployOutcome>,
}

impl Shared {
    /// Run every deployer of stage `to` over `unit`.
    ///
    /// On a fault the deployers that already ran are undone in reverse and
    /// the subtree's deploying nodes fall back to undeployed.
    pub(crate) fn install(
        &self,
        unit: &DeploymentContext,
        from: &ControllerState,
        to: &ControllerState,
    ) -> DeployOutcome {
        let deployers = self.registry.deployers_for(to.as_str());
        tracing::debug!(
            "Moving {} from {} to {} with {} deployer(s)",
            unit.name(),
            from,
            to,
            deployers.len()
        );

        let mut undeploy = UndeployOutcome::default();
        let mut result = Ok(());
        for (k, deployer) in deployers.iter().enumerate() {
            let installed =
                Traversal::new(&**deployer, self.statistics.as_ref(), &mut undeploy).install(unit);
            if let Err(problem) = installed {
                unit.mark_error(Arc::clone(&problem));
                for done in deployers[..k].iter().rev() {
                    Traversal::new(&**done, self.statistics.as_ref(), &mut undeploy)
                        .uninstall(unit);
                }
                unit.set_state_if(DeploymentState::Deploying, DeploymentState::Undeployed);
                result = Err(problem);
                break;
            }
        }
        self.undeploy_failures.lock().absorb(undeploy);

        if result.is_ok() && to.as_str() == INSTALLED {
            unit.set_state_if(DeploymentState::Deploying, DeploymentState::Deployed);
        }
        result
    }

    /// Undo stage `from` for `unit`, deployers in reverse. Never fails.
    pub(crate) fn uninstall(
        &self,
        unit: &DeploymentContext,
        from: &ControllerState,
        to: &ControllerState,
    ) {
        let deployers = self.registry.deployers_for(from.as_str());
        tracing::debug!("Moving {} from {} back to {}", unit.name(), from, to);

        let mut undeploy = UndeployOutcome::default();
        for deployer in deployers.iter().rev() {
            Traversal::new(&**deployer, self.statistics.as_ref(), &mut undeploy).uninstall(unit);
        }
        self.undeploy_failures.lock().absorb(undeploy);
    }
}

/// Outcome of one [`Deployers::process`] batch.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessReport {
    /// Deployments that reached the final stage.
    pub deployed: Vec<String>,
    /// Deployments marked in error.
    pub failed: Vec<String>,
    /// Deployments still short of the final stage, usually waiting on dependencies.
    pub incomplete: Vec<String>,
    pub undeployed: Vec<String>,
    #[serde(skip)]
    pub undeploy_failures: UndeployOutcome,
}

impl ProcessReport {
    /// Whether every deployment finished and every undeploy was clean.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
            && self.incomplete.is_empty()
            && !self.undeploy_failures.has_failures()
    }
}

/// The deployer pipeline: stages, deployers, and the batch driver.
pub struct Deployers {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Deployers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployers")
            .field("stages", &self.shared.stages)
            .field("deployers", &self.shared.registry)
            .finish()
    }
}

impl Deployers {
    /// Pipeline over `controller` with the default stages registered.
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self::build(controller, None)
    }

    /// Like [`Deployers::new`], also timing every deploy call.
    pub fn with_statistics(controller: Arc<dyn Controller>, slow_threshold: Option<Duration>) -> Self {
        Self::build(controller, Some(DeployerStatistics::new(slow_threshold)))
    }

    fn build(controller: Arc<dyn Controller>, statistics: Option<DeployerStatistics>) -> Self {
        let stages = StageRegistry::new(Arc::clone(&controller));
        for stage in DeploymentStage::defaults() {
            stages.add_stage(&stage);
        }
        Self {
            shared: Arc::new(Shared {
                controller,
                stages,
                registry: DeployerRegistry::new(),
                statistics,
                undeploy_failures: Mutex::new(UndeployOutcome::default()),
            }),
        }
    }

    pub fn controller(&self) -> &Arc<dyn Controller> {
        &self.shared.controller
    }

    pub fn add_stage(&self, stage: &DeploymentStage) {
        self.shared.stages.add_stage(stage);
    }

    /// Registered stages in order.
    pub fn stages(&self) -> Vec<DeploymentStage> {
        self.shared.stages.ordered()
    }

    /// Register `deployer`, adding its stage if needed. Returns `false` when
    /// the same deployer is already registered.
    pub fn add_deployer(&self, deployer: Arc<dyn Deployer>) -> Result<bool, DeployerRegistryError> {
        let stage = deployer
            .stage()
            .ok_or_else(|| DeployerRegistryError::MissingStage(deployer.name().to_string()))?;
        self.shared.stages.add_stage(&stage);

        let added = self
            .shared
            .registry
            .add(stage.name(), DeployerHandle::new(deployer))?;
        if added {
            tracing::debug!("Added deployer to stage {}", stage);
        }
        Ok(added)
    }

    pub fn remove_deployer(&self, deployer: Arc<dyn Deployer>) -> bool {
        self.shared.registry.remove(&DeployerHandle::new(deployer))
    }

    /// Replace the registered set, touching only deployers that differ.
    pub fn set_deployers(
        &self,
        deployers: Vec<Arc<dyn Deployer>>,
    ) -> Result<(), DeployerRegistryError> {
        let wanted: Vec<DeployerHandle> = deployers.into_iter().map(DeployerHandle::new).collect();
        let current = self.shared.registry.all();

        for old in current.iter().filter(|d| !wanted.contains(d)) {
            self.shared.registry.remove(old);
        }
        for new in wanted.into_iter().filter(|d| !current.contains(d)) {
            self.add_deployer(Arc::clone(new.inner()))?;
        }
        Ok(())
    }

    /// Every registered deployer in registration order.
    pub fn deployers(&self) -> Vec<DeployerHandle> {
        self.shared.registry.all()
    }

    /// Ordered deployers for a stage. The list is a snapshot.
    pub fn deployers_for(&self, stage: &str) -> Arc<[DeployerHandle]> {
        self.shared.registry.deployers_for(stage)
    }

    pub fn statistics(&self) -> Option<&DeployerStatistics> {
        self.shared.statistics.as_ref()
    }

    /// Undeploy then deploy a batch.
    ///
    /// A fault in one deployment marks it in error without stopping the
    /// others. Nothing is returned as an error; ask [`Deployers::check_complete`]
    /// for the verdict.
    pub fn process(
        &self,
        deploy: &[DeploymentContext],
        undeploy: &[DeploymentContext],
    ) -> ProcessReport {
        let mut report = ProcessReport::default();
        if !undeploy.is_empty() {
            self.undeploy_batch(undeploy, &mut report);
        }
        if !deploy.is_empty() {
            self.deploy_batch(deploy, &mut report);
        }
        report
            .undeploy_failures
            .absorb(self.shared.undeploy_failures.lock().take());
        report
    }

    fn undeploy_batch(&self, undeploy: &[DeploymentContext], report: &mut ProcessReport) {
        let controller = &self.shared.controller;
        let units: Vec<DeploymentContext> = undeploy.iter().rev().cloned().collect();
        tracing::info!("Undeploying {} deployment(s)", units.len());

        for unit in &units {
            if unit.state() != DeploymentState::Error {
                unit.set_state(DeploymentState::Undeploying);
            }
        }

        for state in controller.states().iter().rev() {
            for unit in &units {
                if unit.state() == DeploymentState::Error {
                    continue;
                }
                let Some(current) = controller.context(unit.name()).map(|c| c.state) else {
                    continue;
                };
                if controller.is_after_state(&current, state)
                    && let Err(e) = controller.change(unit.name(), state)
                {
                    let problem = DeploymentError::from_controller(e);
                    tracing::error!("Error undeploying {}: {}", unit.name(), problem);
                    unit.mark_error(problem);
                }
            }
        }

        for unit in &units {
            if controller.uninstall(unit.name()).is_none() {
                tracing::debug!("{} had no controller context", unit.name());
            }
            unit.set_state_recursive(DeploymentState::Undeployed);
            unit.cleanup();
            tracing::info!("Undeployed {}", unit.name());
            report.undeployed.push(unit.name().to_string());
        }
    }

    fn deploy_batch(&self, deploy: &[DeploymentContext], report: &mut ProcessReport) {
        let controller = &self.shared.controller;
        tracing::info!("Deploying {} deployment(s)", deploy.len());

        let mut registered = Vec::with_capacity(deploy.len());
        for unit in deploy {
            unit.clear_problems();
            unit.set_state_recursive(DeploymentState::Deploying);
            match self.register(unit) {
                Ok(()) => registered.push(unit.clone()),
                Err(e) => {
                    tracing::error!("Error registering {}: {}", unit.name(), e);
                    unit.set_state_recursive(DeploymentState::Undeployed);
                    unit.mark_error(Arc::new(e));
                }
            }
        }

        for state in &controller.states() {
            for unit in &registered {
                if unit.state() == DeploymentState::Error {
                    continue;
                }
                let Some(current) = controller.context(unit.name()).map(|c| c.state) else {
                    continue;
                };
                if controller.is_before_state(&current, state)
                    && let Err(e) = controller.change(unit.name(), state)
                {
                    let problem = DeploymentError::from_controller(e);
                    tracing::error!("Error deploying {}: {}", unit.name(), problem);
                    if unit.state() != DeploymentState::Error {
                        unit.mark_error(problem);
                    }
                }
            }
        }

        for unit in deploy {
            let name = unit.name().to_string();
            match unit.state() {
                DeploymentState::Deployed => {
                    tracing::info!("Deployed {}", name);
                    report.deployed.push(name);
                }
                DeploymentState::Error => report.failed.push(name),
                _ => report.incomplete.push(name),
            }
        }
    }

    fn register(&self, unit: &DeploymentContext) -> Result<(), DeploymentError> {
        let actions = DeploymentControllerContext::new(unit.clone(), Arc::downgrade(&self.shared));
        self.shared.controller.install(ControllerContext {
            name: unit.name().to_string(),
            aliases: Vec::new(),
            dependencies: unit.dependencies(),
            actions: Arc::new(actions),
        })?;
        Ok(())
    }

    /// Move one registered deployment to `stage`, forward or backward.
    pub fn change(
        &self,
        unit: &DeploymentContext,
        stage: &DeploymentStage,
    ) -> Result<(), Arc<DeploymentError>> {
        if !self.shared.stages.contains(stage.name()) {
            return Err(Arc::new(DeploymentError::UnknownStage(
                stage.name().to_string(),
            )));
        }
        let controller = &self.shared.controller;
        let Some(current) = controller.context(unit.name()) else {
            return Err(Arc::new(DeploymentError::NotFound(unit.name().to_string())));
        };

        let target = stage.to_state();
        if controller.is_before_state(&target, &current.state) {
            unit.set_state_if(DeploymentState::Deployed, DeploymentState::Deploying);
        }
        controller
            .change(unit.name(), &target)
            .map_err(DeploymentError::from_controller)?;

        match unit.problem() {
            Some(problem) if unit.state() == DeploymentState::Error => Err(problem),
            _ => Ok(()),
        }
    }

    /// The stage a registered deployment currently sits at.
    pub fn deployment_stage(&self, unit: &DeploymentContext) -> Option<DeploymentStage> {
        let context = self.shared.controller.context(unit.name())?;
        self.shared.stages.get(context.state.as_str())
    }

    /// Batch completion check: explicit errors, unclaimed deployments, and
    /// every controller context that has not finished.
    pub fn check_complete(
        &self,
        errors: &[DeploymentContext],
        missing_deployer: &[DeploymentContext],
    ) -> Result<(), IncompleteDeploymentError> {
        completion::check_complete(self.shared.controller.as_ref(), errors, missing_deployer)
    }

    /// Completion check restricted to the given deployment trees.
    pub fn check_complete_contexts(
        &self,
        contexts: &[DeploymentContext],
    ) -> Result<(), IncompleteDeploymentError> {
        completion::check_complete_contexts(self.shared.controller.as_ref(), contexts)
    }

    /// Render registered deployers as a table, optionally for one stage.
    pub fn list_deployers(&self, stage: Option<&str>) -> String {
        let mut out = String::from(
            "<table><tr><th>Stage</th><th>Deployer</th><th>Inputs</th><th>Outputs</th></tr>",
        );
        for current in self.stages() {
            if stage.is_some_and(|s| s != current.name()) {
                continue;
            }
            for deployer in self.deployers_for(current.name()).iter() {
                out.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    current,
                    deployer.name(),
                    deployer.inputs().join(", "),
                    deployer.outputs().join(", ")
                ));
            }
        }
        out.push_str("</table>");
        out
    }

    /// Render deployer timings, or a note when statistics are off.
    pub fn list_deployer_times(&self, details: bool) -> String {
        match &self.shared.statistics {
            Some(statistics) => statistics.render(details),
            None => "No statistics available".to_string(),
        }
    }

    /// Remove every deployer. Stages stay registered.
    pub fn shutdown(&self) {
        for deployer in self.shared.registry.all() {
            self.shared.registry.remove(&deployer);
        }
    }
}
