// ABOUTME: Runs one deployer over a deployment tree in parent-first or parent-last order.
// ABOUTME: On a fault, undoes exactly what succeeded, in reverse, before the fault propagates.

use std::sync::Arc;
use std::time::Instant;

use super::relevance::is_relevant;
use super::{
    DeployOutcome, DeployerStatistics, Deployer, DeploymentContext, UndeployFailure,
    UndeployOutcome,
};

/// Deploy `unit` and its subtree with `deployer`, in the deployer's order.
pub fn install(
    deployer: &dyn Deployer,
    unit: &DeploymentContext,
    undeploy: &mut UndeployOutcome,
) -> DeployOutcome {
    Traversal::new(deployer, None, undeploy).install(unit)
}

/// Undeploy `unit` and its subtree with `deployer`, mirroring [`install`].
pub fn uninstall(
    deployer: &dyn Deployer,
    unit: &DeploymentContext,
    undeploy: &mut UndeployOutcome,
) {
    Traversal::new(deployer, None, undeploy).uninstall(unit)
}

/// One deployer's pass over one tree for one stage transition.
pub(crate) struct Traversal<'a> {
    deployer: &'a dyn Deployer,
    statistics: Option<&'a DeployerStatistics>,
    undeploy: &'a mut UndeployOutcome,
}

impl<'a> Traversal<'a> {
    pub(crate) fn new(
        deployer: &'a dyn Deployer,
        statistics: Option<&'a DeployerStatistics>,
        undeploy: &'a mut UndeployOutcome,
    ) -> Self {
        Self {
            deployer,
            statistics,
            undeploy,
        }
    }

    pub(crate) fn install(&mut self, unit: &DeploymentContext) -> DeployOutcome {
        if self.deployer.is_parent_first() {
            self.install_parent_first(unit)
        } else {
            self.install_parent_last(unit)
        }
    }

    pub(crate) fn uninstall(&mut self, unit: &DeploymentContext) {
        if self.deployer.is_parent_first() {
            self.uninstall_parent_last(unit, true, true);
        } else {
            self.uninstall_parent_first(unit, true, true);
        }
    }

    /// Unit, then components, then children.
    fn install_parent_first(&mut self, unit: &DeploymentContext) -> DeployOutcome {
        // Deploying the unit may add components; only the ones present now are walked.
        let components = unit.components();

        self.deploy_unit(unit)?;

        for (i, component) in components.iter().enumerate() {
            if let Err(e) = self.install_parent_first(component) {
                for done in components[..i].iter().rev() {
                    self.uninstall_parent_last(done, true, true);
                }
                self.uninstall_parent_last(unit, false, false);
                return Err(e);
            }
        }

        let children = unit.children();
        for (i, child) in children.iter().enumerate() {
            if let Err(e) = self.install_parent_first(child) {
                for done in children[..i].iter().rev() {
                    self.uninstall_parent_last(done, true, true);
                }
                self.uninstall_parent_last(unit, false, true);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Children, then components, then the unit.
    fn install_parent_last(&mut self, unit: &DeploymentContext) -> DeployOutcome {
        let children = unit.children();
        for (i, child) in children.iter().enumerate() {
            if let Err(e) = self.install_parent_last(child) {
                for done in children[..i].iter().rev() {
                    self.uninstall_parent_first(done, true, true);
                }
                return Err(e);
            }
        }

        let components = unit.components();
        for (i, component) in components.iter().enumerate() {
            if let Err(e) = self.install_parent_last(component) {
                for done in components[..i].iter().rev() {
                    self.uninstall_parent_first(done, true, true);
                }
                self.uninstall_parent_first(unit, false, false);
                return Err(e);
            }
        }

        if let Err(e) = self.deploy_unit(unit) {
            self.uninstall_parent_first(unit, false, true);
            return Err(e);
        }
        Ok(())
    }

    /// Children (reverse), then components (reverse), then the unit.
    fn uninstall_parent_last(
        &mut self,
        unit: &DeploymentContext,
        do_children: bool,
        do_components: bool,
    ) {
        if do_children {
            for child in unit.children().iter().rev() {
                self.uninstall_parent_last(child, true, true);
            }
        }
        if do_components {
            for component in unit.components().iter().rev() {
                self.uninstall_parent_last(component, true, true);
            }
        }
        self.undeploy_unit(unit);
    }

    /// The unit, then components (reverse), then children (reverse).
    ///
    /// With `do_context` false the unit itself is left alone; only its
    /// children are visited, plus its components when `do_components`.
    fn uninstall_parent_first(
        &mut self,
        unit: &DeploymentContext,
        do_context: bool,
        do_components: bool,
    ) {
        if do_context {
            self.undeploy_unit(unit);
        }
        if do_components {
            for component in unit.components().iter().rev() {
                self.uninstall_parent_first(component, true, true);
            }
        }
        for child in unit.children().iter().rev() {
            self.uninstall_parent_first(child, true, true);
        }
    }

    fn deploy_unit(&mut self, unit: &DeploymentContext) -> DeployOutcome {
        if !is_relevant(self.deployer, unit) {
            return Ok(());
        }

        tracing::debug!("Deploying {} with {}", unit.name(), self.deployer.name());
        let started = Instant::now();
        let result = self.deployer.deploy(unit);
        if let Some(statistics) = self.statistics {
            statistics.record(self.deployer.name(), unit.name(), started.elapsed());
        }

        result.map_err(|e| {
            let problem = Arc::new(e);
            tracing::error!(
                "Deployer {} failed on {}: {}",
                self.deployer.name(),
                unit.name(),
                problem
            );
            unit.mark_error(Arc::clone(&problem));
            problem
        })
    }

    fn undeploy_unit(&mut self, unit: &DeploymentContext) {
        if !is_relevant(self.deployer, unit) {
            return;
        }

        tracing::debug!("Undeploying {} with {}", unit.name(), self.deployer.name());
        if let Err(e) = self.deployer.undeploy(unit) {
            self.undeploy.record(UndeployFailure::new(
                self.deployer.name(),
                unit.name(),
                e,
            ));
        }
    }
}
