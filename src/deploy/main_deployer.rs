// ABOUTME: Facade that owns top-level deployments and queues them for the pipeline.
// ABOUTME: Runs structure recognition on add, then batches deploys and undeploys through Deployers.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::completion::IncompleteDeploymentError;
use super::{Deployers, DeploymentContext, DeploymentError, DeploymentState, ProcessReport};

/// Recognizes a deployment and builds out its children and components.
pub trait StructureDeployer: Send + Sync {
    fn name(&self) -> &str;

    /// Lower values are asked first.
    fn relative_order(&self) -> i32 {
        0
    }

    /// Claim `unit`, returning `true` when recognized. The first claim wins.
    fn determine_structure(&self, unit: &DeploymentContext) -> Result<bool, DeploymentError>;
}

#[derive(Default)]
struct Pending {
    /// Top-level deployments in the order they were added.
    top_level: Vec<DeploymentContext>,
    missing_deployer: Vec<DeploymentContext>,
    deploy: Vec<DeploymentContext>,
    undeploy: Vec<DeploymentContext>,
    /// Names whose structure is being determined right now.
    adding: HashSet<String>,
}

/// Entry point for clients: add and remove deployments, then `process`.
pub struct MainDeployer {
    deployers: Deployers,
    structure: RwLock<Vec<Arc<dyn StructureDeployer>>>,
    pending: Mutex<Pending>,
}

impl MainDeployer {
    pub fn new(deployers: Deployers) -> Self {
        Self {
            deployers,
            structure: RwLock::new(Vec::new()),
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn deployers(&self) -> &Deployers {
        &self.deployers
    }

    pub fn add_structure_deployer(&self, deployer: Arc<dyn StructureDeployer>) {
        let mut structure = self.structure.write();
        structure.push(deployer);
        structure.sort_by_key(|d| d.relative_order());
    }

    pub fn remove_structure_deployer(&self, name: &str) -> bool {
        let mut structure = self.structure.write();
        let before = structure.len();
        structure.retain(|d| d.name() != name);
        structure.len() != before
    }

    /// Register a top-level deployment and queue it for the next `process`.
    ///
    /// Structure recognition starts from an empty unit, so a deployment that
    /// was removed and processed can be added again. A deployment nobody recognizes is
    /// remembered as missing a deployer and never queued. A structure fault
    /// marks it in error.
    pub fn add_deployment(&self, unit: DeploymentContext) -> Result<(), DeploymentError> {
        if !unit.is_top_level() {
            return Err(DeploymentError::NotTopLevel(unit.name().to_string()));
        }
        {
            let mut pending = self.pending.lock();
            // A queued undeploy still needs the old tree.
            if pending.top_level.iter().any(|d| d.name() == unit.name())
                || pending.undeploy.iter().any(|d| d.name() == unit.name())
                || !pending.adding.insert(unit.name().to_string())
            {
                return Err(DeploymentError::AlreadyDeployed(unit.name().to_string()));
            }
        }

        // Structure deployers run unlocked and may call back into this facade.
        unit.reset_structure();
        unit.set_state(DeploymentState::Undeployed);
        unit.set_problem(None);
        let recognized = self.determine_structure(&unit);

        let mut pending = self.pending.lock();
        pending.adding.remove(unit.name());
        match recognized {
            Ok(true) => {
                tracing::debug!("Queued {} for deploy", unit.name());
                pending.deploy.push(unit.clone());
            }
            Ok(false) => {
                tracing::warn!("No structure deployer recognized {}", unit.name());
                pending.missing_deployer.push(unit.clone());
            }
            Err(e) => {
                tracing::error!("Error determining structure of {}: {}", unit.name(), e);
                unit.mark_error(Arc::new(e));
            }
        }
        pending.top_level.push(unit);
        Ok(())
    }

    fn determine_structure(&self, unit: &DeploymentContext) -> Result<bool, DeploymentError> {
        let structure = self.structure.read().clone();
        for deployer in &structure {
            if deployer.determine_structure(unit)? {
                tracing::debug!("{} recognized by {}", unit.name(), deployer.name());
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Forget a top-level deployment, queueing an undeploy if it was processed.
    pub fn remove_deployment(&self, name: &str) -> bool {
        let mut pending = self.pending.lock();
        let Some(index) = pending.top_level.iter().position(|d| d.name() == name) else {
            return false;
        };
        let unit = pending.top_level.remove(index);
        pending.missing_deployer.retain(|d| d != &unit);

        if let Some(queued) = pending.deploy.iter().position(|d| d == &unit) {
            pending.deploy.remove(queued);
        } else if unit.state() != DeploymentState::Undeployed || unit.problem().is_some() {
            pending.undeploy.push(unit);
        }
        true
    }

    /// Run every queued undeploy and deploy as one batch.
    pub fn process(&self) -> ProcessReport {
        let (deploy, undeploy) = {
            let mut pending = self.pending.lock();
            (
                std::mem::take(&mut pending.deploy),
                std::mem::take(&mut pending.undeploy),
            )
        };
        self.deployers.process(&deploy, &undeploy)
    }

    /// Completion check over every known deployment and controller context.
    pub fn check_complete(&self) -> Result<(), IncompleteDeploymentError> {
        let (errors, missing) = {
            let pending = self.pending.lock();
            let errors: Vec<DeploymentContext> = pending
                .top_level
                .iter()
                .filter(|d| d.state() == DeploymentState::Error)
                .cloned()
                .collect();
            (errors, pending.missing_deployer.clone())
        };
        self.deployers.check_complete(&errors, &missing)
    }

    /// Completion check restricted to the named deployments' trees.
    pub fn check_complete_named(&self, names: &[&str]) -> Result<(), DeploymentError> {
        let contexts = names
            .iter()
            .map(|name| {
                self.deployment(name)
                    .ok_or_else(|| DeploymentError::NotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.deployers.check_complete_contexts(&contexts)?;
        Ok(())
    }

    pub fn deployment(&self, name: &str) -> Option<DeploymentContext> {
        self.pending
            .lock()
            .top_level
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    pub fn top_level_deployments(&self) -> Vec<DeploymentContext> {
        self.pending.lock().top_level.clone()
    }

    /// Undeploy everything, most recently added first, and drop all deployers.
    pub fn shutdown(&self) -> ProcessReport {
        let undeploy = {
            let mut pending = self.pending.lock();
            pending.deploy.clear();
            pending.missing_deployer.clear();
            let mut undeploy = std::mem::take(&mut pending.undeploy);
            undeploy.extend(std::mem::take(&mut pending.top_level));
            undeploy
        };
        tracing::info!("Shutting down {} deployment(s)", undeploy.len());
        let report = self.deployers.process(&[], &undeploy);
        self.deployers.shutdown();
        report
    }
}

impl std::fmt::Debug for MainDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending.lock();
        f.debug_struct("MainDeployer")
            .field("deployers", &self.deployers)
            .field("top_level", &pending.top_level)
            .finish()
    }
}
