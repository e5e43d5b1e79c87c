// ABOUTME: The deployer plugin contract and its identity handle.
// ABOUTME: A deployer is bound to one stage and declares the attachments it reads and writes.

use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use super::{DeploymentContext, DeploymentError, DeploymentStage};

/// Result of a deploy step. The fault is shared with the unit it failed on.
pub type DeployOutcome = Result<(), Arc<DeploymentError>>;

/// A unit of work run against deployment units at one stage.
///
/// Declarations are read whenever the deployer is registered or consulted
/// and must not change afterwards.
pub trait Deployer: Send + Sync {
    fn name(&self) -> &str;

    /// Stage the deployer runs at. Registration fails when this is `None`.
    fn stage(&self) -> Option<DeploymentStage>;

    /// The single attachment a unit must carry for this deployer to apply.
    fn input(&self) -> Option<&str> {
        None
    }

    /// Attachments consumed, used for ordering within the stage.
    fn inputs(&self) -> Vec<String> {
        self.input().map(|i| vec![i.to_string()]).unwrap_or_default()
    }

    /// Attachments produced, used for ordering within the stage.
    fn outputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Apply regardless of which attachments are present.
    fn is_all_inputs(&self) -> bool {
        false
    }

    fn is_top_level_only(&self) -> bool {
        false
    }

    fn is_components_only(&self) -> bool {
        false
    }

    fn is_want_components(&self) -> bool {
        true
    }

    /// Run against a parent before its children and components.
    fn is_parent_first(&self) -> bool {
        true
    }

    fn deploy(&self, unit: &DeploymentContext) -> Result<(), DeploymentError>;

    /// Undo `deploy`. Faults are collected, never propagated.
    fn undeploy(&self, _unit: &DeploymentContext) -> Result<(), DeploymentError> {
        Ok(())
    }
}

/// A registered deployer, compared and hashed by identity.
#[derive(Clone)]
pub struct DeployerHandle(Arc<dyn Deployer>);

impl DeployerHandle {
    pub fn new(deployer: Arc<dyn Deployer>) -> Self {
        Self(deployer)
    }

    pub fn inner(&self) -> &Arc<dyn Deployer> {
        &self.0
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    /// Whether something this deployer produces is consumed by `other`.
    pub fn feeds(&self, other: &DeployerHandle) -> bool {
        if self == other {
            return false;
        }
        let inputs = other.inputs();
        self.outputs().iter().any(|o| inputs.contains(o))
    }
}

impl From<Arc<dyn Deployer>> for DeployerHandle {
    fn from(deployer: Arc<dyn Deployer>) -> Self {
        Self(deployer)
    }
}

impl Deref for DeployerHandle {
    type Target = dyn Deployer;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for DeployerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for DeployerHandle {}

impl Hash for DeployerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl std::fmt::Debug for DeployerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeployerHandle").field(&self.name()).finish()
    }
}
