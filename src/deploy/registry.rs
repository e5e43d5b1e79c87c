// ABOUTME: Stage and deployer registries backing the pipeline.
// ABOUTME: Stages mirror into the controller's ordered states; deployer lists are copy-on-write per stage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::sorter::{self, CycleDetected};
use super::{DeployerHandle, DeployerRegistryError, DeploymentStage};
use crate::controller::{Controller, ControllerState};

/// Registered deployment stages, mirrored into the controller's state list.
pub struct StageRegistry {
    controller: Arc<dyn Controller>,
    stages: RwLock<HashMap<String, DeploymentStage>>,
}

impl StageRegistry {
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self {
            controller,
            stages: RwLock::new(HashMap::new()),
        }
    }

    /// Register `stage`. Adding a name twice is a no-op.
    ///
    /// The state list is scanned once and whichever anchor matches first
    /// wins: a `before` anchor inserts immediately ahead of that state, an
    /// `after` anchor ahead of its current successor. With neither found the
    /// stage is appended.
    pub fn add_stage(&self, stage: &DeploymentStage) {
        let mut stages = self.stages.write();
        if stages.contains_key(stage.name()) {
            return;
        }

        let states = self.controller.states();
        let before: Option<ControllerState> = states
            .iter()
            .enumerate()
            .find_map(|(index, state)| {
                if stage.before_anchor() == Some(state.as_str()) {
                    Some(Some(state.clone()))
                } else if stage.after_anchor() == Some(state.as_str()) {
                    Some(states.get(index + 1).cloned())
                } else {
                    None
                }
            })
            .flatten();

        tracing::debug!(
            "Adding stage {} before {}",
            stage.name(),
            before.as_ref().map(|s| s.as_str()).unwrap_or("<end>")
        );
        self.controller.add_state(stage.to_state(), before.as_ref());
        stages.insert(stage.name().to_string(), stage.clone());
    }

    pub fn get(&self, name: &str) -> Option<DeploymentStage> {
        self.stages.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.read().contains_key(name)
    }

    /// Registered stages in controller order.
    pub fn ordered(&self) -> Vec<DeploymentStage> {
        let stages = self.stages.read();
        self.controller
            .states()
            .iter()
            .filter_map(|s| stages.get(s.as_str()).cloned())
            .collect()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.ordered())
            .finish()
    }
}

#[derive(Default)]
struct Deployers {
    /// Registration order.
    all: Vec<DeployerHandle>,
    by_stage: HashMap<String, Arc<[DeployerHandle]>>,
}

/// Registered deployers, indexed by stage name.
///
/// Per-stage lists are published as immutable snapshots, so a traversal
/// holding one is unaffected by later registrations.
#[derive(Default)]
pub struct DeployerRegistry {
    inner: Mutex<Deployers>,
}

impl DeployerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `deployer` to `stage`. Returns `false` if it was already registered.
    pub fn add(&self, stage: &str, deployer: DeployerHandle) -> Result<bool, DeployerRegistryError> {
        let mut inner = self.inner.lock();
        if inner.all.contains(&deployer) {
            return Ok(false);
        }

        let current = inner.by_stage.get(stage).cloned();
        let current: &[DeployerHandle] = current.as_deref().unwrap_or(&[]);
        let sorted = sorter::insert(current, deployer.clone()).map_err(|CycleDetected| {
            DeployerRegistryError::Cycle {
                deployer: deployer.name().to_string(),
                stage: stage.to_string(),
            }
        })?;

        inner.by_stage.insert(stage.to_string(), sorted.into());
        inner.all.push(deployer);
        Ok(true)
    }

    /// Remove `deployer`. Returns `false` if it was not registered.
    pub fn remove(&self, deployer: &DeployerHandle) -> bool {
        let mut inner = self.inner.lock();
        let Some(index) = inner.all.iter().position(|d| d == deployer) else {
            return false;
        };
        inner.all.remove(index);

        let mut emptied = Vec::new();
        for (stage, list) in inner.by_stage.iter_mut() {
            if list.contains(deployer) {
                let remaining: Vec<DeployerHandle> =
                    list.iter().filter(|d| *d != deployer).cloned().collect();
                if remaining.is_empty() {
                    emptied.push(stage.clone());
                }
                *list = remaining.into();
            }
        }
        for stage in emptied {
            inner.by_stage.remove(&stage);
        }
        true
    }

    /// Ordered deployers for `stage`; empty when none are registered.
    pub fn deployers_for(&self, stage: &str) -> Arc<[DeployerHandle]> {
        self.inner
            .lock()
            .by_stage
            .get(stage)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Every registered deployer in registration order.
    pub fn all(&self) -> Vec<DeployerHandle> {
        self.inner.lock().all.clone()
    }

    pub fn contains(&self, deployer: &DeployerHandle) -> bool {
        self.inner.lock().all.contains(deployer)
    }

    /// Whether any deployer is registered for `stage`.
    pub fn has_stage(&self, stage: &str) -> bool {
        self.inner.lock().by_stage.contains_key(stage)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().all.is_empty()
    }
}

impl std::fmt::Debug for DeployerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerRegistry")
            .field("deployers", &self.all())
            .finish()
    }
}
