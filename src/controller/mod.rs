// ABOUTME: Dependency controller contract consumed by the deployer pipeline.
// ABOUTME: Ordered states, per-context state moves, dependency items, and a reference in-memory implementation.

mod dependency;
mod error;
mod memory;
mod state;

pub use dependency::DependencyItem;
pub use error::{
    AlreadyInstalledSnafu, ControllerError, InstallSnafu, NotFoundSnafu, Result,
    UnknownStateSnafu,
};
pub use memory::InMemoryController;
pub use state::{ControllerState, NOT_INSTALLED, index_in};

use std::sync::Arc;

use crate::deploy::DeploymentError;

/// Callbacks a controller makes while moving a context one state at a time.
pub trait ContextActions: Send + Sync {
    /// Move forward from `from` into `to`. A fault leaves the context at `from`.
    fn install(
        &self,
        from: &ControllerState,
        to: &ControllerState,
    ) -> std::result::Result<(), Arc<DeploymentError>>;

    /// Move backward from `from` into `to`. Best effort, never fails.
    fn uninstall(&self, from: &ControllerState, to: &ControllerState);
}

/// Registration handed to [`Controller::install`].
pub struct ControllerContext {
    pub name: String,
    pub aliases: Vec<String>,
    pub dependencies: Vec<DependencyItem>,
    pub actions: Arc<dyn ContextActions>,
}

impl std::fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Point-in-time view of a registered context.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub name: String,
    pub aliases: Vec<String>,
    pub state: ControllerState,
    pub required_state: ControllerState,
    pub error: Option<Arc<DeploymentError>>,
    pub dependencies: Vec<DependencyItem>,
}

impl ContextSnapshot {
    /// Dependencies not yet resolved, as last evaluated by the controller.
    pub fn unresolved_dependencies(&self) -> impl Iterator<Item = &DependencyItem> {
        self.dependencies.iter().filter(|d| !d.is_resolved())
    }
}

/// The dependency/state-machine controller the pipeline drives.
///
/// Implementations serialize state moves per context. The ordered state list
/// only ever grows.
pub trait Controller: Send + Sync {
    /// Ordered snapshot of all states, lowest first.
    fn states(&self) -> Vec<ControllerState>;

    /// Insert `state` immediately before `before`, or append when `before` is
    /// `None` or unknown. Adding a known state is a no-op.
    fn add_state(&self, state: ControllerState, before: Option<&ControllerState>);

    fn install(&self, context: ControllerContext) -> Result<()>;

    /// Request that `name` reach `target`. Forward moves stop quietly at the
    /// first state whose dependencies are unresolved.
    fn change(&self, name: &str, target: &ControllerState) -> Result<()>;

    /// Walk `name` back to `Not Installed` and forget it.
    fn uninstall(&self, name: &str) -> Option<ContextSnapshot>;

    /// Look a context up by name or alias.
    fn context(&self, name: &str) -> Option<ContextSnapshot>;

    /// Contexts in error or short of the final state.
    fn not_installed(&self) -> Vec<ContextSnapshot>;

    fn index_of(&self, state: &ControllerState) -> Option<usize> {
        index_in(&self.states(), state)
    }

    /// Whether `state` comes strictly before `other`. Unknown states are
    /// never before anything.
    fn is_before_state(&self, state: &ControllerState, other: &ControllerState) -> bool {
        let states = self.states();
        match (index_in(&states, state), index_in(&states, other)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// Whether `state` comes strictly after `other`.
    fn is_after_state(&self, state: &ControllerState, other: &ControllerState) -> bool {
        let states = self.states();
        match (index_in(&states, state), index_in(&states, other)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }

    fn next_state(&self, state: &ControllerState) -> Option<ControllerState> {
        let states = self.states();
        index_in(&states, state).and_then(|i| states.get(i + 1).cloned())
    }
}
