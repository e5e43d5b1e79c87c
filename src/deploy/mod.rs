// ABOUTME: The deployer pipeline: stages, deployers, tree traversal, and the batch driver.
// ABOUTME: Exports the deployment tree, deployer contract, registries, and completion checks.

mod completion;
mod context;
mod controller_context;
mod deployer;
mod deployers;
mod error;
mod main_deployer;
mod outcome;
mod registry;
mod relevance;
mod sorter;
pub mod stage;
mod state;
mod statistics;
pub mod traversal;

pub use completion::{
    IncompleteDeploymentError, IncompleteDeployments, MissingDependency, check_complete,
    check_complete_contexts, root_cause,
};
pub use context::{ContextKind, DeploymentContext};
pub use deployer::{DeployOutcome, Deployer, DeployerHandle};
pub use deployers::{Deployers, ProcessReport};
pub use error::{DeployerRegistryError, DeploymentError};
pub use main_deployer::{MainDeployer, StructureDeployer};
pub use outcome::{UndeployFailure, UndeployOutcome};
pub use registry::{DeployerRegistry, StageRegistry};
pub use relevance::is_relevant;
pub use sorter::CycleDetected;
pub use stage::DeploymentStage;
pub use state::DeploymentState;
pub use statistics::DeployerStatistics;
