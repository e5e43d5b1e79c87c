// ABOUTME: Application-wide error types for kestrel.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::{DeployerRegistryError, DeploymentError, IncompleteDeploymentError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("deployment plan not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("deployer registration failed: {0}")]
    Registry(#[from] DeployerRegistryError),

    #[error("deployment failed: {0}")]
    Deployment(#[from] DeploymentError),

    #[error("{0}")]
    Incomplete(#[from] IncompleteDeploymentError),
}

pub type Result<T> = std::result::Result<T, Error>;
