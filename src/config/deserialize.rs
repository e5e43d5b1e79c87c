// ABOUTME: Custom serde deserializers for plan types.
// ABOUTME: Handles the non-empty deployment list and stage names.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::DeploymentConfig;
use crate::controller::ControllerState;

pub fn deserialize_deployments<'de, D>(
    deserializer: D,
) -> Result<NonEmpty<DeploymentConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<DeploymentConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one deployment is required"))
}

pub fn deserialize_state<'de, D>(deserializer: D) -> Result<ControllerState, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.trim().is_empty() {
        return Err(serde::de::Error::custom("stage name cannot be empty"));
    }
    Ok(ControllerState::new(s))
}
