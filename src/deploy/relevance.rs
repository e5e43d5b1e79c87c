// ABOUTME: Decides whether a deployer applies to a given unit.
// ABOUTME: Evaluated fresh on every call since attachments change between stages.

use super::{DeploymentContext, Deployer};

/// Whether `deployer` should run against `unit`.
pub fn is_relevant(deployer: &dyn Deployer, unit: &DeploymentContext) -> bool {
    if deployer.is_top_level_only() && !unit.is_top_level() {
        return false;
    }
    if deployer.is_components_only() && !unit.is_component() {
        return false;
    }
    if !deployer.is_want_components() && unit.is_component() {
        return false;
    }
    if !deployer.is_all_inputs()
        && let Some(input) = deployer.input()
        && !unit.has_attachment(input)
    {
        return false;
    }
    true
}
