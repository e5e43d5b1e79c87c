// ABOUTME: Controller state names and ordered-state helpers.
// ABOUTME: Ordering lives in the controller's state list, not in the value itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the state every context starts from and returns to on uninstall.
pub const NOT_INSTALLED: &str = "Not Installed";

/// A named state in the controller's ordered state model.
///
/// Two states compare equal when their names match. Whether one state comes
/// before another is a question for the controller that owns the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerState(String);

impl ControllerState {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn not_installed() -> Self {
        Self::new(NOT_INSTALLED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_not_installed(&self) -> bool {
        self.0 == NOT_INSTALLED
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControllerState {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Index of `state` within an ordered state list.
pub fn index_in(states: &[ControllerState], state: &ControllerState) -> Option<usize> {
    states.iter().position(|s| s == state)
}
