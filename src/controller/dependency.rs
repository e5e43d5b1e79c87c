// ABOUTME: Dependency items tracked per controller context.
// ABOUTME: An item blocks its owner at `when_required` until the target reaches `dependent_state`.

use serde::{Deserialize, Serialize};

use super::{Controller, ControllerState};

/// One dependency of a controller context on another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyItem {
    name: String,
    i_depend_on: Option<String>,
    when_required: ControllerState,
    dependent_state: ControllerState,
    description: Option<String>,
    #[serde(skip)]
    resolved: bool,
}

impl DependencyItem {
    /// Dependency of `name` on `target`, required before `name` may enter
    /// `when_required`; satisfied once `target` has reached `dependent_state`.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        when_required: ControllerState,
        dependent_state: ControllerState,
    ) -> Self {
        Self {
            name: name.into(),
            i_depend_on: Some(target.into()),
            when_required,
            dependent_state,
            description: None,
            resolved: false,
        }
    }

    /// Dependency whose target is not known by name (e.g. a demand for a
    /// capability nobody has supplied yet). Never resolves.
    pub fn unnamed(
        name: impl Into<String>,
        description: impl Into<String>,
        when_required: ControllerState,
    ) -> Self {
        Self {
            name: name.into(),
            i_depend_on: None,
            dependent_state: when_required.clone(),
            when_required,
            description: Some(description.into()),
            resolved: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn i_depend_on(&self) -> Option<&str> {
        self.i_depend_on.as_deref()
    }

    pub fn when_required(&self) -> &ControllerState {
        &self.when_required
    }

    pub fn dependent_state(&self) -> &ControllerState {
        &self.dependent_state
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Rebind the dependent name, used when a declaration is carried into a
    /// controller context registered under a different name.
    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Try to resolve against the controller's current view.
    pub fn resolve(&mut self, controller: &dyn Controller) -> bool {
        let resolved = match &self.i_depend_on {
            None => false,
            Some(target) => match controller.context(target) {
                None => false,
                Some(ctx) if ctx.error.is_some() => false,
                Some(ctx) => !controller.is_before_state(&ctx.state, &self.dependent_state),
            },
        };
        self.resolved = resolved;
        resolved
    }

    /// Same dependency, regardless of resolution.
    pub fn same_as(&self, other: &DependencyItem) -> bool {
        self.name == other.name
            && self.i_depend_on == other.i_depend_on
            && self.when_required == other.when_required
            && self.dependent_state == other.dependent_state
    }

    pub(crate) fn unresolve(&mut self) {
        self.resolved = false;
    }

    pub fn human_readable(&self) -> String {
        match (&self.i_depend_on, &self.description) {
            (_, Some(description)) => description.clone(),
            (Some(target), None) => format!("{} in state {}", target, self.dependent_state),
            (None, None) => self.name.clone(),
        }
    }
}
