// ABOUTME: Post-hoc completion check over the controller and deployment trees.
// ABOUTME: Classifies unfinished work as errored or dependency-blocked in one aggregate report.

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

use super::DeploymentContext;
use crate::controller::{ContextSnapshot, Controller};

/// A dependency that kept a context from its next state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MissingDependency {
    pub name: String,
    pub dependency: String,
    pub required_state: String,
    pub actual_state: String,
}

/// Everything found unfinished by one check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncompleteDeployments {
    deployments_in_error: BTreeMap<String, String>,
    deployments_missing_deployer: BTreeSet<String>,
    contexts_in_error: BTreeMap<String, String>,
    contexts_missing_dependencies: BTreeMap<String, BTreeSet<MissingDependency>>,
}

impl IncompleteDeployments {
    /// Deployment name to the message of its root-cause fault.
    pub fn deployments_in_error(&self) -> &BTreeMap<String, String> {
        &self.deployments_in_error
    }

    pub fn deployments_missing_deployer(&self) -> &BTreeSet<String> {
        &self.deployments_missing_deployer
    }

    /// Controller context name to the message of its root-cause fault.
    pub fn contexts_in_error(&self) -> &BTreeMap<String, String> {
        &self.contexts_in_error
    }

    pub fn contexts_missing_dependencies(&self) -> &BTreeMap<String, BTreeSet<MissingDependency>> {
        &self.contexts_missing_dependencies
    }

    pub fn is_incomplete(&self) -> bool {
        !self.deployments_in_error.is_empty()
            || !self.deployments_missing_deployer.is_empty()
            || !self.contexts_in_error.is_empty()
            || !self.contexts_missing_dependencies.is_empty()
    }

    fn into_result(self) -> Result<(), IncompleteDeploymentError> {
        if self.is_incomplete() {
            Err(IncompleteDeploymentError { report: self })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for IncompleteDeployments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary of incomplete deployments:")?;

        if !self.deployments_missing_deployer.is_empty() {
            writeln!(f, "\n*** DEPLOYMENTS MISSING DEPLOYERS: Name\n")?;
            for name in &self.deployments_missing_deployer {
                writeln!(f, "{}", name)?;
            }
        }
        if !self.deployments_in_error.is_empty() {
            writeln!(f, "\n*** DEPLOYMENTS IN ERROR: Name -> Error\n")?;
            for (name, cause) in &self.deployments_in_error {
                writeln!(f, "{} -> {}", name, cause)?;
            }
        }
        if !self.contexts_missing_dependencies.is_empty() {
            writeln!(
                f,
                "\n*** CONTEXTS MISSING DEPENDENCIES: Name -> Dependency{{Required State:Actual State}}\n"
            )?;
            for (name, missing) in &self.contexts_missing_dependencies {
                writeln!(f, "{}", name)?;
                for dependency in missing {
                    writeln!(
                        f,
                        " -> {}{{{}:{}}}",
                        dependency.dependency, dependency.required_state, dependency.actual_state
                    )?;
                }
            }
        }
        if !self.contexts_in_error.is_empty() {
            writeln!(f, "\n*** CONTEXTS IN ERROR: Name -> Error\n")?;
            for (name, cause) in &self.contexts_in_error {
                writeln!(f, "{} -> {}", name, cause)?;
            }
        }
        Ok(())
    }
}

/// Raised when a completion check finds anything unfinished.
#[derive(Debug, thiserror::Error)]
#[error("{report}")]
pub struct IncompleteDeploymentError {
    report: IncompleteDeployments,
}

impl IncompleteDeploymentError {
    pub fn report(&self) -> &IncompleteDeployments {
        &self.report
    }

    pub fn into_report(self) -> IncompleteDeployments {
        self.report
    }
}

/// The deepest error in `error`'s source chain.
pub fn root_cause<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

/// Check a finished batch.
///
/// `errors` are deployments known to have failed, `missing_deployer` those
/// no structure deployer recognized. Every unfinished controller context is
/// classified as well.
pub fn check_complete(
    controller: &dyn Controller,
    errors: &[DeploymentContext],
    missing_deployer: &[DeploymentContext],
) -> Result<(), IncompleteDeploymentError> {
    let mut report = IncompleteDeployments::default();

    for unit in errors {
        let cause = match unit.problem() {
            Some(problem) => root_cause(problem.as_ref()).to_string(),
            None => format!("{} is in state {}", unit.name(), unit.state()),
        };
        report
            .deployments_in_error
            .insert(unit.name().to_string(), cause);
    }
    for unit in missing_deployer {
        report
            .deployments_missing_deployer
            .insert(unit.name().to_string());
    }

    for snapshot in controller.not_installed() {
        check_controller_context(controller, &snapshot, &mut report);
    }

    report.into_result()
}

/// Check specific deployment trees: each node's own controller context, the
/// extra contexts it names, its children and its components.
pub fn check_complete_contexts(
    controller: &dyn Controller,
    contexts: &[DeploymentContext],
) -> Result<(), IncompleteDeploymentError> {
    let mut report = IncompleteDeployments::default();
    for unit in contexts {
        check_tree(controller, unit, &mut report);
    }
    report.into_result()
}

fn check_tree(controller: &dyn Controller, unit: &DeploymentContext, report: &mut IncompleteDeployments) {
    if let Some(snapshot) = controller.context(unit.name()) {
        check_controller_context(controller, &snapshot, report);
    }
    for name in unit.controller_names() {
        if let Some(snapshot) = controller.context(&name) {
            check_controller_context(controller, &snapshot, report);
        }
    }
    for child in unit.children() {
        check_tree(controller, &child, report);
    }
    for component in unit.components() {
        check_tree(controller, &component, report);
    }
}

fn check_controller_context(
    controller: &dyn Controller,
    snapshot: &ContextSnapshot,
    report: &mut IncompleteDeployments,
) {
    if let Some(error) = &snapshot.error {
        let cause = root_cause(error.as_ref()).to_string();
        report.contexts_in_error.insert(snapshot.name.clone(), cause);
        return;
    }
    // Sitting where it was asked to be.
    if snapshot.state == snapshot.required_state {
        return;
    }
    let Some(next) = controller.next_state(&snapshot.state) else {
        return;
    };

    let mut missing = BTreeSet::new();
    for item in snapshot
        .dependencies
        .iter()
        .filter(|d| d.when_required() == &next && !d.is_resolved())
    {
        let mut item = item.clone();
        if item.resolve(controller) {
            continue;
        }

        let (dependency, actual) = match item.i_depend_on() {
            Some(target) if target == snapshot.name => continue,
            None => (
                format!("<UNKNOWN {}>", item.name()),
                Err(format!("** UNRESOLVED {} **", item.human_readable())),
            ),
            Some(target) => match controller.context(target) {
                Some(other) => (target.to_string(), Ok(other.state)),
                None => (
                    target.to_string(),
                    Err(format!("** NOT FOUND {} **", item.human_readable())),
                ),
            },
        };

        let required = item.dependent_state();
        let actual_state = match actual {
            // Only a target that has not yet reached the required state blocks.
            Ok(state) if !controller.is_after_state(required, &state) => continue,
            Ok(state) => state.to_string(),
            Err(sentinel) => sentinel,
        };
        missing.insert(MissingDependency {
            name: snapshot.name.clone(),
            dependency,
            required_state: required.to_string(),
            actual_state,
        });
    }

    if !missing.is_empty() {
        report
            .contexts_missing_dependencies
            .insert(snapshot.name.clone(), missing);
    }
}
