// ABOUTME: Reference in-memory dependency controller.
// ABOUTME: Moves contexts one state at a time, gating forward moves on dependency items.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    AlreadyInstalledSnafu, ContextActions, ContextSnapshot, Controller, ControllerContext,
    ControllerState, DependencyItem, NotFoundSnafu, Result, UnknownStateSnafu, index_in,
};
use crate::controller::ControllerError;
use crate::deploy::DeploymentError;

struct Entry {
    aliases: Vec<String>,
    state: ControllerState,
    required: ControllerState,
    error: Option<Arc<DeploymentError>>,
    dependencies: Vec<DependencyItem>,
    actions: Arc<dyn ContextActions>,
}

impl Entry {
    fn snapshot(&self, name: &str) -> ContextSnapshot {
        ContextSnapshot {
            name: name.to_string(),
            aliases: self.aliases.clone(),
            state: self.state.clone(),
            required_state: self.required.clone(),
            error: self.error.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

struct Tables {
    states: Vec<ControllerState>,
    /// Install order.
    order: Vec<String>,
    contexts: HashMap<String, Entry>,
    aliases: HashMap<String, String>,
}

impl Tables {
    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// What the next single-step move of a context looks like.
enum Step {
    Done,
    Forward {
        from: ControllerState,
        to: ControllerState,
        gate: Vec<DependencyItem>,
        actions: Arc<dyn ContextActions>,
    },
    Backward {
        from: ControllerState,
        to: ControllerState,
        actions: Arc<dyn ContextActions>,
    },
}

/// A single-process controller with a growable ordered state list.
///
/// The table lock is never held while context actions run, so actions may
/// query the controller.
pub struct InMemoryController {
    tables: Mutex<Tables>,
}

impl Default for InMemoryController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("InMemoryController")
            .field("states", &tables.states)
            .field("contexts", &tables.order)
            .finish()
    }
}

impl InMemoryController {
    /// Controller whose only state is `Not Installed`.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                states: vec![ControllerState::not_installed()],
                order: Vec::new(),
                contexts: HashMap::new(),
                aliases: HashMap::new(),
            }),
        }
    }

    fn next_step(&self, name: &str, target: &ControllerState) -> Result<Step> {
        let tables = self.tables.lock();
        let entry = tables
            .contexts
            .get(name)
            .ok_or_else(|| NotFoundSnafu { name }.build())?;
        let current = index_in(&tables.states, &entry.state).ok_or_else(|| {
            UnknownStateSnafu {
                state: entry.state.clone(),
            }
            .build()
        })?;
        let wanted = index_in(&tables.states, target).ok_or_else(|| {
            UnknownStateSnafu {
                state: target.clone(),
            }
            .build()
        })?;

        if current == wanted {
            return Ok(Step::Done);
        }
        if current < wanted {
            if entry.error.is_some() {
                return Ok(Step::Done);
            }
            let to = tables.states[current + 1].clone();
            let gate = entry
                .dependencies
                .iter()
                .filter(|d| d.when_required() == &to)
                .cloned()
                .collect();
            return Ok(Step::Forward {
                from: entry.state.clone(),
                to,
                gate,
                actions: Arc::clone(&entry.actions),
            });
        }
        Ok(Step::Backward {
            from: entry.state.clone(),
            to: tables.states[current - 1].clone(),
            actions: Arc::clone(&entry.actions),
        })
    }

    /// Walk `name` towards `target` until it arrives, stalls on a dependency,
    /// or an install action faults.
    fn move_context(&self, name: &str, target: &ControllerState) -> Result<()> {
        loop {
            match self.next_step(name, target)? {
                Step::Done => return Ok(()),
                Step::Forward {
                    from,
                    to,
                    mut gate,
                    actions,
                } => {
                    let mut satisfied = true;
                    for item in &mut gate {
                        if !item.resolve(self) {
                            satisfied = false;
                        }
                    }
                    self.record_resolution(name, &gate);
                    if !satisfied {
                        tracing::debug!("{} waiting on dependencies before {}", name, to);
                        return Ok(());
                    }

                    if let Err(source) = actions.install(&from, &to) {
                        let mut tables = self.tables.lock();
                        if let Some(entry) = tables.contexts.get_mut(name) {
                            entry.error = Some(Arc::clone(&source));
                        }
                        return Err(ControllerError::Install {
                            name: name.to_string(),
                            state: to,
                            source,
                        });
                    }

                    let mut tables = self.tables.lock();
                    match tables.contexts.get_mut(name) {
                        Some(entry) => entry.state = to,
                        None => return NotFoundSnafu { name }.fail(),
                    }
                }
                Step::Backward { from, to, actions } => {
                    actions.uninstall(&from, &to);

                    let mut tables = self.tables.lock();
                    let entry = tables
                        .contexts
                        .get_mut(name)
                        .ok_or_else(|| NotFoundSnafu { name }.build())?;
                    entry.state = to;
                    for item in entry
                        .dependencies
                        .iter_mut()
                        .filter(|d| d.when_required() == &from)
                    {
                        item.unresolve();
                    }
                }
            }
        }
    }

    fn record_resolution(&self, name: &str, evaluated: &[DependencyItem]) {
        let mut tables = self.tables.lock();
        if let Some(entry) = tables.contexts.get_mut(name) {
            for item in &mut entry.dependencies {
                if let Some(done) = evaluated.iter().find(|e| e.same_as(item)) {
                    *item = done.clone();
                }
            }
        }
    }

    /// Advance every waiting context whose dependencies may now be satisfied.
    fn resolve_pending(&self) {
        loop {
            let waiting: Vec<(String, ControllerState, ControllerState)> = {
                let tables = self.tables.lock();
                tables
                    .order
                    .iter()
                    .filter_map(|name| {
                        let entry = tables.contexts.get(name)?;
                        let current = index_in(&tables.states, &entry.state)?;
                        let required = index_in(&tables.states, &entry.required)?;
                        (entry.error.is_none() && current < required).then(|| {
                            (name.clone(), entry.state.clone(), entry.required.clone())
                        })
                    })
                    .collect()
            };

            let mut progressed = false;
            for (name, before, required) in waiting {
                if let Err(e) = self.move_context(&name, &required) {
                    tracing::debug!("{} failed while resolving: {}", name, e);
                }
                let after = self.tables.lock().contexts.get(&name).map(|e| e.state.clone());
                if after.as_ref() != Some(&before) {
                    progressed = true;
                }
            }
            if !progressed {
                return;
            }
        }
    }
}

impl Controller for InMemoryController {
    fn states(&self) -> Vec<ControllerState> {
        self.tables.lock().states.clone()
    }

    fn add_state(&self, state: ControllerState, before: Option<&ControllerState>) {
        let mut tables = self.tables.lock();
        if tables.states.contains(&state) {
            return;
        }
        match before.and_then(|b| index_in(&tables.states, b)) {
            Some(index) => tables.states.insert(index, state),
            None => tables.states.push(state),
        }
    }

    fn install(&self, context: ControllerContext) -> Result<()> {
        let mut tables = self.tables.lock();
        let taken = |n: &str| tables.contexts.contains_key(n) || tables.aliases.contains_key(n);
        if taken(&context.name) {
            return AlreadyInstalledSnafu { name: context.name }.fail();
        }
        if let Some(alias) = context.aliases.iter().find(|a| taken(a)) {
            return AlreadyInstalledSnafu {
                name: alias.clone(),
            }
            .fail();
        }

        let name = context.name;
        for alias in &context.aliases {
            tables.aliases.insert(alias.clone(), name.clone());
        }
        let dependencies = context
            .dependencies
            .into_iter()
            .map(|d| d.with_name(name.clone()))
            .collect();
        tables.contexts.insert(
            name.clone(),
            Entry {
                aliases: context.aliases,
                state: ControllerState::not_installed(),
                required: ControllerState::not_installed(),
                error: None,
                dependencies,
                actions: context.actions,
            },
        );
        tracing::debug!("Installed controller context {}", name);
        tables.order.push(name);
        Ok(())
    }

    fn change(&self, name: &str, target: &ControllerState) -> Result<()> {
        let name = {
            let mut tables = self.tables.lock();
            if index_in(&tables.states, target).is_none() {
                return UnknownStateSnafu {
                    state: target.clone(),
                }
                .fail();
            }
            let name = tables.canonical(name).to_string();
            let entry = tables
                .contexts
                .get_mut(&name)
                .ok_or_else(|| NotFoundSnafu { name: name.clone() }.build())?;
            entry.required = target.clone();
            name
        };

        let result = self.move_context(&name, target);
        self.resolve_pending();
        result
    }

    fn uninstall(&self, name: &str) -> Option<ContextSnapshot> {
        let name = self.tables.lock().canonical(name).to_string();
        {
            let mut tables = self.tables.lock();
            let entry = tables.contexts.get_mut(&name)?;
            entry.required = ControllerState::not_installed();
        }
        if let Err(e) = self.move_context(&name, &ControllerState::not_installed()) {
            tracing::warn!("Error walking {} back to not installed: {}", name, e);
        }

        let snapshot = {
            let mut tables = self.tables.lock();
            let entry = tables.contexts.remove(&name)?;
            tables.order.retain(|n| n != &name);
            for alias in &entry.aliases {
                tables.aliases.remove(alias);
            }
            entry.snapshot(&name)
        };
        tracing::debug!("Uninstalled controller context {}", name);
        self.resolve_pending();
        Some(snapshot)
    }

    fn context(&self, name: &str) -> Option<ContextSnapshot> {
        let tables = self.tables.lock();
        let name = tables.canonical(name);
        tables.contexts.get(name).map(|e| e.snapshot(name))
    }

    fn not_installed(&self) -> Vec<ContextSnapshot> {
        let tables = self.tables.lock();
        let last = tables.states.last();
        tables
            .order
            .iter()
            .filter_map(|name| tables.contexts.get(name).map(|e| (name, e)))
            .filter(|(_, e)| e.error.is_some() || Some(&e.state) != last)
            .map(|(name, e)| e.snapshot(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        moves: Mutex<Vec<String>>,
        fail_at: Option<&'static str>,
    }

    impl ContextActions for Recording {
        fn install(
            &self,
            from: &ControllerState,
            to: &ControllerState,
        ) -> std::result::Result<(), Arc<DeploymentError>> {
            if self.fail_at == Some(to.as_str()) {
                return Err(Arc::new(DeploymentError::message("boom")));
            }
            self.moves.lock().push(format!("{}->{}", from, to));
            Ok(())
        }

        fn uninstall(&self, from: &ControllerState, to: &ControllerState) {
            self.moves.lock().push(format!("{}<-{}", to, from));
        }
    }

    fn controller() -> InMemoryController {
        let controller = InMemoryController::new();
        controller.add_state("A".into(), None);
        controller.add_state("B".into(), None);
        controller.add_state("C".into(), None);
        controller
    }

    fn register(
        controller: &InMemoryController,
        name: &str,
        dependencies: Vec<DependencyItem>,
        actions: Arc<Recording>,
    ) {
        controller
            .install(ControllerContext {
                name: name.to_string(),
                aliases: vec![],
                dependencies,
                actions,
            })
            .unwrap();
    }

    #[test]
    fn add_state_inserts_before_anchor_and_ignores_duplicates() {
        let controller = controller();
        controller.add_state("AB".into(), Some(&"B".into()));
        controller.add_state("AB".into(), None);

        let names: Vec<_> = controller.states().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["Not Installed", "A", "AB", "B", "C"]);
    }

    #[test]
    fn change_walks_forward_one_state_at_a_time() {
        let controller = controller();
        let actions = Arc::new(Recording::default());
        register(&controller, "app", vec![], Arc::clone(&actions));

        controller.change("app", &"C".into()).unwrap();

        assert_eq!(
            *actions.moves.lock(),
            ["Not Installed->A", "A->B", "B->C"]
        );
        assert_eq!(controller.context("app").unwrap().state.as_str(), "C");
    }

    #[test]
    fn unresolved_dependency_stalls_without_error() {
        let controller = controller();
        let dependency = DependencyItem::new("app", "db", "B".into(), "C".into());
        register(&controller, "app", vec![dependency], Arc::new(Recording::default()));

        controller.change("app", &"C".into()).unwrap();

        let app = controller.context("app").unwrap();
        assert_eq!(app.state.as_str(), "A");
        assert_eq!(app.required_state.as_str(), "C");
        assert_eq!(controller.not_installed().len(), 1);
    }

    #[test]
    fn waiting_context_advances_once_dependency_arrives() {
        let controller = controller();
        let dependency = DependencyItem::new("app", "db", "B".into(), "C".into());
        register(&controller, "app", vec![dependency], Arc::new(Recording::default()));
        register(&controller, "db", vec![], Arc::new(Recording::default()));

        controller.change("app", &"C".into()).unwrap();
        controller.change("db", &"C".into()).unwrap();

        assert_eq!(controller.context("app").unwrap().state.as_str(), "C");
        assert!(controller.not_installed().is_empty());
    }

    #[test]
    fn failing_install_records_error_and_keeps_last_state() {
        let controller = controller();
        let actions = Arc::new(Recording {
            fail_at: Some("B"),
            ..Default::default()
        });
        register(&controller, "app", vec![], actions);

        let err = controller.change("app", &"C".into()).unwrap_err();

        assert!(matches!(err, ControllerError::Install { .. }));
        let app = controller.context("app").unwrap();
        assert_eq!(app.state.as_str(), "A");
        assert!(app.error.is_some());
    }

    #[test]
    fn uninstall_walks_back_and_forgets() {
        let controller = controller();
        let actions = Arc::new(Recording::default());
        register(&controller, "app", vec![], Arc::clone(&actions));
        controller.change("app", &"B".into()).unwrap();

        let snapshot = controller.uninstall("app").unwrap();

        assert!(snapshot.state.is_not_installed());
        assert!(controller.context("app").is_none());
        assert_eq!(
            *actions.moves.lock(),
            ["Not Installed->A", "A->B", "A<-B", "Not Installed<-A"]
        );
    }

    #[test]
    fn aliases_resolve_and_collide() {
        let controller = controller();
        controller
            .install(ControllerContext {
                name: "app".to_string(),
                aliases: vec!["app-alias".to_string()],
                dependencies: vec![],
                actions: Arc::new(Recording::default()),
            })
            .unwrap();

        assert_eq!(controller.context("app-alias").unwrap().name, "app");
        let err = controller
            .install(ControllerContext {
                name: "app-alias".to_string(),
                aliases: vec![],
                dependencies: vec![],
                actions: Arc::new(Recording::default()),
            })
            .unwrap_err();
        assert!(matches!(err, ControllerError::AlreadyInstalled { .. }));
    }

    #[test]
    fn change_to_unknown_state_fails() {
        let controller = controller();
        register(&controller, "app", vec![], Arc::new(Recording::default()));
        let err = controller.change("app", &"Nowhere".into()).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownState { .. }));
    }
}
