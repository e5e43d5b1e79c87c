// ABOUTME: Test support utilities.
// ABOUTME: Provides a recording deployer and tree builders for integration tests.

use std::sync::{Arc, Once};

use kestrel::deploy::{DeploymentContext, DeploymentError, DeploymentStage, Deployer};
use parking_lot::Mutex;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("kestrel=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Shared, ordered log of deploy and undeploy calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    /// Every entry, formatted `"<deployer> deploy|undeploy <unit>"`.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Units deployed successfully, in call order.
    pub fn deployed(&self) -> Vec<String> {
        self.units("deploy")
    }

    /// Units undeployed, in call order.
    pub fn undeployed(&self) -> Vec<String> {
        self.units("undeploy")
    }

    fn units(&self, op: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| {
                let mut parts = e.splitn(3, ' ');
                let (_, kind, unit) = (parts.next()?, parts.next()?, parts.next()?);
                (kind == op).then(|| unit.to_string())
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Deployer that logs every call and faults on request.
#[derive(Debug)]
pub struct RecordingDeployer {
    name: String,
    stage: DeploymentStage,
    journal: Journal,
    parent_first: bool,
    top_level_only: bool,
    components_only: bool,
    want_components: bool,
    input: Option<String>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    fail_on: Vec<String>,
    fail_undeploy_on: Vec<String>,
}

#[allow(dead_code)]
impl RecordingDeployer {
    pub fn new(name: &str, stage: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            stage: DeploymentStage::new(stage),
            journal: journal.clone(),
            parent_first: true,
            top_level_only: false,
            components_only: false,
            want_components: true,
            input: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            fail_on: Vec::new(),
            fail_undeploy_on: Vec::new(),
        }
    }

    pub fn parent_last(mut self) -> Self {
        self.parent_first = false;
        self
    }

    pub fn top_level_only(mut self) -> Self {
        self.top_level_only = true;
        self
    }

    pub fn components_only(mut self) -> Self {
        self.components_only = true;
        self
    }

    pub fn without_components(mut self) -> Self {
        self.want_components = false;
        self
    }

    pub fn with_input(mut self, input: &str) -> Self {
        self.input = Some(input.to_string());
        self
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_on(mut self, unit: &str) -> Self {
        self.fail_on.push(unit.to_string());
        self
    }

    pub fn failing_undeploy_on(mut self, unit: &str) -> Self {
        self.fail_undeploy_on.push(unit.to_string());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Deployer for RecordingDeployer {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> Option<DeploymentStage> {
        Some(self.stage.clone())
    }

    fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    fn inputs(&self) -> Vec<String> {
        if self.inputs.is_empty() {
            self.input.iter().cloned().collect()
        } else {
            self.inputs.clone()
        }
    }

    fn outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn is_top_level_only(&self) -> bool {
        self.top_level_only
    }

    fn is_components_only(&self) -> bool {
        self.components_only
    }

    fn is_want_components(&self) -> bool {
        self.want_components
    }

    fn is_parent_first(&self) -> bool {
        self.parent_first
    }

    fn deploy(&self, unit: &DeploymentContext) -> Result<(), DeploymentError> {
        if self.fail_on.iter().any(|n| n == unit.name()) {
            return Err(DeploymentError::deployer_failed(
                &self.name,
                unit.name(),
                format!("{} refused {}", self.name, unit.name()),
            ));
        }
        self.journal
            .push(format!("{} deploy {}", self.name, unit.name()));
        Ok(())
    }

    fn undeploy(&self, unit: &DeploymentContext) -> Result<(), DeploymentError> {
        self.journal
            .push(format!("{} undeploy {}", self.name, unit.name()));
        if self.fail_undeploy_on.iter().any(|n| n == unit.name()) {
            return Err(DeploymentError::message(format!(
                "{} could not release {}",
                self.name,
                unit.name()
            )));
        }
        Ok(())
    }
}

/// `app` with children `c1`, `c2` and component `app/comp`.
#[allow(dead_code)]
pub fn sample_tree() -> DeploymentContext {
    let app = DeploymentContext::new("app");
    app.add_child("c1");
    app.add_child("c2");
    app.add_component("app/comp");
    app
}
