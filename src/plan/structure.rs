// ABOUTME: Structure deployer that builds deployment trees from the plan.
// ABOUTME: Claims recognized deployments and adds their children, components, and dependencies.

use std::collections::HashMap;

use crate::config::{DeploymentConfig, UnitConfig};
use crate::controller::DependencyItem;
use crate::deploy::{DeploymentContext, DeploymentError, StructureDeployer};

/// Recognizes deployments by name against the plan.
#[derive(Debug, Default)]
pub struct DeclaredStructure {
    deployments: HashMap<String, DeploymentConfig>,
}

impl DeclaredStructure {
    pub fn new<'a>(deployments: impl IntoIterator<Item = &'a DeploymentConfig>) -> Self {
        Self {
            deployments: deployments
                .into_iter()
                .map(|d| (d.name().to_string(), d.clone()))
                .collect(),
        }
    }
}

impl StructureDeployer for DeclaredStructure {
    fn name(&self) -> &str {
        "declared-structure"
    }

    fn determine_structure(&self, unit: &DeploymentContext) -> Result<bool, DeploymentError> {
        let Some(config) = self.deployments.get(unit.name()) else {
            return Ok(false);
        };
        if !config.recognized {
            return Ok(false);
        }

        populate(unit, &config.unit);
        for dependency in &config.depends_on {
            unit.add_dependency(DependencyItem::new(
                unit.name(),
                &dependency.target,
                dependency.when_required.clone(),
                dependency.dependent_state.clone(),
            ));
        }
        Ok(true)
    }
}

fn populate(unit: &DeploymentContext, config: &UnitConfig) {
    for attachment in &config.attachments {
        unit.predetermine_marker(attachment.clone());
    }
    for child in &config.children {
        populate(&unit.add_child(&child.name), child);
    }
    for component in &config.components {
        populate(&unit.add_component(&component.name), component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const PLAN: &str = r#"
deployments:
  - name: app.ear
    attachments: [descriptor]
    children:
      - name: web.war
        components:
          - name: web.war/servlet
    depends_on:
      - target: lib.jar
  - name: lib.jar
  - name: hidden.sar
    recognized: false
"#;

    #[test]
    fn builds_declared_tree() {
        let config = Config::from_yaml(PLAN).unwrap();
        let structure = DeclaredStructure::new(&config.deployments);
        let unit = DeploymentContext::new("app.ear");

        assert!(structure.determine_structure(&unit).unwrap());
        assert!(unit.has_attachment("descriptor"));
        assert_eq!(unit.children()[0].name(), "web.war");
        assert_eq!(unit.children()[0].components()[0].name(), "web.war/servlet");
        assert_eq!(unit.dependencies()[0].i_depend_on(), Some("lib.jar"));
    }

    #[test]
    fn unknown_and_unrecognized_are_not_claimed() {
        let config = Config::from_yaml(PLAN).unwrap();
        let structure = DeclaredStructure::new(&config.deployments);

        assert!(!structure
            .determine_structure(&DeploymentContext::new("hidden.sar"))
            .unwrap());
        assert!(!structure
            .determine_structure(&DeploymentContext::new("other.jar"))
            .unwrap());
    }
}
