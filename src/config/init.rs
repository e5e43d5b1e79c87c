// ABOUTME: Plan scaffolding for new projects.
// ABOUTME: Creates a kestrel.yml template with a small two-deployment pipeline.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const TEMPLATE: &str = r#"# Extra stages slot in among the defaults:
# PreParse, Parse, PostParse, PreDescribe, Describe,
# ClassLoader, PostClassLoader, PreReal, Real, Installed
stages: []

deployers:
  - name: parser
    stage: Parse
    input: descriptor
    outputs: [metadata]
    produces: [metadata]
  - name: installer
    stage: Real
    input: metadata
    # fail_on: [app.ear]

deployments:
  - name: lib.jar
    attachments: [descriptor]
  - name: app.ear
    attachments: [descriptor]
    children:
      - name: web.war
        attachments: [descriptor]
    depends_on:
      - target: lib.jar
        when_required: Real

statistics: false
# slow_deployer_threshold: 500ms
"#;

/// Write a template plan into `dir`.
pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    tracing::debug!("Wrote {}", config_path.display());
    Ok(())
}
