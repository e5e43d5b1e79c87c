// ABOUTME: Deployers command implementation.
// ABOUTME: Renders the registered deployers, or their timings after a deploy batch.

use std::path::Path;

use serde::Serialize;

use kestrel::deploy::DeploymentError;
use kestrel::error::Result;
use kestrel::output::{Output, OutputMode};
use kestrel::plan;

use super::load_plan;

#[derive(Serialize)]
struct DeployerRow {
    stage: String,
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    parent_first: bool,
}

pub fn deployers(
    plan_path: Option<&Path>,
    stage: Option<&str>,
    times: bool,
    output: Output,
) -> Result<()> {
    let mut config = load_plan(plan_path)?;
    if times {
        config.statistics = true;
    }
    let plan = plan::build(&config)?;
    let deployers = plan.main.deployers();

    if let Some(stage) = stage
        && !deployers.stages().iter().any(|s| s.name() == stage)
    {
        return Err(DeploymentError::UnknownStage(stage.to_string()).into());
    }

    if times {
        plan.main.process();
        let table = deployers.list_deployer_times(true);
        match output.mode() {
            OutputMode::Json => output.report("deployer times", &table),
            _ => println!("{table}"),
        }
        return Ok(());
    }

    match output.mode() {
        OutputMode::Json => {
            let rows: Vec<DeployerRow> = deployers
                .stages()
                .iter()
                .filter(|s| stage.is_none_or(|wanted| wanted == s.name()))
                .flat_map(|s| {
                    deployers.deployers_for(s.name()).iter().map(|d| DeployerRow {
                        stage: s.name().to_string(),
                        name: d.name().to_string(),
                        inputs: d.inputs(),
                        outputs: d.outputs(),
                        parent_first: d.is_parent_first(),
                    }).collect::<Vec<_>>()
                })
                .collect();
            output.report("deployers", &rows);
        }
        _ => println!("{}", deployers.list_deployers(stage)),
    }
    Ok(())
}
