// ABOUTME: Stages command implementation.
// ABOUTME: Lists the plan's stages in pipeline order.

use std::path::Path;

use kestrel::error::Result;
use kestrel::output::{Output, OutputMode};
use kestrel::plan;

use super::load_plan;

pub fn stages(plan_path: Option<&Path>, output: Output) -> Result<()> {
    let config = load_plan(plan_path)?;
    let plan = plan::build(&config)?;
    let deployers = plan.main.deployers();

    let names: Vec<String> = deployers
        .stages()
        .iter()
        .map(|s| s.name().to_string())
        .collect();

    if output.mode() == OutputMode::Json {
        output.report("stages", &names);
        return Ok(());
    }
    for (index, name) in names.iter().enumerate() {
        let count = deployers.deployers_for(name).len();
        println!("{:>2}. {} ({} deployer(s))", index, name, count);
    }
    Ok(())
}
