// ABOUTME: Run command implementation.
// ABOUTME: Deploys the plan as one batch, reports outcomes, and checks completion.

use std::path::Path;

use kestrel::deploy::ProcessReport;
use kestrel::error::Result;
use kestrel::output::Output;
use kestrel::plan;

use super::load_plan;

/// Deploy every planned deployment, then run the undeploy list.
pub fn run(plan_path: Option<&Path>, undeploy_all: bool, mut output: Output) -> Result<()> {
    let config = load_plan(plan_path)?;
    output.start_timer();
    let plan = plan::build(&config)?;

    output.progress(&format!(
        "Deploying {} deployment(s) through {} deployer(s)",
        config.deployments.len(),
        config.deployers.len()
    ));
    let report = plan.main.process();
    print_report(&output, "Deploy batch finished", &report);

    let checked = plan.main.check_complete();

    if plan.queue_undeploys() > 0 {
        output.progress(&format!("Undeploying {}", plan.undeploy.join(", ")));
        let report = plan.main.process();
        print_report(&output, "Undeploy batch finished", &report);
    }

    if undeploy_all {
        output.progress("Undeploying everything");
        let report = plan.main.shutdown();
        print_report(&output, "Shutdown finished", &report);
    }

    checked?;
    output.success("All deployments complete");
    Ok(())
}

fn print_report(output: &Output, message: &str, report: &ProcessReport) {
    output.report(message, report);
    for (label, names) in [
        ("deployed", &report.deployed),
        ("failed", &report.failed),
        ("incomplete", &report.incomplete),
        ("undeployed", &report.undeployed),
    ] {
        if !names.is_empty() {
            output.progress(&format!("  {}: {}", label, names.join(", ")));
        }
    }
    for failure in report.undeploy_failures.failures() {
        output.warning(&format!(
            "{} failed to undeploy {}: {}",
            failure.deployer, failure.unit, failure.error
        ));
    }
}
