// ABOUTME: Integration tests for the stage-change driver and completion checks.
// ABOUTME: Drives batches through an in-memory controller and inspects states and call order.

mod support;

use std::sync::Arc;
use std::time::Duration;

use kestrel::controller::{Controller, ControllerState, DependencyItem, InMemoryController};
use kestrel::deploy::stage::{DESCRIBE, INSTALLED, PARSE, REAL};
use kestrel::deploy::{
    DeploymentContext, DeploymentError, DeploymentStage, DeploymentState, Deployers,
};
use support::{Journal, RecordingDeployer, init_tracing, sample_tree};

fn pipeline() -> Deployers {
    init_tracing();
    Deployers::new(Arc::new(InMemoryController::new()))
}

/// Parse, Describe and Real deployers sharing one journal.
fn three_stage(deployers: &Deployers, journal: &Journal) {
    for (name, stage) in [("parse", PARSE), ("describe", DESCRIBE), ("real", REAL)] {
        deployers
            .add_deployer(RecordingDeployer::new(name, stage, journal).shared())
            .unwrap();
    }
}

fn depends_on(unit: &DeploymentContext, target: &str) {
    unit.add_dependency(DependencyItem::new(
        unit.name(),
        target,
        ControllerState::new(INSTALLED),
        ControllerState::new(INSTALLED),
    ));
}

mod deploy {
    use super::*;

    #[test]
    fn batch_walks_stages_in_order() {
        let deployers = pipeline();
        let journal = Journal::new();
        three_stage(&deployers, &journal);
        let app = DeploymentContext::new("app");

        let report = deployers.process(&[app.clone()], &[]);

        assert_eq!(report.deployed, ["app"]);
        assert!(report.is_clean());
        assert_eq!(
            journal.entries(),
            ["parse deploy app", "describe deploy app", "real deploy app"]
        );
        assert_eq!(app.state(), DeploymentState::Deployed);
        assert_eq!(
            deployers.deployment_stage(&app).unwrap().name(),
            INSTALLED
        );
    }

    #[test]
    fn whole_tree_is_deployed_at_each_stage() {
        let deployers = pipeline();
        let journal = Journal::new();
        three_stage(&deployers, &journal);
        let app = sample_tree();

        deployers.process(&[app.clone()], &[]);

        assert_eq!(journal.deployed().len(), 12);
        for node in app.depth_first() {
            assert_eq!(node.state(), DeploymentState::Deployed, "{}", node.name());
        }
    }

    #[test]
    fn one_failure_does_not_block_the_batch() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(RecordingDeployer::new("parse", PARSE, &journal).shared())
            .unwrap();
        deployers
            .add_deployer(
                RecordingDeployer::new("describe", DESCRIBE, &journal)
                    .failing_on("bad")
                    .shared(),
            )
            .unwrap();
        let good = DeploymentContext::new("good");
        let bad = DeploymentContext::new("bad");
        let after = DeploymentContext::new("after");

        let report = deployers.process(&[good.clone(), bad.clone(), after.clone()], &[]);

        assert_eq!(report.deployed, ["good", "after"]);
        assert_eq!(report.failed, ["bad"]);
        assert_eq!(bad.state(), DeploymentState::Error);
        assert!(bad.problem().unwrap().to_string().contains("describe refused bad"));
        assert_eq!(
            deployers.deployment_stage(&bad).unwrap().name(),
            PARSE,
            "a failed unit stays at its last good stage"
        );
        assert_eq!(good.state(), DeploymentState::Deployed);
        assert_eq!(after.state(), DeploymentState::Deployed);
    }

    #[test]
    fn failure_in_stage_unwinds_earlier_deployers_of_that_stage() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(RecordingDeployer::new("first", REAL, &journal).shared())
            .unwrap();
        deployers
            .add_deployer(
                RecordingDeployer::new("second", REAL, &journal)
                    .failing_on("app")
                    .shared(),
            )
            .unwrap();
        let app = sample_tree();

        deployers.process(&[app.clone()], &[]);

        assert_eq!(
            journal.entries(),
            [
                "first deploy app",
                "first deploy app/comp",
                "first deploy c1",
                "first deploy c2",
                "first undeploy c2",
                "first undeploy c1",
                "first undeploy app/comp",
                "first undeploy app",
            ]
        );
        assert_eq!(app.state(), DeploymentState::Error);
        for child in app.children() {
            assert_eq!(child.state(), DeploymentState::Undeployed);
        }
    }

    #[test]
    fn duplicate_registration_fails_that_unit_only() {
        let deployers = pipeline();
        let first = sample_tree();
        deployers.process(&[first.clone()], &[]);

        let second = sample_tree();
        let report = deployers.process(&[second.clone()], &[]);

        assert_eq!(report.failed, ["app"]);
        assert_eq!(second.state(), DeploymentState::Error);
        assert!(second.problem().is_some());
        for child in second.children() {
            assert_eq!(child.state(), DeploymentState::Undeployed);
        }
        assert_eq!(first.state(), DeploymentState::Deployed);
    }

    #[test]
    fn statistics_time_each_deployer() {
        init_tracing();
        let deployers = Deployers::with_statistics(
            Arc::new(InMemoryController::new()),
            Some(Duration::from_secs(60)),
        );
        let journal = Journal::new();
        three_stage(&deployers, &journal);

        deployers.process(&[DeploymentContext::new("app")], &[]);

        let times = deployers.list_deployer_times(true);
        assert!(times.contains("<td>describe</td>"));
        assert!(times.contains("&nbsp;&nbsp;app"));
        assert_eq!(deployers.statistics().unwrap().totals().len(), 3);
    }

    #[test]
    fn times_are_unavailable_without_statistics() {
        let deployers = pipeline();
        assert_eq!(deployers.list_deployer_times(false), "No statistics available");
    }
}

mod undeploy {
    use super::*;

    #[test]
    fn stages_are_walked_in_reverse() {
        let deployers = pipeline();
        let journal = Journal::new();
        three_stage(&deployers, &journal);
        let app = DeploymentContext::new("app");
        deployers.process(&[app.clone()], &[]);
        journal.clear();

        let report = deployers.process(&[], &[app.clone()]);

        assert_eq!(report.undeployed, ["app"]);
        assert_eq!(
            journal.entries(),
            ["real undeploy app", "describe undeploy app", "parse undeploy app"]
        );
        assert_eq!(app.state(), DeploymentState::Undeployed);
        assert!(deployers.controller().context("app").is_none());
    }

    #[test]
    fn batch_is_undeployed_in_reverse_lockstep() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(RecordingDeployer::new("parse", PARSE, &journal).shared())
            .unwrap();
        deployers
            .add_deployer(RecordingDeployer::new("real", REAL, &journal).shared())
            .unwrap();
        let a = DeploymentContext::new("a");
        let b = DeploymentContext::new("b");
        deployers.process(&[a.clone(), b.clone()], &[]);
        journal.clear();

        deployers.process(&[], &[a, b]);

        assert_eq!(
            journal.entries(),
            [
                "real undeploy b",
                "real undeploy a",
                "parse undeploy b",
                "parse undeploy a",
            ]
        );
    }

    #[test]
    fn undeploy_faults_are_reported_not_raised() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(
                RecordingDeployer::new("real", REAL, &journal)
                    .failing_undeploy_on("c1")
                    .shared(),
            )
            .unwrap();
        deployers
            .add_deployer(RecordingDeployer::new("parse", PARSE, &journal).shared())
            .unwrap();
        let app = sample_tree();
        deployers.process(&[app.clone()], &[]);

        let report = deployers.process(&[], &[app.clone()]);

        assert!(!report.is_clean());
        let failures = report.undeploy_failures.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].deployer, "real");
        assert_eq!(failures[0].unit, "c1");
        assert!(journal.undeployed().contains(&"app".to_string()));
        assert_eq!(journal.undeployed().len(), 8);
        for node in app.depth_first() {
            assert_eq!(node.state(), DeploymentState::Undeployed);
        }
    }

    #[test]
    fn undeploy_releases_produced_attachments_only() {
        let deployers = pipeline();
        let app = sample_tree();
        app.predetermine_marker("descriptor");
        app.attach_marker("metadata");
        app.children()[0].attach_marker("metadata");
        deployers.process(&[app.clone()], &[]);

        deployers.process(&[], &[app.clone()]);

        assert_eq!(app.attachment_names(), ["descriptor"]);
        assert!(app.children()[0].attachment_names().is_empty());
    }

    #[test]
    fn redeployed_unit_still_satisfies_declared_inputs() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(
                RecordingDeployer::new("gated", REAL, &journal)
                    .with_input("descriptor")
                    .shared(),
            )
            .unwrap();
        let app = DeploymentContext::new("app");
        app.predetermine_marker("descriptor");

        deployers.process(&[app.clone()], &[]);
        deployers.process(&[], &[app.clone()]);
        journal.clear();
        deployers.process(&[app.clone()], &[]);

        assert_eq!(journal.deployed(), ["app"]);
        assert_eq!(app.state(), DeploymentState::Deployed);
    }

    #[test]
    fn redeploy_after_failure_forgets_the_old_fault() {
        let deployers = pipeline();
        let journal = Journal::new();
        let bad = RecordingDeployer::new("bad", REAL, &journal)
            .failing_on("app")
            .shared();
        deployers.add_deployer(bad.clone()).unwrap();
        let app = sample_tree();
        deployers.process(&[app.clone()], &[]);
        assert!(app.problem().is_some());

        deployers.process(&[], &[app.clone()]);
        assert!(deployers.remove_deployer(bad));
        let report = deployers.process(&[app.clone()], &[]);

        assert_eq!(report.deployed, ["app"]);
        for node in app.depth_first() {
            assert_eq!(node.state(), DeploymentState::Deployed);
            assert!(node.problem().is_none(), "{} kept a fault", node.name());
        }
    }

    #[test]
    fn errored_unit_is_still_unregistered() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(RecordingDeployer::new("parse", PARSE, &journal).shared())
            .unwrap();
        deployers
            .add_deployer(
                RecordingDeployer::new("real", REAL, &journal)
                    .failing_on("app")
                    .shared(),
            )
            .unwrap();
        let app = DeploymentContext::new("app");
        deployers.process(&[app.clone()], &[]);
        assert_eq!(app.state(), DeploymentState::Error);
        journal.clear();

        deployers.process(&[], &[app.clone()]);

        assert_eq!(journal.entries(), ["parse undeploy app"]);
        assert!(deployers.controller().context("app").is_none());
        assert_eq!(app.state(), DeploymentState::Undeployed);
    }
}

mod change {
    use super::*;

    #[test]
    fn unit_moves_back_and_forth() {
        let deployers = pipeline();
        let journal = Journal::new();
        three_stage(&deployers, &journal);
        let app = DeploymentContext::new("app");
        deployers.process(&[app.clone()], &[]);
        journal.clear();

        deployers
            .change(&app, &DeploymentStage::new(DESCRIBE))
            .unwrap();
        assert_eq!(journal.entries(), ["real undeploy app"]);
        assert_eq!(deployers.deployment_stage(&app).unwrap().name(), DESCRIBE);
        assert_eq!(app.state(), DeploymentState::Deploying);

        deployers
            .change(&app, &DeploymentStage::new(INSTALLED))
            .unwrap();
        assert_eq!(journal.entries(), ["real undeploy app", "real deploy app"]);
        assert_eq!(app.state(), DeploymentState::Deployed);
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let deployers = pipeline();
        let app = DeploymentContext::new("app");
        deployers.process(&[app.clone()], &[]);

        let err = deployers
            .change(&app, &DeploymentStage::new("Nowhere"))
            .unwrap_err();
        assert!(matches!(*err, DeploymentError::UnknownStage(ref s) if s == "Nowhere"));
    }

    #[test]
    fn unregistered_unit_is_rejected() {
        let deployers = pipeline();
        let err = deployers
            .change(&DeploymentContext::new("ghost"), &DeploymentStage::new(PARSE))
            .unwrap_err();
        assert!(matches!(*err, DeploymentError::NotFound(_)));
        assert!(deployers.deployment_stage(&DeploymentContext::new("ghost")).is_none());
    }

    #[test]
    fn failing_forward_change_returns_the_fault() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(
                RecordingDeployer::new("real", REAL, &journal)
                    .failing_on("app")
                    .shared(),
            )
            .unwrap();
        let app = DeploymentContext::new("app");
        deployers.process(&[app.clone()], &[]);

        let err = deployers
            .change(&app, &DeploymentStage::new(INSTALLED))
            .unwrap_err();
        assert!(err.to_string().contains("real refused app"));
    }
}

mod dependencies {
    use super::*;

    #[test]
    fn dependent_waits_then_completes_when_target_arrives() {
        let deployers = pipeline();
        let journal = Journal::new();
        three_stage(&deployers, &journal);
        let app = DeploymentContext::new("app");
        depends_on(&app, "lib");

        let report = deployers.process(&[app.clone()], &[]);
        assert_eq!(report.incomplete, ["app"]);
        assert_eq!(app.state(), DeploymentState::Deploying);
        assert_eq!(deployers.deployment_stage(&app).unwrap().name(), REAL);

        let err = deployers.check_complete(&[], &[]).unwrap_err();
        let missing = &err.report().contexts_missing_dependencies()["app"];
        let missing = missing.iter().next().unwrap();
        assert_eq!(missing.dependency, "lib");
        assert_eq!(missing.required_state, INSTALLED);
        assert!(missing.actual_state.starts_with("** NOT FOUND"));

        let lib = DeploymentContext::new("lib");
        let report = deployers.process(&[lib.clone()], &[]);
        assert_eq!(report.deployed, ["lib"]);
        assert_eq!(app.state(), DeploymentState::Deployed);
        assert!(deployers.check_complete(&[], &[]).is_ok());
    }

    #[test]
    fn batch_order_does_not_matter_for_dependencies() {
        let deployers = pipeline();
        let app = DeploymentContext::new("app");
        let lib = DeploymentContext::new("lib");
        depends_on(&app, "lib");

        let report = deployers.process(&[app.clone(), lib.clone()], &[]);

        assert_eq!(report.deployed, ["app", "lib"]);
        assert!(deployers.check_complete(&[], &[]).is_ok());
    }

    #[test]
    fn self_dependency_is_not_reported() {
        let deployers = pipeline();
        let app = DeploymentContext::new("app");
        depends_on(&app, "app");

        deployers.process(&[app.clone()], &[]);

        assert_eq!(app.state(), DeploymentState::Deploying);
        assert!(deployers.check_complete(&[], &[]).is_ok());
    }

    #[test]
    fn unnamed_dependency_reports_unresolved_sentinel() {
        let deployers = pipeline();
        let app = DeploymentContext::new("app");
        app.add_dependency(DependencyItem::unnamed(
            "app",
            "a datasource",
            ControllerState::new(INSTALLED),
        ));

        deployers.process(&[app.clone()], &[]);

        let err = deployers.check_complete(&[], &[]).unwrap_err();
        let missing = &err.report().contexts_missing_dependencies()["app"];
        let missing = missing.iter().next().unwrap();
        assert_eq!(missing.dependency, "<UNKNOWN app>");
        assert_eq!(missing.actual_state, "** UNRESOLVED a datasource **");
    }

    #[test]
    fn error_and_missing_dependency_land_in_one_report() {
        let deployers = pipeline();
        let journal = Journal::new();
        deployers
            .add_deployer(
                RecordingDeployer::new("describe", DESCRIBE, &journal)
                    .failing_on("broken")
                    .shared(),
            )
            .unwrap();
        let broken = DeploymentContext::new("broken");
        let waiting = DeploymentContext::new("waiting");
        depends_on(&waiting, "absent");

        deployers.process(&[broken.clone(), waiting.clone()], &[]);
        let err = deployers.check_complete(&[broken.clone()], &[]).unwrap_err();
        let report = err.report();

        assert_eq!(report.deployments_in_error()["broken"], "describe refused broken");
        assert_eq!(report.contexts_in_error()["broken"], "describe refused broken");
        assert!(report.contexts_missing_dependencies().contains_key("waiting"));
        assert!(err.to_string().contains("*** CONTEXTS MISSING DEPENDENCIES"));
    }

    #[test]
    fn tree_check_follows_named_controller_contexts() {
        let deployers = pipeline();
        let app = DeploymentContext::new("app");
        let lib = DeploymentContext::new("lib");
        depends_on(&lib, "absent");
        app.add_controller_name("lib");

        deployers.process(&[app.clone(), lib], &[]);

        assert!(deployers.check_complete_contexts(&[]).is_ok());
        let err = deployers.check_complete_contexts(&[app]).unwrap_err();
        assert_eq!(
            err.report()
                .contexts_missing_dependencies()
                .keys()
                .collect::<Vec<_>>(),
            ["lib"]
        );
    }
}

#[test]
fn dropped_pipeline_fails_later_moves() {
    init_tracing();
    let controller = Arc::new(InMemoryController::new());
    let app = DeploymentContext::new("app");
    {
        let deployers = Deployers::new(controller.clone());
        deployers.process(&[app.clone()], &[]);
        deployers
            .change(&app, &DeploymentStage::new(DESCRIBE))
            .unwrap();
    }

    let err = controller
        .change("app", &ControllerState::new(INSTALLED))
        .unwrap_err();
    assert!(matches!(
        err.deployment_error().map(|e| e.as_ref()),
        Some(DeploymentError::Shutdown(_))
    ));
    assert_eq!(app.state(), DeploymentState::Error);
}
