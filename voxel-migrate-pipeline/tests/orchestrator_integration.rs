mod common;

use common::MockLauncher;
use std::fs;
use std::sync::Arc;
use voxel_migrate_pipeline::errors::OrchestratorError;
use voxel_migrate_pipeline::orchestrator::{
    MigrationPlan, Orchestrator, OrchestratorConfig, RUN_REPORT_FILE,
};

#[tokio::test]
async fn test_first_failure_stops_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let launched = Arc::default();
    let launcher = MockLauncher {
        fail_at: Some("invoices"),
        launched: Arc::clone(&launched),
    };
    let orchestrator = Orchestrator::with_config(
        MigrationPlan::full(),
        Box::new(launcher),
        OrchestratorConfig {
            report_dir: Some(dir.path().to_path_buf()),
        },
    );

    let result = orchestrator.run().await;

    assert!(matches!(
        result,
        Err(OrchestratorError::StepFailed {
            step: "invoices",
            code: Some(1)
        })
    ));
    let launched = launched.lock().unwrap().clone();
    assert_eq!(launched.len(), 6);
    assert_eq!(launched.last(), Some(&"invoices"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(RUN_REPORT_FILE)).unwrap())
            .unwrap();
    assert_eq!(report["state"], "failed");
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 13);
    assert_eq!(steps[4]["state"], "succeeded");
    assert_eq!(steps[5]["state"], "failed");
    assert_eq!(steps[5]["exit_code"], 1);
    assert!(steps[6..].iter().all(|step| step["state"] == "not_started"));
}

#[tokio::test]
async fn test_all_steps_run_in_order() {
    let launcher = MockLauncher::default();
    let launched = Arc::clone(&launcher.launched);

    let report = Orchestrator::new(Box::new(launcher)).run().await.unwrap();

    assert_eq!(report.succeeded(), 13);
    let launched = launched.lock().unwrap().clone();
    let planned: Vec<&str> = MigrationPlan::full().steps().iter().map(|step| step.name).collect();
    assert_eq!(launched, planned);
    assert_eq!(launched.first(), Some(&"users"));
    assert_eq!(launched.last(), Some(&"case-services"));
}
