mod common;

use common::{FakeInspector, RecordingRunner};
use hostconverge::{
    converge_services, Reporter, ServiceAction, ServiceEnsure, ServiceError, ServiceOptions,
    ServiceSpec,
};

fn spec(name: &str, enabled: Option<bool>, ensure: Option<ServiceEnsure>) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        enabled,
        ensure,
    }
}

#[tokio::test]
async fn test_reload_issued_even_without_services() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new();
    let mut reporter = Reporter::buffered();

    let actions = converge_services(&[], &inspector, &runner, ServiceOptions::default(), &mut reporter)
        .await
        .expect("Should converge");

    assert!(actions.is_empty());
    assert_eq!(runner.calls(), vec!["systemctl daemon-reload"]);
    assert!(runner.invocations()[0].privileged);
}

#[tokio::test]
async fn test_missing_unit_aborts_before_later_services() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("cron", false, false);
    let mut reporter = Reporter::buffered();

    let specs = vec![
        spec("typo", Some(true), Some(ServiceEnsure::Running)),
        spec("cron", Some(true), Some(ServiceEnsure::Running)),
    ];
    let result =
        converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
            .await;

    assert!(matches!(result, Err(ServiceError::NotFound(ref name)) if name == "typo"));
    assert_eq!(runner.calls(), vec!["systemctl daemon-reload"]);
    assert!(reporter.lines().iter().any(|l| l.contains("typo does not exist")));
}

#[tokio::test]
async fn test_running_and_active_restarts_once_after_report() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("nginx", true, true);
    let mut reporter = Reporter::buffered();

    let specs = vec![spec("nginx", None, Some(ServiceEnsure::Running))];
    let actions =
        converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
            .await
            .expect("Should converge");

    assert_eq!(actions, vec![("nginx".to_string(), ServiceAction::Restart)]);
    assert_eq!(
        runner.calls(),
        vec!["systemctl daemon-reload", "systemctl restart nginx"]
    );
    assert_eq!(reporter.lines(), &["├─ restarting service nginx".to_string()]);
}

#[tokio::test]
async fn test_no_restart_leaves_active_service_alone() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("nginx", true, true);
    let mut reporter = Reporter::buffered();

    let specs = vec![spec("nginx", Some(true), Some(ServiceEnsure::Running))];
    let options = ServiceOptions { no_restart: true };
    let actions = converge_services(&specs, &inspector, &runner, options, &mut reporter)
        .await
        .expect("Should converge");

    assert!(actions.is_empty());
    assert_eq!(runner.calls(), vec!["systemctl daemon-reload"]);
    assert!(reporter.lines().is_empty());
}

#[tokio::test]
async fn test_inactive_running_service_is_started() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("nginx", false, true);
    let mut reporter = Reporter::buffered();

    let specs = vec![spec("nginx", None, Some(ServiceEnsure::Running))];
    let actions =
        converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
            .await
            .expect("Should converge");

    assert_eq!(actions, vec![("nginx".to_string(), ServiceAction::Start)]);
    assert_eq!(runner.mutations()[1], "systemctl start nginx");
    assert_eq!(reporter.lines(), &["├─ starting service nginx".to_string()]);
}

#[tokio::test]
async fn test_active_stopped_service_is_stopped() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("cups", true, false);
    let mut reporter = Reporter::buffered();

    let specs = vec![spec("cups", None, Some(ServiceEnsure::Stopped))];
    let actions =
        converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
            .await
            .expect("Should converge");

    assert_eq!(actions, vec![("cups".to_string(), ServiceAction::Stop)]);
}

#[tokio::test]
async fn test_inactive_stopped_service_is_left_alone() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("cups", false, false);
    let mut reporter = Reporter::buffered();

    let specs = vec![spec("cups", None, Some(ServiceEnsure::Stopped))];
    let actions =
        converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
            .await
            .expect("Should converge");

    assert!(actions.is_empty());
}

#[tokio::test]
async fn test_enablement_reconciled_independently_of_activity() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new()
        .unit("ssh", false, false)
        .unit("bluetooth", false, true)
        .unit("cron", false, true);
    let mut reporter = Reporter::buffered();

    let specs = vec![
        spec("ssh", Some(true), None),
        spec("bluetooth", Some(false), None),
        spec("cron", None, None),
    ];
    let actions =
        converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
            .await
            .expect("Should converge");

    assert_eq!(
        actions,
        vec![
            ("ssh".to_string(), ServiceAction::Enable),
            ("bluetooth".to_string(), ServiceAction::Disable),
        ]
    );
    assert_eq!(
        runner.calls(),
        vec![
            "systemctl daemon-reload",
            "systemctl enable ssh",
            "systemctl disable bluetooth",
        ]
    );
    assert_eq!(
        reporter.lines(),
        &[
            "├─ enabled service ssh".to_string(),
            "├─ disabled service bluetooth".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_enable_and_start_together() {
    let runner = RecordingRunner::new();
    let inspector = FakeInspector::new().unit("nginx", false, false);
    let mut reporter = Reporter::buffered();

    let specs = vec![spec("nginx", Some(true), Some(ServiceEnsure::Running))];
    converge_services(&specs, &inspector, &runner, ServiceOptions::default(), &mut reporter)
        .await
        .expect("Should converge");

    assert_eq!(
        runner.calls(),
        vec![
            "systemctl daemon-reload",
            "systemctl enable nginx",
            "systemctl start nginx",
        ]
    );
}
