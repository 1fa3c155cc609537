use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use remote_runner::boot::{BootRequest, Orchestrator};
use remote_runner::cli::BootArgs;
use remote_runner::command::{CommandLoader, ModuleRegistry};
use remote_runner::dispatch::{Dispatcher, Notifier};
use remote_runner::errors::RunnerError;
use remote_runner::fs::FileSystem;
use remote_runner_test_utils::builders::{BootRequestBuilder, ConfigFileBuilder};
use remote_runner_test_utils::fakes::{
    FakeBehaviour, FakeLauncher, RecordingDocument, RecordingNotifier, RunLog, Script,
    ScriptedCommand,
};
use remote_runner_test_utils::{init_tracing, mock_drop_zone, SPOOL};
use tokio::time::{sleep, Instant};

const TARGET: &str = "/docs/tower.doc";
const MODULE: &str = "/modules/exports.toml";

fn request() -> BootRequest {
    BootRequestBuilder::new(TARGET, MODULE, "SheetExport")
        .arg("--sheets")
        .arg("A101")
        .build()
}

/// Paused-clock timers may land on the next millisecond tick.
fn assert_elapsed(start: Instant, secs: u64) {
    let elapsed = start.elapsed();
    let expected = Duration::from_secs(secs);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {elapsed:?}, expected about {expected:?}"
    );
}

fn config() -> ConfigFileBuilder {
    ConfigFileBuilder::new(SPOOL)
        .poll_interval("5s")
        .max_polls(100)
        .shutdown_grace("10s")
        .materialize_timeout("60s")
        .host("remote-host", &["{target}"])
}

#[test]
fn fewer_than_four_positionals_is_a_usage_error() {
    let args: Vec<String> = ["server://a", "/docs/a.doc", "m.toml"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert!(matches!(
        BootRequest::from_positional(&args),
        Err(RunnerError::Usage(_))
    ));
    assert!(matches!(
        BootRequest::from_positional(&[]),
        Err(RunnerError::Usage(_))
    ));
}

#[test]
fn positionals_after_the_fourth_are_job_arguments() {
    let positional = BootRequestBuilder::new(TARGET, MODULE, "SheetExport")
        .arg("-x")
        .arg("two words")
        .positional();
    let request = BootRequest::from_positional(&positional).unwrap();

    assert_eq!(request.source, format!("server://{TARGET}"));
    assert_eq!(request.target, TARGET);
    assert_eq!(request.module_path, MODULE);
    assert_eq!(request.type_name, "SheetExport");
    assert_eq!(request.extra_args, vec!["-x", "two words"]);
}

#[tokio::test]
async fn usage_error_is_raised_before_config_is_read() {
    let args = BootArgs {
        config: Some("/definitely/not/here.toml".to_string()),
        log_level: None,
        dry_run: false,
        job: vec!["only".to_string(), "three".to_string(), "args".to_string()],
    };

    let err = remote_runner::run(args).await.unwrap_err();
    assert!(
        matches!(err.downcast_ref::<RunnerError>(), Some(RunnerError::Usage(_))),
        "{err:?}"
    );
}

#[tokio::test]
async fn dry_run_validates_without_side_effects() {
    let config = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/RemoteRunner.toml");
    let args = BootArgs {
        config: Some(config.display().to_string()),
        log_level: None,
        dry_run: true,
        job: BootRequestBuilder::new("/definitely/not/here.doc", MODULE, "SheetExport").positional(),
    };

    remote_runner::run(args).await.unwrap();
}

#[test]
fn prepare_writes_nothing() {
    let (fs, _zone) = mock_drop_zone();
    let orchestrator = Orchestrator::new(&config().build(), Arc::new(fs.clone()), FakeLauncher::new());

    let item = orchestrator.prepare(&request());
    assert_eq!(item.target_resource(), TARGET);
    assert_eq!(item.args(), ["--sheets", "A101"]);
    assert!(fs.list(SPOOL).is_empty());
}

#[tokio::test(start_paused = true)]
async fn completes_on_the_first_poll_after_the_descriptor_disappears() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();
    let launcher = FakeLauncher::new().with_program(
        "remote-host",
        FakeBehaviour::ExitAfter {
            after: Duration::from_secs(1),
            code: 0,
        },
    );
    let mut orchestrator = Orchestrator::new(&config().build(), Arc::new(fs), launcher.clone());

    let consumer = zone.clone();
    let simulated_dispatcher = tokio::spawn(async move {
        sleep(Duration::from_secs(12)).await;
        for item in consumer.scan_all().unwrap() {
            consumer.mark_complete(&item).unwrap();
        }
    });

    let start = Instant::now();
    let outcome = orchestrator.run(&request()).await.unwrap();
    simulated_dispatcher.await.unwrap();

    // Checks at t=0, 5, 10 see the descriptor; the check at t=15 does not.
    assert_eq!(outcome.polls, 3);
    assert_elapsed(start, 16);
    assert!(zone.scan_all().unwrap().is_empty());
    assert_eq!(launcher.launched_programs(), vec!["remote-host"]);
    assert!(launcher.kills().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeout_kills_the_host_and_leaves_the_job_queued() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();
    let launcher = FakeLauncher::new().with_program("remote-host", FakeBehaviour::Hang);
    let config = config().max_polls(3).build();
    let mut orchestrator = Orchestrator::new(&config, Arc::new(fs), launcher.clone());

    let start = Instant::now();
    let err = orchestrator.run(&request()).await.unwrap_err();

    match err {
        RunnerError::Timeout { after, .. } => assert_eq!(after, Duration::from_secs(15)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_elapsed(start, 15);
    assert_eq!(launcher.kills(), vec!["remote-host"]);

    let queued = zone.scan_all().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].type_name(), "SheetExport");
}

#[tokio::test(start_paused = true)]
async fn host_that_outlives_the_grace_period_is_killed() {
    let (fs, zone) = mock_drop_zone();
    let launcher = FakeLauncher::new().with_program("remote-host", FakeBehaviour::Hang);
    let mut orchestrator = Orchestrator::new(&config().build(), Arc::new(fs), launcher.clone());

    let consumer = zone.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(2)).await;
        for item in consumer.scan_all().unwrap() {
            consumer.mark_complete(&item).unwrap();
        }
    });

    let start = Instant::now();
    let outcome = orchestrator.run(&request()).await.unwrap();

    assert_eq!(outcome.polls, 1);
    assert_elapsed(start, 15);
    assert_eq!(launcher.kills(), vec!["remote-host"]);
}

#[tokio::test(start_paused = true)]
async fn materialize_timeout_kills_the_tool_and_never_launches_the_host() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();
    let launcher = FakeLauncher::new()
        .with_program("server-tool", FakeBehaviour::Hang)
        .with_program("remote-host", FakeBehaviour::ExitWith(0));
    let config = config()
        .materialize("server-tool", &["createLocal", "{source}", "-d", "{target}"])
        .build();
    let mut orchestrator = Orchestrator::new(&config, Arc::new(fs), launcher.clone());

    let start = Instant::now();
    let err = orchestrator.run(&request()).await.unwrap_err();

    match err {
        RunnerError::Timeout { what, after } => {
            assert_eq!(what, "materialization");
            assert_eq!(after, Duration::from_secs(60));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_elapsed(start, 60);
    assert_eq!(launcher.launched_programs(), vec!["server-tool"]);
    assert_eq!(launcher.kills(), vec!["server-tool"]);
    assert_eq!(
        launcher.launches()[0].args,
        vec!["createLocal", "server:///docs/tower.doc", "-d", TARGET]
    );
    assert_eq!(zone.scan_all().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_materialize_tool_stops_the_run() {
    let (fs, _zone) = mock_drop_zone();
    let launcher = FakeLauncher::new().with_program("server-tool", FakeBehaviour::ExitWith(3));
    let config = config().materialize("server-tool", &["{source}"]).build();
    let mut orchestrator = Orchestrator::new(&config, Arc::new(fs), launcher.clone());

    let err = orchestrator.run(&request()).await.unwrap_err();
    assert!(matches!(err, RunnerError::Materialize(_)), "{err:?}");
    assert_eq!(launcher.launched_programs(), vec!["server-tool"]);
}

#[tokio::test(start_paused = true)]
async fn materialization_runs_only_when_the_target_is_missing() {
    let (fs, zone) = mock_drop_zone();
    fs.add_file(TARGET, "already here");
    let launcher = FakeLauncher::new()
        .with_program("server-tool", FakeBehaviour::ExitWith(0))
        .with_program("remote-host", FakeBehaviour::ExitWith(0));
    let config = config().materialize("server-tool", &["{source}"]).build();
    let mut orchestrator = Orchestrator::new(&config, Arc::new(fs), launcher.clone());

    let consumer = zone.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        for item in consumer.scan_all().unwrap() {
            consumer.mark_complete(&item).unwrap();
        }
    });

    orchestrator.run(&request()).await.unwrap();
    assert_eq!(launcher.launched_programs(), vec!["remote-host"]);
}

#[tokio::test(start_paused = true)]
async fn host_launch_failure_is_reported() {
    let (fs, zone) = mock_drop_zone();
    let launcher = FakeLauncher::new().with_program("remote-host", FakeBehaviour::FailToStart);
    let mut orchestrator = Orchestrator::new(&config().build(), Arc::new(fs), launcher.clone());

    let err = orchestrator.run(&request()).await.unwrap_err();
    assert!(err.to_string().contains("remote-host"), "{err}");
    assert!(launcher.launches().is_empty());
    // The descriptor was already published; it stays for a later host run.
    assert_eq!(zone.scan_all().unwrap().len(), 1);
}

#[test]
fn host_command_line_expands_placeholders() {
    let (fs, _zone) = mock_drop_zone();
    let config = config()
        .host(
            "remote-host",
            &["--doc", "{target}", "--from", "{source}", "--dir", "{target_dir}"],
        )
        .build();
    let orchestrator = Orchestrator::new(&config, Arc::new(fs), FakeLauncher::new());

    let spec = orchestrator.host_spec(&request());
    assert_eq!(
        spec.args,
        vec![
            "--doc",
            TARGET,
            "--from",
            "server:///docs/tower.doc",
            "--dir",
            "/docs"
        ]
    );
    assert_eq!(spec.working_dir, Some(PathBuf::from("/docs")));
}

#[tokio::test(start_paused = true)]
async fn job_flows_from_orchestrator_to_dispatcher() {
    init_tracing();
    let (fs, zone) = mock_drop_zone();
    let shared_fs: Arc<dyn FileSystem> = Arc::new(fs);

    let log = RunLog::new();
    let loader = CommandLoader::new().with_source(ModuleRegistry::new().with_type(
        MODULE,
        ScriptedCommand::entry("Exports.Sheets.SheetExport", None, Script::Succeed, &log),
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
    let dispatcher = Dispatcher::new(zone.clone(), loader, notifier);

    let launcher = FakeLauncher::new().with_program("remote-host", FakeBehaviour::ExitWith(0));
    let mut orchestrator = Orchestrator::new(&config().build(), shared_fs, launcher.clone());

    // Stands in for the host: once launched, it opens the target document.
    let host_view = launcher.clone();
    let host = tokio::spawn(async move {
        while host_view.launches().is_empty() {
            sleep(Duration::from_millis(100)).await;
        }
        let mut document = RecordingDocument::new("/DOCS/Tower.doc");
        dispatcher.on_document_opened(&mut document)
    });

    let outcome = orchestrator.run(&request()).await.unwrap();
    let report = host.await.unwrap();

    assert_eq!(outcome.polls, 1);
    assert_eq!(report.completed().count(), 1);
    assert_eq!(report.items[0].id, outcome.item_id);
    assert!(zone.scan_all().unwrap().is_empty());

    let runs = log.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].args, vec!["--sheets", "A101"]);
}
