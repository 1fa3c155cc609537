use std::sync::Arc;

use remote_runner::command::{CommandLoader, CommandResult, ModuleRegistry, TransactionMode};
use remote_runner::dispatch::{
    Dispatcher, HostAddin, ItemState, Notifier, RemoteRunnerAddin, NOTIFY_TITLE,
};
use remote_runner::errors::RunnerError;
use remote_runner::fs::mock::MockFileSystem;
use remote_runner::host::HostApplication;
use remote_runner::store::{DropZone, QueueItem};
use remote_runner_test_utils::fakes::{
    RecordingDocument, RecordingNotifier, RunLog, Script, ScriptedCommand, TxEvent,
};
use remote_runner_test_utils::{init_tracing, mock_drop_zone, SPOOL};

const MODULE: &str = "/modules/exports.toml";

struct Fixture {
    zone: DropZone,
    log: RunLog,
    notifier: RecordingNotifier,
    dispatcher: Arc<Dispatcher>,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        let (_fs, zone) = mock_drop_zone();
        let log = RunLog::new();
        let registry = ModuleRegistry::new()
            .with_type(MODULE, ScriptedCommand::entry("Exports.Ok", None, Script::Succeed, &log))
            .with_type(
                MODULE,
                ScriptedCommand::entry(
                    "Exports.AutoOk",
                    Some(TransactionMode::Automatic),
                    Script::Succeed,
                    &log,
                ),
            )
            .with_type(
                MODULE,
                ScriptedCommand::entry(
                    "Exports.AutoCancel",
                    Some(TransactionMode::Automatic),
                    Script::Cancel,
                    &log,
                ),
            )
            .with_type(MODULE, ScriptedCommand::entry("Exports.Fail", None, Script::Fail, &log))
            .with_type(
                MODULE,
                ScriptedCommand::entry(
                    "Exports.AutoPanic",
                    Some(TransactionMode::Automatic),
                    Script::Panic,
                    &log,
                ),
            );
        let loader = CommandLoader::new().with_source(registry);
        let notifier = RecordingNotifier::new();
        let shared: Arc<dyn Notifier> = Arc::new(notifier.clone());
        let dispatcher = Arc::new(Dispatcher::new(zone.clone(), loader, shared));
        Self {
            zone,
            log,
            notifier,
            dispatcher,
        }
    }

    fn queue(&self, target: &str, type_name: &str) -> QueueItem {
        let item = self.zone.create_item(target, MODULE, type_name);
        self.zone.persist(&item).unwrap();
        item
    }

    fn pending(&self) -> Vec<String> {
        self.zone
            .scan_all()
            .unwrap()
            .into_iter()
            .map(|i| i.type_name().to_string())
            .collect()
    }
}

#[test]
fn only_jobs_for_the_opened_document_run() {
    let fx = Fixture::new();
    fx.queue("/docs/Doc1.doc", "Ok");
    fx.queue("/docs/Doc2.doc", "AutoOk");
    fx.queue("/docs/DOC1.DOC", "AutoOk");

    let mut doc1 = RecordingDocument::new("/docs/doc1.doc");
    let report = fx.dispatcher.on_document_opened(&mut doc1);

    assert_eq!(report.document, "/docs/doc1.doc");
    assert_eq!(report.completed().count(), 2);
    assert_eq!(report.failed().count(), 0);
    assert_eq!(fx.log.type_names(), vec!["Exports.Ok", "Exports.AutoOk"]);
    assert_eq!(fx.pending(), vec!["AutoOk"]);
    assert_eq!(
        fx.zone.scan_all().unwrap()[0].target_resource(),
        "/docs/Doc2.doc"
    );

    let mut doc2 = RecordingDocument::new("/docs/Doc2.doc");
    let report = fx.dispatcher.on_document_opened(&mut doc2);
    assert_eq!(report.completed().count(), 1);
    assert!(fx.pending().is_empty());
    assert!(fx.notifier.messages().is_empty());
}

#[test]
fn failed_job_stays_queued_and_is_reported() {
    let fx = Fixture::new();
    let item = fx.queue("/docs/a.doc", "Fail");

    let mut doc = RecordingDocument::new("/docs/a.doc");
    let report = fx.dispatcher.on_document_opened(&mut doc);

    assert_eq!(report.items.len(), 1);
    let entry = &report.items[0];
    assert_eq!(entry.id, item.id());
    assert_eq!(entry.state, ItemState::Failed);
    assert_eq!(entry.result, Some(CommandResult::Failed));
    assert!(!fx.zone.is_complete(&item));

    let messages = fx.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, NOTIFY_TITLE);
    assert!(messages[0].1.contains("Exports.Fail"), "{}", messages[0].1);

    // Retried on the next event.
    fx.dispatcher.on_document_opened(&mut doc);
    assert_eq!(fx.log.type_names(), vec!["Exports.Fail", "Exports.Fail"]);
}

#[test]
fn each_job_is_isolated_from_the_others() {
    let fx = Fixture::new();
    fx.queue("/docs/a.doc", "Fail");
    fx.queue("/docs/a.doc", "Ok");
    fx.queue("/docs/a.doc", "DoesNotExist");
    fx.queue("/docs/a.doc", "AutoPanic");
    fx.queue("/docs/a.doc", "AutoCancel");

    let mut doc = RecordingDocument::new("/docs/a.doc");
    let report = fx.dispatcher.on_document_opened(&mut doc);

    let states: Vec<ItemState> = report.items.iter().map(|i| i.state).collect();
    assert_eq!(
        states,
        vec![
            ItemState::Failed,
            ItemState::Completed,
            ItemState::Failed,
            ItemState::Failed,
            ItemState::Completed,
        ]
    );
    assert_eq!(
        fx.log.type_names(),
        vec![
            "Exports.Fail",
            "Exports.Ok",
            "Exports.AutoPanic",
            "Exports.AutoCancel"
        ]
    );
    assert_eq!(fx.pending(), vec!["Fail", "DoesNotExist", "AutoPanic"]);
    assert_eq!(fx.notifier.messages().len(), 3);
}

#[test]
fn cancelled_job_is_rolled_back_and_not_retried() {
    let fx = Fixture::new();
    let item = fx.queue("/docs/a.doc", "AutoCancel");

    let mut doc = RecordingDocument::new("/docs/a.doc");
    let report = fx.dispatcher.on_document_opened(&mut doc);

    assert_eq!(report.items[0].state, ItemState::Completed);
    assert_eq!(report.items[0].result, Some(CommandResult::Cancelled));
    assert!(fx.zone.is_complete(&item));
    assert_eq!(
        doc.journal(),
        vec![TxEvent::Begin("Remote Runner".to_string()), TxEvent::Rollback]
    );
}

#[test]
fn panicking_job_is_contained_and_rolled_back() {
    let fx = Fixture::new();
    let item = fx.queue("/docs/a.doc", "AutoPanic");

    let mut doc = RecordingDocument::new("/docs/a.doc");
    let err = fx.dispatcher.process_item(&item, &mut doc).unwrap_err();

    match err {
        RunnerError::Execution { type_name, message } => {
            assert_eq!(type_name, "Exports.AutoPanic");
            assert!(message.contains("blew up"), "{message}");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert!(!fx.zone.is_complete(&item));
    assert_eq!(
        doc.journal(),
        vec![TxEvent::Begin("Remote Runner".to_string()), TxEvent::Rollback]
    );
}

#[test]
fn job_arguments_reach_the_work_unit() {
    let fx = Fixture::new();
    let mut item = fx.zone.create_item("/docs/a.doc", MODULE, "Exports.Ok");
    item.add_argument("--sheet");
    item.add_argument("A101");
    fx.zone.persist(&item).unwrap();

    let mut doc = RecordingDocument::new("/docs/a.doc");
    fx.dispatcher.on_document_opened(&mut doc);

    let runs = fx.log.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].args, vec!["--sheet", "A101"]);
    assert_eq!(runs[0].document, "/docs/a.doc");
}

#[test]
fn unreadable_drop_zone_is_reported_not_raised() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(SPOOL, "not a directory");
    let zone = DropZone::new(SPOOL, Arc::new(fs));
    let notifier = RecordingNotifier::new();
    let dispatcher = Dispatcher::new(zone, CommandLoader::new(), Arc::new(notifier.clone()));

    let mut doc = RecordingDocument::new("/docs/a.doc");
    let report = dispatcher.on_document_opened(&mut doc);

    assert!(report.scan_error.is_some());
    assert!(report.items.is_empty());
    assert_eq!(notifier.messages().len(), 1);
}

#[test]
fn addin_subscribes_on_startup_and_unsubscribes_on_shutdown() {
    let fx = Fixture::new();
    fx.queue("/docs/a.doc", "Ok");

    let mut app = HostApplication::new();
    let shared: Arc<dyn Notifier> = Arc::new(fx.notifier.clone());
    let mut addin = RemoteRunnerAddin::new(Arc::clone(&fx.dispatcher), shared);

    addin.on_startup(&mut app).unwrap();
    assert!(addin.is_subscribed());
    assert_eq!(app.subscriber_count(), 1);

    // A second startup does not double-subscribe.
    addin.on_startup(&mut app).unwrap();
    assert_eq!(app.subscriber_count(), 1);

    let mut doc = RecordingDocument::new("/docs/A.doc");
    assert_eq!(app.open_document(&mut doc), 1);
    assert!(fx.pending().is_empty());

    addin.on_shutdown(&mut app).unwrap();
    assert!(!addin.is_subscribed());
    assert_eq!(app.subscriber_count(), 0);

    fx.queue("/docs/a.doc", "Ok");
    assert_eq!(app.open_document(&mut doc), 0);
    assert_eq!(fx.pending(), vec!["Ok"]);
    assert_eq!(fx.log.type_names(), vec!["Exports.Ok"]);
}
