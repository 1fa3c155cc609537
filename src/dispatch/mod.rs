// src/dispatch/mod.rs

//! Consumer side: runs queued jobs inside the host process.
//!
//! On every "document opened" event the [`Dispatcher`] scans the drop zone,
//! keeps the items targeting the opened document, and for each one (in
//! drop-zone order, one at a time) resolves the work unit, runs it under its
//! transaction policy and deletes the descriptor on completion.
//!
//! Per item the states are `Pending -> Loading -> Executing -> Completed`,
//! or `Failed` from any step. A failed item stays in the drop zone and is
//! retried on the next event; so does an item whose host crashed mid-run.
//! Delivery is therefore at-least-once.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::command::{
    determine_policy, run_in_transaction, CommandLoader, CommandResult, Document,
};
use crate::errors::{Result, RunnerError};
use crate::store::{DropZone, QueueItem};

pub mod addin;
pub mod host;

pub use addin::RemoteRunnerAddin;
pub use host::{ControlledApplication, DocumentOpenedHandler, HostAddin, Notifier, SubscriptionId};

/// Title used for every notification raised by the dispatcher.
pub const NOTIFY_TITLE: &str = "Remote Runner";

/// Where an item is in its processing for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Loading,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::Pending => "pending",
            ItemState::Loading => "loading",
            ItemState::Executing => "executing",
            ItemState::Completed => "completed",
            ItemState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Final state of one matched item.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub id: Uuid,
    pub type_name: String,
    pub state: ItemState,
    pub result: Option<CommandResult>,
    pub error: Option<String>,
}

/// What one "document opened" event did.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub document: String,
    pub items: Vec<ItemReport>,
    pub scan_error: Option<String>,
}

impl DispatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.state == ItemState::Completed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.state == ItemState::Failed)
    }
}

/// Runs queued jobs for documents as the host opens them.
#[derive(Debug)]
pub struct Dispatcher {
    drop_zone: DropZone,
    loader: CommandLoader,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(drop_zone: DropZone, loader: CommandLoader, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            drop_zone,
            loader,
            notifier,
        }
    }

    pub fn drop_zone(&self) -> &DropZone {
        &self.drop_zone
    }

    /// Handle one "document opened" event.
    ///
    /// Never fails: scan errors and per-item errors are reported through the
    /// notifier and recorded in the returned report.
    pub fn on_document_opened(&self, document: &mut dyn Document) -> DispatchReport {
        let mut report = DispatchReport {
            document: document.path_name().to_string(),
            ..Default::default()
        };

        let items = match self.drop_zone.scan_all() {
            Ok(items) => items,
            Err(err) => {
                error!(error = %err, "failed to scan drop zone");
                self.notifier.show_error(NOTIFY_TITLE, &err.to_string());
                report.scan_error = Some(err.to_string());
                return report;
            }
        };

        let matched: Vec<QueueItem> = items
            .into_iter()
            .filter(|item| item.is_applicable_to(document.path_name()))
            .collect();

        if matched.is_empty() {
            debug!(document = %report.document, "no queued jobs for document");
            return report;
        }

        info!(
            document = %report.document,
            count = matched.len(),
            "processing queued jobs for document"
        );

        for item in &matched {
            report.items.push(self.dispatch_one(item, document));
        }

        report
    }

    fn dispatch_one(&self, item: &QueueItem, document: &mut dyn Document) -> ItemReport {
        debug!(item_id = %item.id(), state = %ItemState::Pending, "queue item matched");

        match self.process_item(item, document) {
            Ok(result) => ItemReport {
                id: item.id(),
                type_name: item.type_name().to_string(),
                state: ItemState::Completed,
                result: Some(result),
                error: None,
            },
            Err(err) => {
                error!(
                    item_id = %item.id(),
                    type_name = %item.type_name(),
                    state = %ItemState::Failed,
                    error = %err,
                    "queue item failed; leaving it pending"
                );
                self.notifier.show_error(NOTIFY_TITLE, &err.to_string());
                ItemReport {
                    id: item.id(),
                    type_name: item.type_name().to_string(),
                    state: ItemState::Failed,
                    result: matches!(err, RunnerError::Execution { .. })
                        .then_some(CommandResult::Failed),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Load, run and complete a single item.
    ///
    /// `Succeeded` and `Cancelled` delete the descriptor; `Failed` (or a
    /// panic) leaves it in place and comes back as `RunnerError::Execution`.
    pub fn process_item(
        &self,
        item: &QueueItem,
        document: &mut dyn Document,
    ) -> Result<CommandResult> {
        debug!(
            item_id = %item.id(),
            module = %item.module_path(),
            type_name = %item.type_name(),
            state = %ItemState::Loading,
            "resolving work unit"
        );
        let resolved = self.loader.resolve(item.module_path(), item.type_name())?;
        let mut command = self.loader.instantiate(&resolved)?;
        let policy = determine_policy(&resolved);
        let type_name = resolved.full_name().to_string();

        info!(
            item_id = %item.id(),
            type_name = %type_name,
            ?policy,
            state = %ItemState::Executing,
            "running work unit"
        );

        let args = item.args();
        let result = run_in_transaction(policy, document, |doc| {
            panic::catch_unwind(AssertUnwindSafe(|| command.run_remotely(doc, args))).map_err(
                |payload| RunnerError::Execution {
                    type_name: type_name.clone(),
                    message: format!("work unit panicked: {}", panic_message(payload.as_ref())),
                },
            )
        })?;

        match result {
            CommandResult::Failed => Err(RunnerError::Execution {
                type_name,
                message: "work unit reported failure".to_string(),
            }),
            CommandResult::Cancelled | CommandResult::Succeeded => {
                if result == CommandResult::Cancelled {
                    warn!(item_id = %item.id(), type_name = %type_name, "work unit cancelled");
                }
                self.drop_zone.mark_complete(item)?;
                info!(
                    item_id = %item.id(),
                    %result,
                    state = %ItemState::Completed,
                    "queue item done"
                );
                Ok(result)
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
