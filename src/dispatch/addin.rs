// src/dispatch/addin.rs

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::command::Document;
use crate::dispatch::host::{ControlledApplication, HostAddin, Notifier, SubscriptionId};
use crate::dispatch::{panic_message, Dispatcher, NOTIFY_TITLE};
use crate::errors::Result;

/// Host add-in that wires the [`Dispatcher`] to the "document opened" event.
///
/// Subscribes on startup and unsubscribes on shutdown. Anything escaping the
/// dispatcher is caught at the event boundary and shown to the user, so a
/// bad job never takes the host down.
#[derive(Debug)]
pub struct RemoteRunnerAddin {
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<dyn Notifier>,
    subscription: Option<SubscriptionId>,
}

impl RemoteRunnerAddin {
    pub fn new(dispatcher: Arc<Dispatcher>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            dispatcher,
            notifier,
            subscription: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl HostAddin for RemoteRunnerAddin {
    fn on_startup(&mut self, app: &mut dyn ControlledApplication) -> Result<()> {
        if self.subscription.is_some() {
            debug!("remote runner already subscribed");
            return Ok(());
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let notifier = Arc::clone(&self.notifier);
        let id = app.subscribe_document_opened(Box::new(move |document: &mut dyn Document| {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| dispatcher.on_document_opened(document)));
            match outcome {
                Ok(report) => debug!(
                    document = %report.document,
                    matched = report.items.len(),
                    "document-opened handling finished"
                ),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(%message, "dispatcher panicked while handling document-opened");
                    notifier.show_error(NOTIFY_TITLE, &message);
                }
            }
        }));

        info!(
            drop_zone = ?self.dispatcher.drop_zone().root(),
            "remote runner subscribed to document-opened"
        );
        self.subscription = Some(id);
        Ok(())
    }

    fn on_shutdown(&mut self, app: &mut dyn ControlledApplication) -> Result<()> {
        if let Some(id) = self.subscription.take() {
            let removed = app.unsubscribe_document_opened(id);
            info!(removed, "remote runner unsubscribed from document-opened");
        }
        Ok(())
    }
}
