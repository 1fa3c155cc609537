// src/host/app.rs

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, error};

use crate::command::Document;
use crate::dispatch::{ControlledApplication, DocumentOpenedHandler, Notifier, SubscriptionId};

/// Minimal in-process host: keeps "document opened" subscribers and fires
/// them in subscription order.
#[derive(Default)]
pub struct HostApplication {
    handlers: BTreeMap<SubscriptionId, DocumentOpenedHandler>,
    next_id: u64,
}

impl fmt::Debug for HostApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostApplication")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl HostApplication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    /// Raise "document opened" for `document`. Returns how many handlers ran.
    pub fn open_document(&mut self, document: &mut dyn Document) -> usize {
        debug!(
            document = document.path_name(),
            subscribers = self.handlers.len(),
            "document opened"
        );
        for handler in self.handlers.values_mut() {
            handler(&mut *document);
        }
        self.handlers.len()
    }
}

impl ControlledApplication for HostApplication {
    fn subscribe_document_opened(&mut self, handler: DocumentOpenedHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, handler);
        id
    }

    fn unsubscribe_document_opened(&mut self, id: SubscriptionId) -> bool {
        self.handlers.remove(&id).is_some()
    }
}

/// Shows notifications on the console.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_error(&self, title: &str, message: &str) {
        error!(title, message, "notification");
        eprintln!("[{title}] {message}");
    }
}
