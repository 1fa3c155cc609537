// src/dispatch/host.rs

//! Contracts the dispatcher consumes from the host application.

use std::fmt::Debug;

use crate::command::Document;
use crate::errors::Result;

/// Token returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback for the host's "document opened" event.
pub type DocumentOpenedHandler = Box<dyn FnMut(&mut dyn Document) + Send>;

/// The part of the host application an add-in can hook into.
pub trait ControlledApplication {
    fn subscribe_document_opened(&mut self, handler: DocumentOpenedHandler) -> SubscriptionId;

    /// Returns `false` if `id` was not subscribed.
    fn unsubscribe_document_opened(&mut self, id: SubscriptionId) -> bool;
}

/// User-visible error surface of the host (a dialog, a console, ...).
pub trait Notifier: Send + Sync + Debug {
    fn show_error(&self, title: &str, message: &str);
}

/// An extension loaded by the host for the lifetime of the host process.
pub trait HostAddin {
    fn on_startup(&mut self, app: &mut dyn ControlledApplication) -> Result<()>;
    fn on_shutdown(&mut self, app: &mut dyn ControlledApplication) -> Result<()>;
}
