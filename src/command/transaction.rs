// src/command/transaction.rs

use tracing::{debug, warn};

use crate::command::loader::ResolvedType;
use crate::command::{CommandResult, Document, TransactionMode};
use crate::errors::{Result, RunnerError};

/// Name given to units of work opened by the runner.
pub const TRANSACTION_NAME: &str = "Remote Runner";

/// How the runner treats units of work around a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPolicy {
    /// No metadata declared: the body runs without an enclosing unit of work.
    None,
    /// Open before, commit on `Succeeded`, roll back on `Cancelled`/`Failed`.
    Automatic,
    /// The work unit opens and closes its own units of work.
    Manual,
}

/// Policy from the resolved type's declared metadata.
pub fn determine_policy(resolved: &ResolvedType) -> TransactionPolicy {
    match resolved.entry.transaction {
        Some(TransactionMode::Automatic) => TransactionPolicy::Automatic,
        Some(TransactionMode::Manual) => TransactionPolicy::Manual,
        None => TransactionPolicy::None,
    }
}

/// Run `body` against `document` under `policy`.
///
/// `body` returns `Err` when the work unit itself blew up; an automatic
/// unit of work is rolled back in that case and the error is passed on.
/// The work unit's result is always returned as-is.
pub fn run_in_transaction<F>(
    policy: TransactionPolicy,
    document: &mut dyn Document,
    body: F,
) -> Result<CommandResult>
where
    F: FnOnce(&mut dyn Document) -> Result<CommandResult>,
{
    if policy != TransactionPolicy::Automatic {
        debug!(?policy, "running without a runner-managed transaction");
        return body(document);
    }

    document
        .begin_transaction(TRANSACTION_NAME)
        .map_err(|e| RunnerError::Other(e.context("starting automatic transaction")))?;
    debug!(document = %document.path_name(), "automatic transaction started");

    match body(document) {
        Ok(CommandResult::Succeeded) => {
            document
                .commit_transaction()
                .map_err(|e| RunnerError::Other(e.context("committing automatic transaction")))?;
            debug!("automatic transaction committed");
            Ok(CommandResult::Succeeded)
        }
        Ok(result) => {
            document
                .rollback_transaction()
                .map_err(|e| RunnerError::Other(e.context("rolling back automatic transaction")))?;
            debug!(%result, "automatic transaction rolled back");
            Ok(result)
        }
        Err(err) => {
            if let Err(rollback_err) = document.rollback_transaction() {
                warn!(error = %rollback_err, "rollback after work unit error failed");
            }
            Err(err)
        }
    }
}
