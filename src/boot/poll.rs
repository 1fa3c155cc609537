// src/boot/poll.rs

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::BootSettings;
use crate::store::{DropZone, QueueItem};

/// Fixed-interval polling with a hard ceiling on the number of sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    /// Upper bound on the time spent waiting.
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_polls)
    }
}

impl From<&BootSettings> for PollPolicy {
    fn from(settings: &BootSettings) -> Self {
        Self {
            interval: settings.poll_interval,
            max_polls: settings.max_polls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The descriptor disappeared after `polls` sleeps.
    Completed { polls: u32 },
    /// The ceiling was reached with the descriptor still present.
    TimedOut { polls: u32 },
}

/// Wait until `item` is marked complete or the policy's ceiling is hit.
///
/// Checks first, then sleeps; never sleeps more than `max_polls` times.
pub async fn wait_for_completion(
    drop_zone: &DropZone,
    item: &QueueItem,
    policy: PollPolicy,
) -> PollOutcome {
    let mut polls = 0;
    loop {
        if drop_zone.is_complete(item) {
            info!(item_id = %item.id(), polls, "queue item completed");
            return PollOutcome::Completed { polls };
        }
        if polls >= policy.max_polls {
            info!(item_id = %item.id(), polls, "queue item still pending at poll ceiling");
            return PollOutcome::TimedOut { polls };
        }
        debug!(item_id = %item.id(), polls, "queue item pending; sleeping");
        sleep(policy.interval).await;
        polls += 1;
    }
}
