use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Tracks one client command travelling through consensus. The submitter
/// holds this and waits; the replica completes it once the command has
/// been chosen and applied locally.
#[derive(Debug)]
pub struct PendingCommand {
    value: Vec<u8>,
    done: AtomicBool,
    notify: Notify,
}

impl PendingCommand {
    #[must_use]
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Suspends until [`PendingCommand::complete`] runs. There is no
    /// cancellation; loss of quorum keeps the caller waiting.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    /// Marks the command applied and wakes every waiter.
    pub fn complete(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}
