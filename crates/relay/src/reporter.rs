//! Progress reporting shared by both streaming phases.
//!
//! The data path feeds byte counts into a [`ProgressReporter`]. Reports
//! that pass the throttle are queued on a small channel and delivered by
//! a per-run notifier task, so a slow or failing chat API never stalls the
//! byte-copy loop for more than `progress_send_wait`.

use std::sync::Arc;
use std::time::Duration;

use filerelay_transfer::{Phase, ProgressThrottle, ThrottleDecision};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chat::{ChatPlatform, StatusMessage};

/// Queued notifications per run.
const QUEUE_DEPTH: usize = 8;

/// Throttled, non-blocking progress sink of one run.
pub struct ProgressReporter {
    throttle: ProgressThrottle,
    tx: Option<mpsc::Sender<String>>,
    send_wait: Duration,
    run_id: String,
}

/// Handle of the notifier task draining a reporter's queue.
pub struct Notifier {
    handle: JoinHandle<u64>,
}

impl ProgressReporter {
    /// Creates a reporter and spawns its notifier task.
    ///
    /// With `status` of `None` every notification is dropped.
    pub fn spawn(
        run_id: &str,
        chat: Arc<dyn ChatPlatform>,
        status: Option<StatusMessage>,
        throttle_window: Duration,
        send_wait: Duration,
        notify_timeout: Duration,
    ) -> (Self, Notifier) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handle = tokio::spawn(notify_loop(
            run_id.to_string(),
            chat,
            status,
            rx,
            notify_timeout,
        ));
        let reporter = Self {
            throttle: ProgressThrottle::new(throttle_window),
            tx: Some(tx),
            send_wait,
            run_id: run_id.to_string(),
        };
        (reporter, Notifier { handle })
    }

    /// Reports cumulative progress of the current phase.
    pub async fn report(&mut self, phase: Phase, transferred: u64, total: Option<u64>) {
        let decision = self.throttle.report(phase, transferred, total);
        self.deliver_decision(decision).await;
    }

    /// Reports the final byte count of a phase.
    pub async fn finish(&mut self, phase: Phase, transferred: u64, total: Option<u64>) {
        let decision = self.throttle.finish(phase, transferred, total);
        self.deliver_decision(decision).await;
    }

    /// Queues a phase-transition text, bypassing the throttle.
    pub async fn announce(&mut self, text: impl Into<String>) {
        self.deliver(text.into()).await;
    }

    /// Stops accepting reports. The notifier drains what is queued.
    pub fn close(&mut self) {
        self.tx = None;
    }

    async fn deliver_decision(&mut self, decision: ThrottleDecision) {
        if let ThrottleDecision::Emit(update) = decision {
            debug!(
                run = %self.run_id,
                phase = %update.phase,
                bytes = update.bytes_transferred,
                percent = ?update.percent,
                "progress"
            );
            self.deliver(update.text).await;
        }
    }

    async fn deliver(&mut self, text: String) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tokio::time::timeout(self.send_wait, tx.send(text)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!(run = %self.run_id, "notifier gone, dropping progress"),
            Err(_) => warn!(run = %self.run_id, "notification queue full, dropping progress"),
        }
    }
}

impl Notifier {
    /// Waits until every queued notification was attempted.
    ///
    /// The reporter must be closed first. Returns the number of
    /// notifications delivered.
    pub async fn drain(self) -> u64 {
        match self.handle.await {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!(error = %e, "notifier task failed");
                0
            }
        }
    }
}

async fn notify_loop(
    run_id: String,
    chat: Arc<dyn ChatPlatform>,
    status: Option<StatusMessage>,
    mut rx: mpsc::Receiver<String>,
    notify_timeout: Duration,
) -> u64 {
    let mut delivered = 0;
    while let Some(text) = rx.recv().await {
        let Some(status) = &status else {
            continue;
        };
        if notify_bounded(chat.as_ref(), status, &text, notify_timeout, &run_id).await {
            delivered += 1;
        }
    }
    delivered
}

/// Edits `status` with a deadline. Failures are logged and absorbed.
pub(crate) async fn notify_bounded(
    chat: &dyn ChatPlatform,
    status: &StatusMessage,
    text: &str,
    timeout: Duration,
    run_id: &str,
) -> bool {
    match tokio::time::timeout(timeout, chat.notify(status, text)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(run = %run_id, error = %e, "notify failed");
            false
        }
        Err(_) => {
            warn!(run = %run_id, "notify timed out");
            false
        }
    }
}
