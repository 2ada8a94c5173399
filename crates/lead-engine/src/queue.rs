//! Post-commit notification queue.
//!
//! Engine operations hand notices to a [`NotificationSink`] only after their
//! transaction has committed. The production sink is a bounded channel drained
//! by a background task, so a slow or failing transport never holds up a
//! request.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatcher::{LeadNotice, NotificationDispatcher, NotificationTransport};

/// Accepts notices for delivery. Must not block.
pub trait NotificationSink: Send + Sync {
    fn submit(&self, notice: LeadNotice);
}

/// Bounded queue in front of a [`NotificationDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<LeadNotice>,
}

impl DispatchQueue {
    /// Spawn the worker task and return the queue handle.
    ///
    /// The worker exits once every handle has been dropped and the queue is
    /// drained.
    pub fn start<T>(dispatcher: NotificationDispatcher<T>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        T: NotificationTransport + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<LeadNotice>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                let report = dispatcher.notify(&notice).await;
                debug!(lead_id = %report.lead_id, agents = report.agents.len(), "Notice delivered");
            }
            debug!("Notification queue closed");
        });
        (Self { tx }, handle)
    }
}

impl NotificationSink for DispatchQueue {
    fn submit(&self, notice: LeadNotice) {
        let lead_id = notice.lead.id.clone();
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(lead_id = %lead_id, "Notification queue full, notice dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(lead_id = %lead_id, "Notification queue closed, notice dropped");
            }
        }
    }
}

/// Drops every notice.
#[derive(Debug, Clone, Default)]
pub struct DiscardSink;

impl NotificationSink for DiscardSink {
    fn submit(&self, _notice: LeadNotice) {}
}

/// Keeps submitted notices for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<LeadNotice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything submitted so far.
    pub fn take(&self) -> Vec<LeadNotice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl NotificationSink for RecordingSink {
    fn submit(&self, notice: LeadNotice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}
