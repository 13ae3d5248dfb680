//! Channel-backed scheduler

use super::{CheckRequest, Scheduler};
use crate::error::SchedulerError;
use tokio::sync::mpsc;

/// Scheduler that queues requests on an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    sender: mpsc::UnboundedSender<CheckRequest>,
}

impl ChannelScheduler {
    /// Create scheduler and the queue its requests arrive on
    #[must_use]
    pub fn channel() -> (Self, CheckQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, CheckQueue { receiver })
    }
}

impl Scheduler for ChannelScheduler {
    fn check_resource(&self, request: CheckRequest) -> Result<(), SchedulerError> {
        tracing::trace!("Queueing check of {}", request.node());
        self.sender.send(request).map_err(|_| SchedulerError::Closed)
    }
}

/// Receiving end of a [`ChannelScheduler`]
#[derive(Debug)]
pub struct CheckQueue {
    receiver: mpsc::UnboundedReceiver<CheckRequest>,
}

impl CheckQueue {
    /// Wait for the next request; `None` once every scheduler is dropped
    pub async fn recv(&mut self) -> Option<CheckRequest> {
        self.receiver.recv().await
    }

    /// Next request if one is already queued
    pub fn try_recv(&mut self) -> Option<CheckRequest> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued request
    pub fn drain(&mut self) -> Vec<CheckRequest> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
