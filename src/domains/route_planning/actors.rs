// Route planning actors
use super::events::RoutePlanningEvent;
use crate::common::DomainEvent;
use tokio::sync::mpsc;

/// Publishes planning events without ever blocking the engine; events are
/// dropped when the channel is full or closed.
#[derive(Clone)]
pub struct PlanEventPublisher {
    event_sender: mpsc::Sender<RoutePlanningEvent>,
}

impl PlanEventPublisher {
    pub fn new(event_sender: mpsc::Sender<RoutePlanningEvent>) -> Self {
        Self { event_sender }
    }

    /// Publisher plus the receiving end of a fresh channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RoutePlanningEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Returns whether the event was queued.
    pub fn publish(&self, event: RoutePlanningEvent) -> bool {
        match self.event_sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::debug!(event_type = event.event_type(), "event channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
