use tracing::{debug, warn};

use crate::event::StatusMessage;
use crate::event::channel::EventPublisher;

/// One-way channel of human readable status lines towards the update server.
///
/// Sending is best effort: implementations never block the install workflow and never report
/// failures back to it.
pub trait StatusForwarder: Send + Sync {
    fn send(&self, message: &str);
}

/// Hands the messages over to the transport through an event channel.
pub struct ChannelStatusForwarder(EventPublisher<StatusMessage>);

impl ChannelStatusForwarder {
    pub fn new(publisher: EventPublisher<StatusMessage>) -> Self {
        Self(publisher)
    }
}

impl StatusForwarder for ChannelStatusForwarder {
    fn send(&self, message: &str) {
        let _ = self
            .0
            .try_publish(StatusMessage::from(message))
            .inspect(|_| debug!(status = message, "status message forwarded"))
            .inspect_err(|err| warn!(error_msg = %err, status = message, "status message dropped"));
    }
}

/// Forwarder for runs without a remote endpoint.
#[derive(Debug, Default)]
pub struct NoOpStatusForwarder;

impl StatusForwarder for NoOpStatusForwarder {
    fn send(&self, message: &str) {
        debug!(status = message, "no remote endpoint, status message not forwarded");
    }
}
