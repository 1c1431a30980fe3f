use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use update_agent::event::channel::{EventConsumer, EventPublisher, pub_sub};
use update_agent::event::{InstallerNotification, StatusMessage};
use update_agent::forwarder::{ChannelStatusForwarder, StatusForwarder};
use update_agent::installer::dispatcher::NotificationDispatcher;
use update_agent::installer::session::InstallSession;
use update_agent::installer::simulated::SimulatedInstaller;
use update_agent::installer::{ArtifactDescriptor, PackageIdentity, SessionId};
use update_agent::update_state::UpdateState;
use update_agent::utils::thread_context::StartedThreadContext;

/// Session id the simulated installer hands out first.
pub const FIRST_SESSION: SessionId = SessionId::new(7);

/// Retries the execution of `f` after the `interval` has elapsed, until `max_attempts` is reached.
/// # Panics
/// When executing `f` keeps failing after reaching `max_attempts`.
pub fn retry<F>(max_attempts: usize, interval: Duration, mut f: F)
where
    F: FnMut() -> Result<(), Box<dyn Error>>,
{
    let mut last_err = Ok(());
    for _ in 0..max_attempts {
        let Err(err) = f() else {
            return;
        };
        last_err = Err(err);
        std::thread::sleep(interval);
    }
    last_err.unwrap_or_else(|err| panic!("retry failed after {max_attempts} attempts: {err}"))
}

pub fn firmware_artifact() -> ArtifactDescriptor {
    ArtifactDescriptor::new("fw-1.2.bin", "/data/fw-1.2.bin", 2048)
}

pub fn gpsd() -> PackageIdentity {
    PackageIdentity::new("gpsd", "1.2")
}

/// Everything an install session talks to, wired the way the agent wires it.
pub struct Harness {
    pub notifications: EventPublisher<InstallerNotification>,
    pub dispatcher: NotificationDispatcher,
    pub update_state: Arc<UpdateState>,
    forwarder: Arc<dyn StatusForwarder>,
    status_messages: EventConsumer<StatusMessage>,
    listener: Option<StartedThreadContext>,
}

impl Harness {
    pub fn new() -> Self {
        let (notifications, notification_consumer) = pub_sub();
        let (status_publisher, status_messages) = pub_sub();
        let dispatcher = NotificationDispatcher::new();
        let listener = dispatcher.listen(notification_consumer);
        Self {
            notifications,
            dispatcher,
            update_state: Arc::new(UpdateState::new()),
            forwarder: Arc::new(ChannelStatusForwarder::new(status_publisher)),
            status_messages,
            listener: Some(listener),
        }
    }

    /// A simulated installer publishing on the harness channel, handing out session 7 first.
    pub fn installer(&self) -> SimulatedInstaller {
        SimulatedInstaller::new(self.notifications.clone()).starting_at(7)
    }

    pub fn session(&self) -> InstallSession {
        InstallSession::new(
            firmware_artifact(),
            gpsd(),
            self.update_state.clone(),
            self.forwarder.clone(),
        )
        .with_timeout(Some(Duration::from_secs(10)))
    }

    pub fn forwarder(&self) -> Arc<dyn StatusForwarder> {
        self.forwarder.clone()
    }

    /// Status messages forwarded so far.
    pub fn forwarded(&self) -> Vec<String> {
        self.status_messages
            .as_ref()
            .try_iter()
            .map(|StatusMessage(message)| message)
            .collect()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = listener.stop_blocking();
        }
    }
}
