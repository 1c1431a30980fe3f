//! In-process stand-in for the privileged package installer.
//!
//! It behaves like the real one from the point of view of an install session: session ids are
//! handed out on submission and the outcome is published later, from another thread, on the
//! notification channel. What each artifact reports is scripted.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};

use super::status::StatusCode;
use super::{ArtifactDescriptor, Installer, InstallerError, PackageIdentity, SessionId};
use crate::event::InstallerNotification;
use crate::event::channel::EventPublisher;
use crate::utils::threads::spawn_named_thread;

pub struct SimulatedInstaller {
    notifications: EventPublisher<InstallerNotification>,
    next_session: AtomicI32,
    scripts: HashMap<String, Vec<StatusCode>>,
    rejected: HashSet<String>,
    duplicate_notifications: bool,
    delay: Duration,
    open_sessions: Mutex<HashMap<SessionId, (String, PackageIdentity)>>,
}

impl SimulatedInstaller {
    pub fn new(notifications: EventPublisher<InstallerNotification>) -> Self {
        Self {
            notifications,
            next_session: AtomicI32::new(1),
            scripts: HashMap::new(),
            rejected: HashSet::new(),
            duplicate_notifications: false,
            delay: Duration::ZERO,
            open_sessions: Mutex::new(HashMap::new()),
        }
    }

    /// First session id handed out.
    pub fn starting_at(self, session_id: i32) -> Self {
        Self {
            next_session: AtomicI32::new(session_id),
            ..self
        }
    }

    /// Statuses published, in order, once the session installing `filename` is committed.
    /// Artifacts without a script report [`StatusCode::SUCCESS`]. An empty script publishes nothing.
    pub fn with_script<S: Into<String>>(mut self, filename: S, statuses: Vec<StatusCode>) -> Self {
        self.scripts.insert(filename.into(), statuses);
        self
    }

    /// Refuses to open a session for `filename`.
    pub fn rejecting<S: Into<String>>(mut self, filename: S) -> Self {
        self.rejected.insert(filename.into());
        self
    }

    /// Publishes every notification twice.
    pub fn with_duplicate_notifications(self, duplicate_notifications: bool) -> Self {
        Self {
            duplicate_notifications,
            ..self
        }
    }

    /// Time between the commit and the first notification.
    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }
}

impl Installer for SimulatedInstaller {
    fn create_session(
        &self,
        artifact: &ArtifactDescriptor,
        package: &PackageIdentity,
    ) -> Result<SessionId, InstallerError> {
        if self.rejected.contains(&artifact.filename) {
            return Err(InstallerError::Rejected(
                artifact.filename.clone(),
                "refused by the simulated installer".to_string(),
            ));
        }
        let session_id = SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed));
        self.open_sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id, (artifact.filename.clone(), package.clone()));
        debug!(%session_id, artifact = %artifact.filename, "simulated session created");
        Ok(session_id)
    }

    fn commit(&self, session_id: SessionId) -> Result<(), InstallerError> {
        let (filename, package) = self
            .open_sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id)
            .ok_or_else(|| {
                InstallerError::CommitFailed(session_id, "unknown session".to_string())
            })?;

        let statuses = self
            .scripts
            .get(&filename)
            .cloned()
            .unwrap_or_else(|| vec![StatusCode::SUCCESS]);
        let copies = if self.duplicate_notifications { 2 } else { 1 };
        let publisher = self.notifications.clone();
        let delay = self.delay;

        spawn_named_thread(format!("simulated-install-{session_id}"), move || {
            sleep(delay);
            statuses
                .into_iter()
                .flat_map(|status| std::iter::repeat_n(status, copies))
                .for_each(|status| {
                    let notification = InstallerNotification::install_complete(session_id, status)
                        .with_package_name(package.name.clone());
                    let _ = publisher.publish(notification).inspect_err(|err| {
                        warn!(%session_id, error_msg = %err, "cannot publish installer notification")
                    });
                });
        });
        Ok(())
    }
}
