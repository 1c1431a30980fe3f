//! Installation of a single artifact.
//!
//! An [`InstallSession`] submits its artifact to the [`Installer`], subscribes to the
//! notifications of the session id it gets back and blocks on a [`CompletionGate`] until a
//! terminal status arrives. The terminal outcome is appended to the run's [`UpdateState`] and
//! forwarded to the update server exactly once, whatever the number of duplicated notifications.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::dispatcher::{Delivery, NotificationDispatcher, NotificationHandler};
use super::gate::CompletionGate;
use super::status::{Classification, StatusCode, classify};
use super::{ArtifactDescriptor, Installer, PackageIdentity, SessionId};
use crate::event::InstallerNotification;
use crate::forwarder::StatusForwarder;
use crate::update_state::{TerminalState, UpdateState};

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The installer reported a failure status.
    Status(StatusCode),
    /// The install request never reached the installer.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Success {
        message: String,
    },
    Failure {
        reason: FailureReason,
        message: String,
    },
    /// No terminal notification arrived within the configured wait.
    TimedOut {
        message: String,
    },
}

impl InstallOutcome {
    pub fn message(&self) -> &str {
        match self {
            InstallOutcome::Success { message }
            | InstallOutcome::Failure { message, .. }
            | InstallOutcome::TimedOut { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InstallOutcome::Success { .. })
    }

    pub fn terminal_state(&self) -> TerminalState {
        if self.is_success() {
            TerminalState::Installed
        } else {
            TerminalState::Failed
        }
    }
}

/// What a session needs to publish its outcome.
struct SessionContext {
    artifact: ArtifactDescriptor,
    package: PackageIdentity,
    update_state: Arc<UpdateState>,
    forwarder: Arc<dyn StatusForwarder>,
}

impl SessionContext {
    /// Records the outcome of the package and forwards it, unless the package already has one in
    /// this run.
    fn publish(&self, outcome: &InstallOutcome) {
        let recorded = self.update_state.record_terminal(
            &self.package,
            outcome.terminal_state(),
            outcome.message(),
        );
        if recorded {
            self.forwarder.send(outcome.message());
        } else {
            warn!(
                package = %self.package,
                artifact = %self.artifact.filename,
                "package already has an outcome in this update, not reporting it again"
            );
        }
    }

    fn rejected(&self, reason: String) -> InstallOutcome {
        InstallOutcome::Failure {
            message: format!(
                "Installation of {} ({}) rejected: {}",
                self.artifact.filename, self.package.name, reason
            ),
            reason: FailureReason::Rejected(reason),
        }
    }

    fn timed_out(&self, timeout: Duration) -> InstallOutcome {
        InstallOutcome::TimedOut {
            message: format!(
                "Installation of {} ({}) timed out after {:?}",
                self.artifact.filename, self.package.name, timeout
            ),
        }
    }
}

/// One artifact installation, from submission to its terminal outcome.
pub struct InstallSession {
    context: SessionContext,
    timeout: Option<Duration>,
}

impl InstallSession {
    pub fn new(
        artifact: ArtifactDescriptor,
        package: PackageIdentity,
        update_state: Arc<UpdateState>,
        forwarder: Arc<dyn StatusForwarder>,
    ) -> Self {
        Self {
            context: SessionContext {
                artifact,
                package,
                update_state,
                forwarder,
            },
            timeout: None,
        }
    }

    /// Bounds the wait for the terminal notification. `None` waits forever.
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    /// Submits the artifact and blocks until the installer reports a terminal status.
    pub fn start<I: Installer>(
        self,
        installer: &I,
        dispatcher: &NotificationDispatcher,
    ) -> InstallOutcome {
        let context = self.context;
        info!(
            artifact = %context.artifact.filename,
            package = %context.package,
            "installing artifact"
        );

        let session_id = match installer.create_session(&context.artifact, &context.package) {
            Ok(session_id) => session_id,
            Err(err) => {
                warn!(error_msg = %err, package = %context.package, "install request rejected");
                let outcome = context.rejected(err.to_string());
                context.publish(&outcome);
                return outcome;
            }
        };

        let handler = Arc::new(SessionHandler::new(session_id, context));
        let subscription = match dispatcher.subscribe(session_id, handler.clone()) {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(error_msg = %err, %session_id, "cannot follow installer session");
                return handler.settle(|context| context.rejected(err.to_string()));
            }
        };

        if let Err(err) = installer.commit(session_id) {
            warn!(error_msg = %err, %session_id, "install request rejected");
            subscription.cancel();
            return handler.settle(|context| context.rejected(err.to_string()));
        }

        debug!(%session_id, timeout = ?self.timeout, "waiting for the installation to finish");
        let outcome = match self.timeout {
            None => {
                handler.gate.wait();
                // the gate is only released once an outcome is stored
                handler.settle(|context| context.rejected("released without outcome".to_string()))
            }
            Some(timeout) => {
                if !handler.gate.wait_timeout(timeout) {
                    warn!(%session_id, ?timeout, "no terminal notification received in time");
                }
                handler.settle(|context| context.timed_out(timeout))
            }
        };
        subscription.cancel();

        info!(%session_id, outcome = outcome.message(), "installation finished");
        outcome
    }
}

/// Receiver of the notifications of one session, living in the dispatcher table.
struct SessionHandler {
    session_id: SessionId,
    context: SessionContext,
    gate: CompletionGate,
    outcome: Mutex<Option<InstallOutcome>>,
}

impl SessionHandler {
    fn new(session_id: SessionId, context: SessionContext) -> Self {
        Self {
            session_id,
            context,
            gate: CompletionGate::new(),
            outcome: Mutex::new(None),
        }
    }

    /// Makes `outcome` the terminal outcome of the session, unless it already has one.
    ///
    /// Report append, terminal mark, forwarding and gate release happen under the outcome lock,
    /// so a concurrent duplicate observes the terminal state and does nothing.
    fn conclude(&self, outcome: InstallOutcome) -> bool {
        let mut current = self.lock();
        if current.is_some() {
            return false;
        }
        self.store(&mut current, outcome);
        true
    }

    /// Returns the terminal outcome, concluding with `fallback` if there is none yet.
    fn settle<F>(&self, fallback: F) -> InstallOutcome
    where
        F: FnOnce(&SessionContext) -> InstallOutcome,
    {
        let mut current = self.lock();
        if let Some(outcome) = current.as_ref() {
            return outcome.clone();
        }
        let outcome = fallback(&self.context);
        self.store(&mut current, outcome.clone());
        outcome
    }

    fn store(&self, current: &mut Option<InstallOutcome>, outcome: InstallOutcome) {
        self.context.publish(&outcome);
        *current = Some(outcome);
        self.gate.signal();
    }

    fn lock(&self) -> MutexGuard<'_, Option<InstallOutcome>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationHandler for SessionHandler {
    fn handle(&self, notification: &InstallerNotification) -> Delivery {
        if !notification.is_install_complete() || notification.session_id != self.session_id {
            return Delivery::Ignored;
        }

        let package = &self.context.package;
        debug!(
            session_id = %self.session_id,
            %package,
            reported_package = notification.package_name.as_deref().unwrap_or("unknown"),
            status = %notification.status,
            "result code of installation"
        );

        let outcome = match classify(notification.status, &self.context.artifact, package) {
            Classification::Success { message } => InstallOutcome::Success { message },
            Classification::Failure { code, message } => InstallOutcome::Failure {
                reason: FailureReason::Status(code),
                message,
            },
            Classification::Unrecognized => {
                warn!(
                    session_id = %self.session_id,
                    "status ({}) of package installation ({}) not handled",
                    notification.status,
                    package.name
                );
                return Delivery::Pending;
            }
        };

        if self.conclude(outcome) {
            Delivery::Concluded
        } else {
            debug!(session_id = %self.session_id, "ignoring duplicated terminal notification");
            Delivery::Ignored
        }
    }
}
