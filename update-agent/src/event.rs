pub mod cancellation;
pub mod channel;

use crate::installer::SessionId;
use crate::installer::status::StatusCode;

/// Action tag carried by the notifications the installer emits when a session finishes.
pub const ACTION_INSTALL_COMPLETE: &str = "install-complete";

/// A notification pushed by the installer.
///
/// Notifications are delivered at least once and are scoped process-wide: every open session
/// may observe every notification, so consumers must filter by [`SessionId`].
#[derive(Clone, Debug, PartialEq)]
pub struct InstallerNotification {
    pub action: String,
    pub session_id: SessionId,
    pub status: StatusCode,
    pub package_name: Option<String>,
}

impl InstallerNotification {
    pub fn install_complete(session_id: SessionId, status: StatusCode) -> Self {
        Self {
            action: ACTION_INSTALL_COMPLETE.to_string(),
            session_id,
            status,
            package_name: None,
        }
    }

    pub fn with_package_name<S: Into<String>>(self, package_name: S) -> Self {
        Self {
            package_name: Some(package_name.into()),
            ..self
        }
    }

    pub fn is_install_complete(&self) -> bool {
        self.action == ACTION_INSTALL_COMPLETE
    }
}

/// Human readable status line sent to the remote update server.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusMessage(pub String);

impl From<&str> for StatusMessage {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
