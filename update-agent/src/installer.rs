//! Synchronization with the external package installer.
//!
//! The installer accepts an install request, hands back a [`SessionId`] and reports the end of the
//! installation later on through an [`InstallerNotification`](crate::event::InstallerNotification).
//! The submodules turn that asynchronous contract into a blocking one:
//!
//! - [`status`] classifies the status codes carried by notifications.
//! - [`gate`] provides the one-shot primitive an install waits on.
//! - [`dispatcher`] routes notifications to the session they belong to.
//! - [`session`] drives a single artifact installation end to end.
pub mod dispatcher;
pub mod gate;
pub mod session;
pub mod simulated;
pub mod status;

use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

/// Handle assigned by the installer to an install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(i32);

impl SessionId {
    /// Sentinel carried by notifications that do not reference any session.
    pub const NOT_FOUND: SessionId = SessionId(-1);

    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::NOT_FOUND
    }
}

impl From<i32> for SessionId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The file handed over to the installer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    pub path: PathBuf,
    #[serde(default)]
    pub size: u64,
}

impl ArtifactDescriptor {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(filename: S, path: P, size: u64) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
            size,
        }
    }
}

/// Name and version of the software unit an artifact installs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Display for PackageIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstallerError {
    #[error("installer rejected `{0}`: {1}")]
    Rejected(String, String),
    #[error("committing session {0} failed: {1}")]
    CommitFailed(SessionId, String),
}

/// The installer as seen by an install session.
///
/// Submission happens in two steps so the caller can subscribe to the notifications of a session
/// before the installer has any chance to emit them.
pub trait Installer {
    /// Opens an installer session for the artifact. No installation starts yet.
    fn create_session(
        &self,
        artifact: &ArtifactDescriptor,
        package: &PackageIdentity,
    ) -> Result<SessionId, InstallerError>;

    /// Starts the installation of an opened session. Its outcome is delivered asynchronously.
    fn commit(&self, session_id: SessionId) -> Result<(), InstallerError>;
}
