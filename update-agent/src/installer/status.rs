use std::fmt::{Display, Formatter};

use super::{ArtifactDescriptor, PackageIdentity};

/// Raw status code reported by the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const PENDING_USER_ACTION: StatusCode = StatusCode(-1);
    pub const SUCCESS: StatusCode = StatusCode(0);
    pub const FAILURE: StatusCode = StatusCode(1);
    pub const FAILURE_BLOCKED: StatusCode = StatusCode(2);
    pub const FAILURE_ABORTED: StatusCode = StatusCode(3);
    pub const FAILURE_INVALID: StatusCode = StatusCode(4);
    pub const FAILURE_CONFLICT: StatusCode = StatusCode(5);
    pub const FAILURE_STORAGE: StatusCode = StatusCode(6);
    pub const FAILURE_INCOMPATIBLE: StatusCode = StatusCode(7);
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Codes that end a session unsuccessfully.
pub const FAILURE_CODES: [StatusCode; 7] = [
    StatusCode::FAILURE,
    StatusCode::FAILURE_BLOCKED,
    StatusCode::FAILURE_ABORTED,
    StatusCode::FAILURE_INVALID,
    StatusCode::FAILURE_CONFLICT,
    StatusCode::FAILURE_STORAGE,
    StatusCode::FAILURE_INCOMPATIBLE,
];

/// Result of mapping a status code onto the session lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success { message: String },
    Failure { code: StatusCode, message: String },
    /// Intermediate or unknown status. It does not end the session.
    Unrecognized,
}

impl Classification {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Classification::Unrecognized)
    }
}

pub fn classify(
    status: StatusCode,
    artifact: &ArtifactDescriptor,
    package: &PackageIdentity,
) -> Classification {
    if status == StatusCode::SUCCESS {
        Classification::Success {
            message: format!("{} ({}) installed", artifact.filename, package.name),
        }
    } else if FAILURE_CODES.contains(&status) {
        Classification::Failure {
            code: status,
            message: format!(
                "Installation of {} ({}) fails with error code {}",
                artifact.filename, package.name, status
            ),
        }
    } else {
        Classification::Unrecognized
    }
}
