//! Shared state of one update run.
//!
//! Every install session of a run appends its terminal message to the same [`UpdateState`] and
//! marks the package it installed. The workflow reads the result through [`UpdateState::snapshot`].
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::installer::PackageIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Installed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Pending,
    Installed,
    Failed,
}

impl From<TerminalState> for PackageState {
    fn from(value: TerminalState) -> Self {
        match value {
            TerminalState::Installed => PackageState::Installed,
            TerminalState::Failed => PackageState::Failed,
        }
    }
}

impl PackageState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PackageState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    Success(String),
    Failure(String),
}

impl ReportEntry {
    pub fn message(&self) -> &str {
        match self {
            ReportEntry::Success(message) | ReportEntry::Failure(message) => message,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReportEntry::Failure(_))
    }
}

/// Read-only copy of the state of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    entries: Vec<ReportEntry>,
    packages: HashMap<PackageIdentity, PackageState>,
}

impl UpdateReport {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.message().to_string())
            .collect()
    }

    pub fn package_state(&self, package: &PackageIdentity) -> Option<PackageState> {
        self.packages.get(package).copied()
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(ReportEntry::is_failure)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
struct RunState {
    started: bool,
    report: UpdateReport,
}

/// Aggregator of the outcomes of one update run. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct UpdateState(Mutex<RunState>);

impl UpdateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new run, discarding the report of the previous one.
    pub fn start_update(&self) {
        let mut state = self.lock();
        state.started = true;
        state.report = UpdateReport::default();
        debug!("update run started");
    }

    /// Ends the current run. The report stays readable until the next [`Self::start_update`].
    pub fn finish_update(&self) {
        self.lock().started = false;
        debug!("update run finished");
    }

    pub fn is_update_started(&self) -> bool {
        self.lock().started
    }

    /// Records the terminal outcome of `package`: appends `message` to the report and marks the
    /// package with `terminal`.
    ///
    /// Returns `false`, leaving the report untouched, when the package already reached a terminal
    /// state in this run.
    pub fn record_terminal<S: Into<String>>(
        &self,
        package: &PackageIdentity,
        terminal: TerminalState,
        message: S,
    ) -> bool {
        let mut state = self.lock();
        if !Self::terminate(&mut state.report, package, terminal) {
            return false;
        }
        let message = message.into();
        state.report.entries.push(match terminal {
            TerminalState::Installed => ReportEntry::Success(message),
            TerminalState::Failed => ReportEntry::Failure(message),
        });
        true
    }

    pub fn record_success<S: Into<String>>(&self, package: &PackageIdentity, message: S) -> bool {
        self.record_terminal(package, TerminalState::Installed, message)
    }

    pub fn record_failure<S: Into<String>>(&self, package: &PackageIdentity, message: S) -> bool {
        self.record_terminal(package, TerminalState::Failed, message)
    }

    /// Tracks `package` as waiting for its installation. A terminal package is left untouched.
    pub fn mark_pending(&self, package: &PackageIdentity) {
        self.lock()
            .report
            .packages
            .entry(package.clone())
            .or_insert(PackageState::Pending);
    }

    /// Marks `package` terminal without a report entry. The first terminal state of a run wins.
    pub fn mark_terminated(&self, package: &PackageIdentity, terminal: TerminalState) -> bool {
        Self::terminate(&mut self.lock().report, package, terminal)
    }

    fn terminate(
        report: &mut UpdateReport,
        package: &PackageIdentity,
        terminal: TerminalState,
    ) -> bool {
        let current = report
            .packages
            .entry(package.clone())
            .or_insert(PackageState::Pending);
        if current.is_terminal() {
            warn!(
                package = %package,
                state = ?current,
                "ignoring new terminal state for an already terminated package"
            );
            return false;
        }
        *current = terminal.into();
        true
    }

    pub fn is_installation_pending(&self, package: &PackageIdentity) -> bool {
        self.package_state(package) == Some(PackageState::Pending)
    }

    pub fn package_state(&self, package: &PackageIdentity) -> Option<PackageState> {
        self.lock().report.package_state(package)
    }

    pub fn snapshot(&self) -> UpdateReport {
        self.lock().report.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
