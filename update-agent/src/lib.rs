//! # Update Agent library
//!
//! Core functionality of the device update agent: it hands artifacts over to the package installer,
//! waits for the installer to report each outcome, and aggregates those outcomes into the report
//! sent back to the update server. The binaries generated by this project consume this library.

pub mod command;
pub mod config;
pub mod event;
pub mod forwarder;
pub mod installer;
pub mod logging;
pub mod update_state;
pub mod updater;
pub mod utils;
