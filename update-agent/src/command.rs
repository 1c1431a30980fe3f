//! Command line interface for the update agent simulator.
//!
//! Parses the command line arguments, loads the configuration and the deployment to apply and
//! hands them over to the main function as a [RunContext].
#![warn(missing_docs)]

use crate::config::{ConfigError, UpdateAgentConfig};
use crate::logging::LoggingError;
use crate::updater::SoftwareModule;
use clap::Parser;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

/// All possible errors that can happen while running the initialization.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// Could not initialize logging
    #[error("could not initialize logging: {0}")]
    LoggingError(#[from] LoggingError),
    /// The config could not be read
    #[error("{0}")]
    ConfigError(#[from] ConfigError),
    /// The deployment could not be read
    #[error("could not read deployment from {0}: {1}")]
    DeploymentError(String, String),
}

/// Command line arguments for the update agent simulator, as parsed by [`clap`].
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)] // Read from `Cargo.toml`
pub struct Command {
    #[arg(long)]
    version: bool,

    /// Path of the configuration file. Defaults apply when not set.
    #[arg(long)]
    config: Option<PathBuf>,

    /// YAML file holding the list of software modules to apply.
    #[arg(long, required_unless_present = "version")]
    deployment: Option<PathBuf>,

    /// Artifacts the simulated installer reports as failed. Can be repeated.
    #[arg(long = "fail-artifact")]
    fail_artifacts: Vec<String>,

    /// Artifacts the simulated installer refuses to accept. Can be repeated.
    #[arg(long = "reject-artifact")]
    reject_artifacts: Vec<String>,

    /// Time the simulated installer takes for each artifact.
    #[arg(long, default_value = "0s", value_parser = parse_duration_arg)]
    delay: Duration,

    /// Publish every installer notification twice.
    #[arg(long)]
    duplicate_notifications: bool,
}

/// Behavior requested for the simulated installer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationArgs {
    /// Artifacts reported as failed.
    pub fail_artifacts: Vec<String>,
    /// Artifacts refused on submission.
    pub reject_artifacts: Vec<String>,
    /// Time taken by each installation.
    pub delay: Duration,
    /// Whether notifications are published twice.
    pub duplicate_notifications: bool,
}

/// Everything the main function needs to run an update.
#[derive(Debug)]
pub struct RunContext {
    /// Agent configuration.
    pub config: UpdateAgentConfig,
    /// Modules to apply.
    pub deployment: Vec<SoftwareModule>,
    /// Simulated installer behavior.
    pub simulation: SimulationArgs,
}

impl Command {
    /// Runs the provided main function or shows the binary information according to flags.
    ///
    /// The main function returns whether the update succeeded.
    pub fn run<F: Fn(RunContext) -> Result<bool, Box<dyn Error>>>(main_fn: F) -> ExitCode {
        let flags = Self::parse();

        if flags.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }

        let Ok(run_context) = flags.init().inspect_err(|err| {
            // Using print because logging might have failed to start
            println!("Error on update agent initialization: {err}");
        }) else {
            return ExitCode::FAILURE;
        };

        match main_fn(run_context) {
            Ok(true) => {
                info!("The update was applied successfully");
                ExitCode::SUCCESS
            }
            Ok(false) => {
                error!("The update failed");
                ExitCode::FAILURE
            }
            Err(err) => {
                error!("The update agent exited with an error: {err}");
                ExitCode::FAILURE
            }
        }
    }

    fn init(self) -> Result<RunContext, InitError> {
        let config = match &self.config {
            Some(path) => UpdateAgentConfig::load(path)?,
            None => UpdateAgentConfig::from_yaml("")?,
        };
        config.log.try_init()?;

        let deployment = self
            .deployment
            .as_deref()
            .map(read_deployment)
            .transpose()?
            .unwrap_or_default();
        info!(modules = deployment.len(), "deployment loaded");

        Ok(RunContext {
            config,
            deployment,
            simulation: SimulationArgs {
                fail_artifacts: self.fail_artifacts,
                reject_artifacts: self.reject_artifacts,
                delay: self.delay,
                duplicate_notifications: self.duplicate_notifications,
            },
        })
    }
}

/// Reads the list of software modules stored as YAML in `path`.
pub fn read_deployment(path: &Path) -> Result<Vec<SoftwareModule>, InitError> {
    let location = path.to_string_lossy().to_string();
    let content = fs::read_to_string(path)
        .map_err(|err| InitError::DeploymentError(location.clone(), err.to_string()))?;
    serde_yaml::from_str(&content)
        .map_err(|err| InitError::DeploymentError(location, err.to_string()))
}

fn parse_duration_arg(arg: &str) -> Result<Duration, String> {
    duration_str::parse(arg)
}
