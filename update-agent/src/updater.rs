//! The update workflow: installs the artifacts of a deployment one after the other and turns the
//! per-artifact outcomes into a single [`UpdateResult`].
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::InstallConfig;
use crate::forwarder::StatusForwarder;
use crate::installer::dispatcher::NotificationDispatcher;
use crate::installer::session::InstallSession;
use crate::installer::{ArtifactDescriptor, Installer, PackageIdentity};
use crate::update_state::UpdateState;

/// A software module of a deployment, as assigned by the update server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoftwareModule {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub module_type: String,
    #[serde(default)]
    pub artifacts: Vec<ModuleArtifact>,
}

/// An artifact of a module together with the package it installs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleArtifact {
    pub package: String,
    #[serde(flatten)]
    pub artifact: ArtifactDescriptor,
}

impl SoftwareModule {
    fn package_of(&self, artifact: &ModuleArtifact) -> PackageIdentity {
        PackageIdentity::new(artifact.package.clone(), self.version.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub success: bool,
    pub details: Vec<String>,
}

pub struct Updater<I>
where
    I: Installer,
{
    installer: I,
    dispatcher: NotificationDispatcher,
    update_state: Arc<UpdateState>,
    forwarder: Arc<dyn StatusForwarder>,
    config: InstallConfig,
}

impl<I> Updater<I>
where
    I: Installer,
{
    pub fn new(
        installer: I,
        dispatcher: NotificationDispatcher,
        update_state: Arc<UpdateState>,
        forwarder: Arc<dyn StatusForwarder>,
        config: InstallConfig,
    ) -> Self {
        Self {
            installer,
            dispatcher,
            update_state,
            forwarder,
            config,
        }
    }

    /// Modules of the deployment this device is configured to install.
    pub fn required_modules<'a>(&self, modules: &'a [SoftwareModule]) -> Vec<&'a SoftwareModule> {
        modules
            .iter()
            .filter(|module| {
                let accepted = self.config.accepts_module_type(&module.module_type);
                if !accepted {
                    debug!(
                        module = %module.name,
                        module_type = %module.module_type,
                        "skipping module of a type this device does not install"
                    );
                }
                accepted
            })
            .collect()
    }

    /// Installs every artifact of `modules`, in order, stopping at the first one that does not
    /// succeed.
    pub fn apply(&self, modules: &[SoftwareModule]) -> UpdateResult {
        self.update_state.start_update();
        let modules = self.required_modules(modules);

        modules
            .iter()
            .flat_map(|module| module.artifacts.iter().map(|a| module.package_of(a)))
            .for_each(|package| self.update_state.mark_pending(&package));

        let success = modules.iter().all(|module| {
            info!(
                module = %module.name,
                version = %module.version,
                module_type = %module.module_type,
                "applying module"
            );
            module.artifacts.iter().all(|module_artifact| {
                let outcome = InstallSession::new(
                    module_artifact.artifact.clone(),
                    module.package_of(module_artifact),
                    self.update_state.clone(),
                    self.forwarder.clone(),
                )
                .with_timeout(self.config.timeout)
                .start(&self.installer, &self.dispatcher);
                if !outcome.is_success() {
                    warn!(
                        artifact = %module_artifact.artifact.filename,
                        "stopping the update after an unsuccessful installation"
                    );
                }
                outcome.is_success()
            })
        });

        self.update_state.finish_update();
        let details = self.update_state.snapshot().messages();
        info!(success, "update finished");
        UpdateResult { success, details }
    }

    /// An update can be cancelled while no run is installing artifacts.
    pub fn update_is_cancellable(&self) -> bool {
        !self.update_state.is_update_started()
    }

    pub fn update_state(&self) -> Arc<UpdateState> {
        self.update_state.clone()
    }
}
