use crate::common::Harness;
use update_agent::config::InstallConfig;
use update_agent::installer::status::StatusCode;
use update_agent::installer::{ArtifactDescriptor, PackageIdentity};
use update_agent::update_state::PackageState;
use update_agent::updater::{ModuleArtifact, SoftwareModule, Updater};

fn deployment() -> Vec<SoftwareModule> {
    serde_yaml::from_str(
        r#"
- name: navigation
  version: "1.2"
  type: apk
  artifacts:
    - package: gpsd
      filename: fw-1.2.bin
      path: /data/fw-1.2.bin
      size: 2048
    - package: maps
      filename: maps-1.2.apk
      path: /data/maps-1.2.apk
- name: firmware
  version: "4.0"
  type: os
  artifacts:
    - package: system
      filename: ota-4.0.zip
      path: /data/ota-4.0.zip
"#,
    )
    .unwrap()
}

#[test]
fn deployment_is_installed_end_to_end() {
    let harness = Harness::new();
    let updater = Updater::new(
        harness.installer(),
        harness.dispatcher.clone(),
        harness.update_state.clone(),
        harness.forwarder(),
        InstallConfig::default(),
    );

    assert!(updater.update_is_cancellable());
    let result = updater.apply(&deployment());

    assert!(result.success);
    assert_eq!(
        result.details,
        vec![
            "fw-1.2.bin (gpsd) installed",
            "maps-1.2.apk (maps) installed",
            "ota-4.0.zip (system) installed",
        ]
    );
    assert_eq!(harness.forwarded(), result.details);
    assert!(updater.update_is_cancellable());
    assert_eq!(harness.dispatcher.subscription_count(), 0);
}

#[test]
fn failed_artifact_stops_the_update() {
    let harness = Harness::new();
    let updater = Updater::new(
        harness
            .installer()
            .with_script("maps-1.2.apk", vec![StatusCode::FAILURE_INCOMPATIBLE]),
        harness.dispatcher.clone(),
        harness.update_state.clone(),
        harness.forwarder(),
        InstallConfig::default(),
    );

    let result = updater.apply(&deployment());

    assert!(!result.success);
    assert_eq!(result.details.len(), 2);
    assert!(result.details[1].starts_with("Installation of maps-1.2.apk (maps) fails"));

    let report = harness.update_state.snapshot();
    assert_eq!(
        report.package_state(&PackageIdentity::new("gpsd", "1.2")),
        Some(PackageState::Installed)
    );
    assert_eq!(
        report.package_state(&PackageIdentity::new("maps", "1.2")),
        Some(PackageState::Failed)
    );
    assert_eq!(
        report.package_state(&PackageIdentity::new("system", "4.0")),
        Some(PackageState::Pending)
    );
}

#[test]
fn only_configured_module_types_are_installed() {
    let harness = Harness::new();
    let updater = Updater::new(
        harness.installer(),
        harness.dispatcher.clone(),
        harness.update_state.clone(),
        harness.forwarder(),
        InstallConfig {
            module_types: vec!["os".to_string()],
            ..InstallConfig::default()
        },
    );
    let mut modules = deployment();
    modules.push(SoftwareModule {
        name: "bootloader".to_string(),
        version: "2.0".to_string(),
        module_type: "os".to_string(),
        artifacts: vec![ModuleArtifact {
            package: "uboot".to_string(),
            artifact: ArtifactDescriptor::new("uboot-2.0.img", "/data/uboot-2.0.img", 0),
        }],
    });

    let result = updater.apply(&modules);

    assert!(result.success);
    assert_eq!(
        result.details,
        vec!["ota-4.0.zip (system) installed", "uboot-2.0.img (uboot) installed"]
    );
}
