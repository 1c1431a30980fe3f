use crate::common::{FIRST_SESSION, Harness, gpsd, retry};
use assert_matches::assert_matches;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use update_agent::event::InstallerNotification;
use update_agent::installer::SessionId;
use update_agent::installer::dispatcher::{Delivery, DispatchResult};
use update_agent::installer::session::{FailureReason, InstallOutcome};
use update_agent::installer::status::StatusCode;
use update_agent::update_state::{PackageState, ReportEntry};

fn wait_for_subscription(harness: &Harness, session_id: SessionId) {
    retry(100, Duration::from_millis(20), || {
        if harness.dispatcher.is_subscribed(session_id) {
            Ok(())
        } else {
            Err(format!("session {session_id} is not subscribed yet").into())
        }
    });
}

#[test]
fn successful_installation_is_reported() {
    let harness = Harness::new();
    let installer = harness.installer();

    let outcome = harness.session().start(&installer, &harness.dispatcher);

    assert_matches!(outcome, InstallOutcome::Success { message } => {
        assert_eq!(message, "fw-1.2.bin (gpsd) installed");
    });
    let report = harness.update_state.snapshot();
    assert_eq!(
        report.entries(),
        &[ReportEntry::Success("fw-1.2.bin (gpsd) installed".to_string())]
    );
    assert_eq!(report.package_state(&gpsd()), Some(PackageState::Installed));
    assert_eq!(harness.forwarded(), vec!["fw-1.2.bin (gpsd) installed"]);
    assert!(!harness.dispatcher.is_subscribed(FIRST_SESSION));
}

#[test]
fn failed_installation_is_reported_with_its_status() {
    let harness = Harness::new();
    let installer = harness
        .installer()
        .with_script("fw-1.2.bin", vec![StatusCode::FAILURE_STORAGE]);

    let outcome = harness.session().start(&installer, &harness.dispatcher);

    assert_matches!(
        &outcome,
        InstallOutcome::Failure { reason: FailureReason::Status(StatusCode::FAILURE_STORAGE), message } => {
            assert!(message.contains("fw-1.2.bin"));
            assert!(message.contains("gpsd"));
            assert!(message.contains(&StatusCode::FAILURE_STORAGE.to_string()));
        }
    );
    let report = harness.update_state.snapshot();
    assert_eq!(report.entries(), &[ReportEntry::Failure(outcome.message().to_string())]);
    assert_eq!(report.package_state(&gpsd()), Some(PackageState::Failed));
    assert_eq!(harness.forwarded(), vec![outcome.message().to_string()]);
}

#[test]
fn notification_of_another_session_does_not_release_the_install() {
    let harness = Harness::new();
    let installer = harness.installer().with_script("fw-1.2.bin", vec![]);

    thread::scope(|scope| {
        let install = scope.spawn(|| harness.session().start(&installer, &harness.dispatcher));
        wait_for_subscription(&harness, FIRST_SESSION);

        harness
            .notifications
            .publish(InstallerNotification::install_complete(
                SessionId::new(99),
                StatusCode::SUCCESS,
            ))
            .unwrap();
        thread::sleep(Duration::from_millis(200));

        assert!(!install.is_finished());
        assert!(harness.update_state.snapshot().is_empty());
        assert!(harness.forwarded().is_empty());

        harness
            .notifications
            .publish(InstallerNotification::install_complete(
                FIRST_SESSION,
                StatusCode::SUCCESS,
            ))
            .unwrap();
        assert!(install.join().unwrap().is_success());
    });

    assert_eq!(harness.update_state.snapshot().entries().len(), 1);
}

#[test]
fn duplicated_notification_is_reported_once() {
    let harness = Harness::new();
    let installer = harness.installer().with_script("fw-1.2.bin", vec![]);
    let notification = InstallerNotification::install_complete(FIRST_SESSION, StatusCode::SUCCESS);

    let outcome = thread::scope(|scope| {
        let install = scope.spawn(|| harness.session().start(&installer, &harness.dispatcher));
        wait_for_subscription(&harness, FIRST_SESSION);

        assert_eq!(
            harness.dispatcher.dispatch(&notification),
            DispatchResult::Delivered(Delivery::Concluded)
        );
        assert_eq!(
            harness.dispatcher.dispatch(&notification),
            DispatchResult::NoSubscriber
        );
        install.join().unwrap()
    });

    assert!(outcome.is_success());
    assert_eq!(harness.update_state.snapshot().entries().len(), 1);
    assert_eq!(harness.forwarded().len(), 1);
}

#[test]
fn concurrent_duplicates_conclude_the_session_once() {
    const DUPLICATES: usize = 8;

    for _ in 0..20 {
        let harness = Harness::new();
        let installer = harness.installer().with_script("fw-1.2.bin", vec![]);
        let notification =
            InstallerNotification::install_complete(FIRST_SESSION, StatusCode::SUCCESS);
        let barrier = Barrier::new(DUPLICATES);

        let (outcome, results) = thread::scope(|scope| {
            let install = scope.spawn(|| harness.session().start(&installer, &harness.dispatcher));
            wait_for_subscription(&harness, FIRST_SESSION);

            let (dispatcher, barrier, notification) = (&harness.dispatcher, &barrier, &notification);
            let dispatchers: Vec<_> = (0..DUPLICATES)
                .map(|_| {
                    scope.spawn(move || {
                        barrier.wait();
                        dispatcher.dispatch(notification)
                    })
                })
                .collect();
            let results: Vec<DispatchResult> = dispatchers
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect();
            (install.join().unwrap(), results)
        });

        assert!(outcome.is_success());
        assert_eq!(
            results
                .iter()
                .filter(|result| **result == DispatchResult::Delivered(Delivery::Concluded))
                .count(),
            1
        );
        assert!(results.iter().all(|result| matches!(
            result,
            DispatchResult::NoSubscriber
                | DispatchResult::Delivered(Delivery::Concluded | Delivery::Ignored)
        )));
        assert_eq!(harness.update_state.snapshot().entries().len(), 1);
        assert_eq!(harness.forwarded().len(), 1);
        assert_eq!(harness.dispatcher.subscription_count(), 0);
    }
}

#[test]
fn installer_publishing_duplicates_is_reported_once() {
    let harness = Harness::new();
    let installer = harness.installer().with_duplicate_notifications(true);

    let outcome = harness.session().start(&installer, &harness.dispatcher);
    // let the duplicate go through the dispatcher
    thread::sleep(Duration::from_millis(100));

    assert!(outcome.is_success());
    assert_eq!(harness.update_state.snapshot().entries().len(), 1);
    assert_eq!(harness.forwarded().len(), 1);
}

#[test]
fn rejected_submission_fails_without_subscribing() {
    let harness = Harness::new();
    let installer = harness.installer().rejecting("fw-1.2.bin");

    let outcome = harness.session().start(&installer, &harness.dispatcher);

    assert_matches!(
        &outcome,
        InstallOutcome::Failure { reason: FailureReason::Rejected(_), message } => {
            assert!(message.contains("fw-1.2.bin"));
        }
    );
    assert_eq!(harness.dispatcher.subscription_count(), 0);
    let report = harness.update_state.snapshot();
    assert!(report.has_failures());
    assert_eq!(report.package_state(&gpsd()), Some(PackageState::Failed));
}

#[test]
fn silent_installer_times_out() {
    let harness = Harness::new();
    let installer = harness.installer().with_script("fw-1.2.bin", vec![]);

    let outcome = harness
        .session()
        .with_timeout(Some(Duration::from_millis(100)))
        .start(&installer, &harness.dispatcher);

    assert_matches!(&outcome, InstallOutcome::TimedOut { message } => {
        assert_eq!(message, "Installation of fw-1.2.bin (gpsd) timed out after 100ms");
    });
    assert_eq!(harness.forwarded(), vec![outcome.message().to_string()]);
    assert_eq!(
        harness.update_state.snapshot().package_state(&gpsd()),
        Some(PackageState::Failed)
    );
    assert_eq!(
        harness
            .dispatcher
            .dispatch(&InstallerNotification::install_complete(
                FIRST_SESSION,
                StatusCode::SUCCESS
            )),
        DispatchResult::NoSubscriber
    );
    assert_eq!(harness.update_state.snapshot().entries().len(), 1);
}
