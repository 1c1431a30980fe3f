//! Applies a deployment against the simulated package installer.
//!
//! Useful to exercise the whole update workflow on a development machine: install sessions,
//! notification routing, the update report and the forwarded status messages.
#![warn(missing_docs)]
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use update_agent::command::{Command, RunContext};
use update_agent::event::StatusMessage;
use update_agent::event::channel::{EventConsumer, pub_sub};
use update_agent::forwarder::ChannelStatusForwarder;
use update_agent::installer::dispatcher::NotificationDispatcher;
use update_agent::installer::simulated::SimulatedInstaller;
use update_agent::installer::status::StatusCode;
use update_agent::update_state::UpdateState;
use update_agent::updater::Updater;
use update_agent::utils::threads::spawn_named_thread;

fn main() -> ExitCode {
    Command::run(_main)
}

/// This is the actual main function.
///
/// It is separated from [main] to allow propagating the errors and log them in a string format.
fn _main(run_context: RunContext) -> Result<bool, Box<dyn Error>> {
    let RunContext {
        config,
        deployment,
        simulation,
    } = run_context;

    let (notification_publisher, notification_consumer) = pub_sub();
    let (status_publisher, status_consumer) = pub_sub();

    let installer = simulation.fail_artifacts.iter().fold(
        SimulatedInstaller::new(notification_publisher)
            .with_delay(simulation.delay)
            .with_duplicate_notifications(simulation.duplicate_notifications),
        |installer, filename| installer.with_script(filename.clone(), vec![StatusCode::FAILURE]),
    );
    let installer = simulation
        .reject_artifacts
        .iter()
        .fold(installer, |installer, filename| {
            installer.rejecting(filename.clone())
        });

    let dispatcher = NotificationDispatcher::new();
    let listener = dispatcher.listen(notification_consumer);
    let status_printer = print_status_messages(status_consumer);

    let updater = Updater::new(
        installer,
        dispatcher,
        Arc::new(UpdateState::new()),
        Arc::new(ChannelStatusForwarder::new(status_publisher)),
        config.install,
    );
    let result = updater.apply(&deployment);

    // Dropping the updater closes the channels the background threads read from.
    drop(updater);
    listener.stop_blocking()?;
    let _ = status_printer.join();

    println!("Update {}", if result.success { "succeeded" } else { "failed" });
    result
        .details
        .iter()
        .for_each(|detail| println!("  - {detail}"));

    Ok(result.success)
}

fn print_status_messages(
    status_consumer: EventConsumer<StatusMessage>,
) -> std::thread::JoinHandle<()> {
    spawn_named_thread("status-forwarder", move || {
        status_consumer
            .as_ref()
            .iter()
            .for_each(|StatusMessage(status)| info!(%status, "status sent to the update server"));
    })
}
