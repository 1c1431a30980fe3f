use std::thread::{JoinHandle, sleep};
use std::time::Duration;

use crate::event::cancellation::CancellationMessage;
use crate::event::channel::{EventConsumer, EventPublisher, pub_sub};
use crate::utils::threads::spawn_named_thread;

const STOP_POLL_ATTEMPTS: u16 = 20;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A worker closure together with the name of the thread it will run on.
///
/// The closure receives the consumer side of a cancellation channel and is expected to return
/// once a cancellation message arrives.
pub struct NotStartedThreadContext<F>
where
    F: FnOnce(EventConsumer<CancellationMessage>) + Send + 'static,
{
    thread_name: String,
    callback: F,
}

impl<F> NotStartedThreadContext<F>
where
    F: FnOnce(EventConsumer<CancellationMessage>) + Send + 'static,
{
    pub fn new<S: Into<String>>(thread_name: S, callback: F) -> Self {
        Self {
            thread_name: thread_name.into(),
            callback,
        }
    }

    pub fn start(self) -> StartedThreadContext {
        let (stop_publisher, stop_consumer) = pub_sub::<CancellationMessage>();
        let callback = self.callback;
        let join_handle = spawn_named_thread(&self.thread_name, move || callback(stop_consumer));

        StartedThreadContext {
            thread_name: self.thread_name,
            stop_publisher,
            join_handle,
        }
    }
}

/// Handle of a running worker thread.
pub struct StartedThreadContext {
    thread_name: String,
    stop_publisher: EventPublisher<CancellationMessage>,
    join_handle: JoinHandle<()>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThreadContextStopperError {
    #[error("error sending stop signal to '{0}' thread: {1}")]
    EventPublisherError(String, String),

    #[error("error joining '{0}' thread: {1}")]
    JoinError(String, String),

    #[error("timeout waiting for '{0}' thread to finish")]
    StopTimeout(String),
}

impl StartedThreadContext {
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Sends the stop signal and polls the thread until it finishes or the
    /// `STOP_POLL_ATTEMPTS` * `STOP_POLL_INTERVAL` budget is exhausted.
    pub fn stop(self) -> Result<(), ThreadContextStopperError> {
        self.send_stop()?;
        for _ in 0..STOP_POLL_ATTEMPTS {
            if self.join_handle.is_finished() {
                return Self::join(self.thread_name, self.join_handle);
            }
            sleep(STOP_POLL_INTERVAL);
        }
        Err(ThreadContextStopperError::StopTimeout(self.thread_name))
    }

    /// Sends the stop signal and blocks until the thread is joined.
    pub fn stop_blocking(self) -> Result<(), ThreadContextStopperError> {
        self.send_stop()?;
        Self::join(self.thread_name, self.join_handle)
    }

    fn send_stop(&self) -> Result<(), ThreadContextStopperError> {
        // A worker that already returned dropped its consumer, which is not an error here.
        if self.join_handle.is_finished() {
            return Ok(());
        }
        self.stop_publisher.publish(()).map_err(|err| {
            ThreadContextStopperError::EventPublisherError(
                self.thread_name.clone(),
                err.to_string(),
            )
        })
    }

    fn join(
        thread_name: String,
        join_handle: JoinHandle<()>,
    ) -> Result<(), ThreadContextStopperError> {
        join_handle.join().map_err(|err| {
            let reason = err
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| err.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown error".to_string());
            ThreadContextStopperError::JoinError(thread_name, reason)
        })
    }
}
