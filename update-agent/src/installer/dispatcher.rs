//! Routing of installer notifications to the sessions waiting for them.
//!
//! The installer broadcasts its notifications process-wide. The [`NotificationDispatcher`] keeps
//! a subscription table keyed by [`SessionId`] so every notification reaches at most one handler,
//! and drops the subscription as soon as that handler reports its session concluded.
use crossbeam::select;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, trace};

use super::SessionId;
use crate::event::InstallerNotification;
use crate::event::cancellation::CancellationMessage;
use crate::event::channel::EventConsumer;
use crate::utils::thread_context::{NotStartedThreadContext, StartedThreadContext};

const THREAD_NAME: &str = "installer-notifications";

/// What a handler did with a notification routed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Not meant for the handler, or the handler already concluded.
    Ignored,
    /// Consumed, but the session keeps waiting for a terminal status.
    Pending,
    /// The session reached its terminal state with this notification.
    Concluded,
}

/// Receives the notifications of one session.
pub trait NotificationHandler: Send + Sync {
    fn handle(&self, notification: &InstallerNotification) -> Delivery;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    NoSubscriber,
    Delivered(Delivery),
}

#[derive(Debug, Error, PartialEq)]
pub enum DispatcherError {
    #[error("session `{0}` already has a subscriber")]
    AlreadySubscribed(SessionId),
    #[error("cannot subscribe to invalid session `{0}`")]
    InvalidSession(SessionId),
}

struct Subscriber {
    token: u64,
    handler: Arc<dyn NotificationHandler>,
}

#[derive(Default)]
struct Subscriptions {
    next_token: AtomicU64,
    table: Mutex<HashMap<SessionId, Subscriber>>,
}

/// Publish/subscribe table between the installer notifications and the open sessions.
///
/// Cloning the dispatcher yields a handle to the same table.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    subscriptions: Arc<Subscriptions>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` as the receiver of the notifications of `session_id`.
    ///
    /// The returned [`Subscription`] removes the registration when dropped, unless the dispatcher
    /// already removed it after the session concluded.
    pub fn subscribe(
        &self,
        session_id: SessionId,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<Subscription, DispatcherError> {
        if !session_id.is_valid() {
            return Err(DispatcherError::InvalidSession(session_id));
        }
        let token = self.subscriptions.next_token.fetch_add(1, Ordering::Relaxed);
        let mut table = self.table();
        if table.contains_key(&session_id) {
            return Err(DispatcherError::AlreadySubscribed(session_id));
        }
        table.insert(session_id, Subscriber { token, handler });
        debug!(%session_id, "subscribed to installer notifications");

        Ok(Subscription {
            dispatcher: self.clone(),
            session_id,
            token,
        })
    }

    /// Routes a notification to the subscriber of its session, if any.
    ///
    /// The table lock is not held while the handler runs. When the handler concludes its session
    /// the subscription is removed, at most once even if duplicates are dispatched concurrently.
    pub fn dispatch(&self, notification: &InstallerNotification) -> DispatchResult {
        let session_id = notification.session_id;
        let Some((token, handler)) = self
            .table()
            .get(&session_id)
            .map(|subscriber| (subscriber.token, subscriber.handler.clone()))
        else {
            trace!(%session_id, "ignoring notification for a session without subscriber");
            return DispatchResult::NoSubscriber;
        };

        let delivery = handler.handle(notification);
        if delivery == Delivery::Concluded {
            self.remove(session_id, token);
        }
        DispatchResult::Delivered(delivery)
    }

    pub fn is_subscribed(&self, session_id: SessionId) -> bool {
        self.table().contains_key(&session_id)
    }

    pub fn subscription_count(&self) -> usize {
        self.table().len()
    }

    /// Dispatches every notification received on `notifications` from a dedicated thread.
    ///
    /// The thread ends when it is stopped through the returned context or when every publisher
    /// of the channel is dropped.
    pub fn listen(
        &self,
        notifications: EventConsumer<InstallerNotification>,
    ) -> StartedThreadContext {
        let dispatcher = self.clone();
        NotStartedThreadContext::new(
            THREAD_NAME,
            move |stop_consumer: EventConsumer<CancellationMessage>| loop {
                select! {
                    recv(notifications.as_ref()) -> notification => {
                        let Ok(notification) = notification else {
                            debug!("installer notification channel closed");
                            break;
                        };
                        trace!(
                            session_id = %notification.session_id,
                            status = %notification.status,
                            "installer notification received"
                        );
                        dispatcher.dispatch(&notification);
                    },
                    recv(stop_consumer.as_ref()) -> _ => {
                        debug!("stopping installer notification dispatcher");
                        break;
                    },
                }
            },
        )
        .start()
    }

    /// Removes the entry of `session_id` only if it still belongs to the subscription `token`.
    fn remove(&self, session_id: SessionId, token: u64) -> bool {
        let mut table = self.table();
        match table.get(&session_id) {
            Some(subscriber) if subscriber.token == token => {
                table.remove(&session_id);
                debug!(%session_id, "unsubscribed from installer notifications");
                true
            }
            _ => false,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, Subscriber>> {
        self.subscriptions
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration of a handler in a [`NotificationDispatcher`].
pub struct Subscription {
    dispatcher: NotificationDispatcher,
    session_id: SessionId,
    token: u64,
}

impl Subscription {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Removes the registration. Returns `false` if it was already gone.
    pub fn cancel(self) -> bool {
        self.dispatcher.remove(self.session_id, self.token)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispatcher.remove(self.session_id, self.token);
    }
}
