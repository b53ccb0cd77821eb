use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dimp_utils::{constants::NOTIFICATION_CHANNEL_PREFIX, UserId};

use crate::envelope::{Alert, Envelope};

/// Redis pub/sub notifier.
#[cfg(redis)]
pub mod redis;

#[cfg(redis)]
pub use self::redis::RedisNotifier;

/// Channel carrying the envelopes of `user`.
pub fn notification_channel(user: UserId) -> String {
    format!("{NOTIFICATION_CHANNEL_PREFIX}{user}")
}

/// Hand-off point to the notification layer.
///
/// Delivery is best effort: callers log failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish an envelope to `user`.
    async fn publish(&self, user: UserId, envelope: &Envelope) -> crate::Result<()>;

    /// Raise an operator alert.
    async fn alert(&self, alert: &Alert) -> crate::Result<()>;
}

/// Publish and log delivery failures.
pub(crate) async fn publish_or_log(notifier: &dyn Notifier, user: UserId, envelope: &Envelope) {
    if let Err(err) = notifier.publish(user, envelope).await {
        tracing::warn!(%err, %user, "failed to publish envelope");
    }
}

/// Raise an alert and log delivery failures.
pub(crate) async fn alert_or_log(notifier: &dyn Notifier, alert: &Alert) {
    tracing::error!(user = %alert.user, message = %alert.message, "alert");
    if let Err(err) = notifier.alert(alert).await {
        tracing::warn!(%err, user = %alert.user, "failed to deliver alert");
    }
}

/// A message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// A published envelope.
    Envelope(UserId, Box<Envelope>),
    /// An alert.
    Alert(Alert),
}

/// A [`Notifier`] that keeps everything it is handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far.
    pub fn messages(&self) -> Vec<Recorded> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Envelopes recorded so far.
    pub fn envelopes(&self) -> Vec<(UserId, Envelope)> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                Recorded::Envelope(user, envelope) => Some((user, *envelope)),
                Recorded::Alert(_) => None,
            })
            .collect()
    }

    /// Alerts recorded so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                Recorded::Alert(alert) => Some(alert),
                Recorded::Envelope(..) => None,
            })
            .collect()
    }

    fn push(&self, message: Recorded) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, user: UserId, envelope: &Envelope) -> crate::Result<()> {
        self.push(Recorded::Envelope(user, Box::new(envelope.clone())));
        Ok(())
    }

    async fn alert(&self, alert: &Alert) -> crate::Result<()> {
        self.push(Recorded::Alert(alert.clone()));
        Ok(())
    }
}
