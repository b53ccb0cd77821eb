use async_trait::async_trait;
use dimp_utils::UserId;
use redis::aio::ConnectionManager;

use super::{notification_channel, Notifier};
use crate::envelope::{Alert, Envelope};

/// Channel receiving operator alerts.
pub const ALERT_CHANNEL: &str = "alerts";

/// A [`Notifier`] publishing JSON envelopes over Redis pub/sub.
#[derive(Clone)]
pub struct RedisNotifier {
    conn: ConnectionManager,
}

impl RedisNotifier {
    /// Create from a connection.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn send(&self, channel: &str, payload: String) -> crate::Result<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        tracing::debug!(channel, receivers, "published");
        Ok(())
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, user: UserId, envelope: &Envelope) -> crate::Result<()> {
        self.send(&notification_channel(user), envelope.to_json()?)
            .await
    }

    async fn alert(&self, alert: &Alert) -> crate::Result<()> {
        self.send(ALERT_CHANNEL, serde_json::to_string(alert)?)
            .await
    }
}
