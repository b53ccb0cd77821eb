use dimp_evm_utils::alloy::primitives::Address;
use dimp_utils::{AppConfig, Decimal, UserId};
use serde::{Deserialize, Serialize};

use crate::{model::User, stats::ReferralStats};

/// Kind of message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Target {
    /// Fresh balances.
    Sync,
    /// User-facing notification.
    Notify,
    /// Operator alert.
    Alert,
}

/// Summary of a user sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    /// Identifier.
    pub id: UserId,
    /// Spendable balance.
    #[serde(rename = "dimp")]
    pub balance: Decimal,
    /// Pending rewards.
    pub rewards: Decimal,
    /// DACT balance.
    pub dact: Decimal,
    /// Lifetime DIMP earned.
    pub dimp_earned: Decimal,
    /// Lifetime DIMP spent.
    pub dimp_spent: Decimal,
    /// Bound address.
    pub address: Option<Address>,
    /// Login hash.
    pub hash: String,
    /// Referral slug.
    pub ref_slug: String,
    /// Completed actions.
    #[serde(rename = "quests_completed")]
    pub actions: i64,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            balance: user.buffer,
            rewards: user.rewards,
            dact: user.dact_earned,
            dimp_earned: user.dimp_earned,
            dimp_spent: user.dimp_spent,
            address: user.address,
            hash: user.hash.clone(),
            ref_slug: user.ref_slug.clone(),
            actions: user.actions,
        }
    }
}

/// Payload of a user-facing notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Identifier.
    pub id: i64,
    /// Component style: `success`, `warning`, `error` or `info`.
    pub style: String,
    /// Notification type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message.
    pub message: String,
    /// Link.
    pub url: String,
    /// Related task.
    pub task_id: i64,
    /// DIMP amount.
    pub dimp: Decimal,
    /// Contribution rating in `[0, 1]`.
    pub rating: Decimal,
}

/// Message handed to the notification layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Target.
    pub target: Target,
    /// User summary.
    pub user: UserData,
    /// Referral statistics.
    pub referral_stats: ReferralStats,
    /// Optional notification payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
    /// Config snapshot.
    pub app_config: AppConfig,
}

impl Envelope {
    /// Create a [`Target::Sync`] envelope.
    pub fn sync(user: &User, referral_stats: ReferralStats, app_config: &AppConfig) -> Self {
        Self {
            target: Target::Sync,
            user: user.into(),
            referral_stats,
            data: None,
            app_config: app_config.clone(),
        }
    }

    /// Attach a notification payload and retarget to [`Target::Notify`].
    pub fn with_notification(mut self, data: NotificationData) -> Self {
        self.target = Target::Notify;
        self.data = Some(data);
        self
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Operator alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Target, always [`Target::Alert`].
    pub target: Target,
    /// Affected user.
    pub user: UserId,
    /// Message.
    pub message: String,
}

impl Alert {
    /// Create an alert.
    pub fn new(user: UserId, message: impl ToString) -> Self {
        Self {
            target: Target::Alert,
            user,
            message: message.to_string(),
        }
    }
}
