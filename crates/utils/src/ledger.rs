use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identifier of a platform user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Kind of an internal transaction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TxKind {
    /// Bonus granted by an administrator.
    Bonus,
    /// Referral commission.
    Referral,
    /// Spending from the balance.
    Spend,
    /// Reward for a completed action.
    Reward,
    /// Request to move pending rewards into the balance.
    Sync,
}

/// Status of an internal transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(into = "i16", try_from = "i16")]
#[strum(serialize_all = "snake_case")]
#[repr(i16)]
pub enum TxStatus {
    /// New, or a sync request at rest.
    #[default]
    New = 0,
    /// Requested by the user.
    Requested = 1,
    /// Approved by an administrator.
    Approved = 2,
    /// Rejected by an administrator.
    Rejected = 9,
}

impl From<TxStatus> for i16 {
    fn from(value: TxStatus) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for TxStatus {
    type Error = Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::New),
            1 => Ok(Self::Requested),
            2 => Ok(Self::Approved),
            9 => Ok(Self::Rejected),
            other => Err(Error::unknown_variant("tx status", other)),
        }
    }
}

/// Direction of an exchange contract event.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Direction {
    /// Tokens deposited into the exchange contract.
    #[strum(serialize = "in")]
    #[serde(rename = "in")]
    Deposit,
    /// Tokens withdrawn from the exchange contract.
    #[strum(serialize = "out")]
    #[serde(rename = "out")]
    Withdraw,
}

/// Token an amount is denominated in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Token {
    /// The reward token.
    #[default]
    Dimp,
    /// The activity token.
    Dact,
}

/// Referral upline level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum ReferralLevel {
    /// Direct referrer.
    #[strum(serialize = "1")]
    One = 1,
    /// Second level.
    #[strum(serialize = "2")]
    Two = 2,
    /// Third level.
    #[strum(serialize = "3")]
    Three = 3,
}

impl ReferralLevel {
    /// All levels, nearest first.
    pub const ALL: [Self; 3] = [Self::One, Self::Two, Self::Three];
}

impl From<ReferralLevel> for i16 {
    fn from(value: ReferralLevel) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for ReferralLevel {
    type Error = Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(Error::unknown_variant("referral level", other)),
        }
    }
}

/// Status of a chain transaction mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(into = "i16", try_from = "i16")]
#[strum(serialize_all = "snake_case")]
#[repr(i16)]
pub enum ChainTxStatus {
    /// The event has been observed and applied to the ledger.
    Confirmed = 1,
}

impl From<ChainTxStatus> for i16 {
    fn from(value: ChainTxStatus) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for ChainTxStatus {
    type Error = Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Confirmed),
            other => Err(Error::unknown_variant("chain tx status", other)),
        }
    }
}
