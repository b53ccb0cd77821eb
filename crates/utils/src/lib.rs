//! Shared value types for the DIMP ledger.

#![deny(missing_docs)]

/// Error type.
pub mod error;

/// Constants.
pub mod constants;

/// Fixed-point conversions between the ledger and the exchange contract.
pub mod fixed;

/// Application configuration snapshot.
pub mod config;

/// Ledger enumerations.
pub mod ledger;

pub use error::Error;

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use rust_decimal::Decimal;

pub use self::{
    config::AppConfig,
    ledger::{ChainTxStatus, Direction, ReferralLevel, Token, TxKind, TxStatus, UserId},
};
