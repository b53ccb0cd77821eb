//! # DIMP SDK
//!
//! Keeps the off-chain DIMP ledger and the balances mirrored by the exchange
//! contract consistent.

#![deny(missing_docs)]

/// Error type.
pub mod error;

/// Ledger records.
pub mod model;

/// Messages handed to the notification layer.
pub mod envelope;

/// Ledger store.
pub mod store;

/// Shared key-value cache and the advisory sync lock.
pub mod cache;

/// Application config loading.
pub mod config;

/// Notification hand-off.
pub mod notify;

/// Referral statistics.
pub mod stats;

/// Multi-level referral commissions.
pub mod referral;

/// Balance reconciliation.
pub mod reconcile;

/// Chain event ingestion.
pub mod ingest;

/// User requests: sync requests and withdrawal checks.
pub mod requests;

/// Reward crediting and spending.
pub mod rewards;

/// Client.
pub mod client;


pub use error::Error;

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use client::{Client, ClientOptions};
pub use dimp_evm_utils as evm_utils;
pub use dimp_utils as utils;
