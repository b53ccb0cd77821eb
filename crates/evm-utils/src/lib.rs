#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! # DIMP EVM Utils

/// Error type.
pub mod error;

/// Exchange contract ABI.
pub mod contract;

/// Exchange log decoding.
pub mod log;

/// Fee estimation.
pub mod fee;

/// Chain client.
pub mod client;

/// In-memory chain for tests.
#[cfg(feature = "mock")]
pub mod mock;

pub use crate::{
    client::{ChainClient, ContractCall},
    error::Error,
    fee::FeeEstimate,
    log::{ExchangeLog, RawLog},
};

#[cfg(feature = "client")]
pub use crate::client::provider::{AlloyChainClient, ClientOptions};

#[cfg(feature = "mock")]
pub use crate::mock::MockChainClient;

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use alloy;
