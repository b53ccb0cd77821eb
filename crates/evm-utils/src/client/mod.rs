use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::{FeeEstimate, RawLog};

/// Alloy-backed client.
#[cfg(feature = "client")]
pub mod provider;

/// A call to a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Target contract.
    pub to: Address,
    /// ABI-encoded calldata.
    pub input: Bytes,
}

impl ContractCall {
    /// Create a new call.
    pub fn new(to: Address, input: Bytes) -> Self {
        Self { to, input }
    }
}

/// Read and write access to the chain hosting the exchange contract.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current block height.
    async fn block_number(&self) -> crate::Result<u64>;

    /// Logs emitted by `contract` from `from_block` (inclusive) to the chain head.
    async fn logs(&self, contract: Address, from_block: u64) -> crate::Result<Vec<RawLog>>;

    /// Read `internalBalance(account)` from the exchange contract.
    async fn internal_balance(&self, contract: Address, account: Address) -> crate::Result<U256>;

    /// Estimate the gas limit of a call.
    async fn estimate_gas(&self, call: &ContractCall) -> crate::Result<u64>;

    /// Suggest fees for the next block.
    async fn suggest_fees(&self) -> crate::Result<FeeEstimate>;

    /// Sign and broadcast a call without waiting for confirmation.
    async fn submit(
        &self,
        call: &ContractCall,
        gas_limit: u64,
        fees: &FeeEstimate,
    ) -> crate::Result<B256>;
}
