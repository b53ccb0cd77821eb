use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use alloy::{
    primitives::{keccak256, Address, B256, U256},
    sol_types::SolCall,
};
use async_trait::async_trait;

use crate::{
    contract::setInternalBalanceCall, ChainClient, ContractCall, Error, FeeEstimate, RawLog,
};

/// A transaction accepted by [`MockChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Submitted call.
    pub call: ContractCall,
    /// Gas limit.
    pub gas_limit: u64,
    /// Fees.
    pub fees: FeeEstimate,
    /// Returned hash.
    pub hash: B256,
}

#[derive(Debug, Default)]
struct State {
    height: u64,
    logs: Vec<RawLog>,
    balances: HashMap<Address, U256>,
    submissions: Vec<Submission>,
    failures: usize,
    halted: bool,
}

/// An in-memory chain with a single exchange contract.
///
/// Submitted `setInternalBalance` calls are applied immediately.
#[derive(Debug)]
pub struct MockChainClient {
    state: Mutex<State>,
    gas: u64,
    fees: FeeEstimate,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            state: Mutex::default(),
            gas: 50_000,
            fees: FeeEstimate::new(30_000_000_000, 1_500_000_000),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the chain height.
    pub fn set_height(&self, height: u64) {
        self.state().height = height;
    }

    /// Append a log and move the head to its block.
    pub fn push_log(&self, log: RawLog) {
        let mut state = self.state();
        if let Some(block) = log.block_number {
            state.height = state.height.max(block);
        }
        state.logs.push(log);
    }

    /// Set the internal balance of `account`.
    pub fn set_internal_balance(&self, account: Address, amount: U256) {
        self.state().balances.insert(account, amount);
    }

    /// Internal balance of `account`.
    pub fn balance_of(&self, account: Address) -> U256 {
        self.state()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    /// Make the next `count` RPC calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state().failures = count;
    }

    /// Make every later RPC call fail with an error that is not retried.
    pub fn halt(&self) {
        self.state().halted = true;
    }

    /// Transactions submitted so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    fn check_failure(&self) -> crate::Result<()> {
        let mut state = self.state();
        if state.halted {
            return Err(Error::Abi(alloy::sol_types::Error::custom("chain halted")));
        }
        if state.failures > 0 {
            state.failures -= 1;
            return Err(Error::Missing("injected rpc failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn block_number(&self) -> crate::Result<u64> {
        self.check_failure()?;
        Ok(self.state().height)
    }

    async fn logs(&self, contract: Address, from_block: u64) -> crate::Result<Vec<RawLog>> {
        self.check_failure()?;
        Ok(self
            .state()
            .logs
            .iter()
            .filter(|log| log.address == contract)
            .filter(|log| log.block_number.is_some_and(|block| block >= from_block))
            .cloned()
            .collect())
    }

    async fn internal_balance(&self, _contract: Address, account: Address) -> crate::Result<U256> {
        self.check_failure()?;
        Ok(self.balance_of(account))
    }

    async fn estimate_gas(&self, _call: &ContractCall) -> crate::Result<u64> {
        self.check_failure()?;
        Ok(self.gas)
    }

    async fn suggest_fees(&self) -> crate::Result<FeeEstimate> {
        self.check_failure()?;
        Ok(self.fees)
    }

    async fn submit(
        &self,
        call: &ContractCall,
        gas_limit: u64,
        fees: &FeeEstimate,
    ) -> crate::Result<B256> {
        self.check_failure()?;
        let decoded = setInternalBalanceCall::abi_decode(&call.input)?;
        let mut state = self.state();
        let hash = keccak256((state.submissions.len() as u64).to_be_bytes());
        state.balances.insert(decoded.user, decoded.amount);
        state.submissions.push(Submission {
            call: call.clone(),
            gas_limit,
            fees: *fees,
            hash,
        });
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::set_internal_balance_call;

    #[tokio::test]
    async fn test_submit_applies_balance() -> eyre::Result<()> {
        let chain = MockChainClient::new();
        let contract = Address::repeat_byte(1);
        let user = Address::repeat_byte(2);
        let call = set_internal_balance_call(contract, user, U256::from(7u64));
        let fees = chain.suggest_fees().await?;
        let gas = chain.estimate_gas(&call).await?;
        chain.submit(&call, gas, &fees).await?;
        assert_eq!(chain.internal_balance(contract, user).await?, U256::from(7u64));
        assert_eq!(chain.submissions().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failures() -> eyre::Result<()> {
        let chain = MockChainClient::new();
        chain.fail_next(1);
        assert!(chain.block_number().await.is_err());
        assert_eq!(chain.block_number().await?, 0);

        chain.halt();
        let err = chain.block_number().await.unwrap_err();
        assert!(!err.is_transient());
        Ok(())
    }
}
