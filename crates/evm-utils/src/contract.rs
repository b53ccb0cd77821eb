use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::{SolCall, SolEvent},
};
use dimp_utils::Direction;

use crate::client::ContractCall;

/// Generated ABI bindings.
#[allow(missing_docs)]
pub mod abi {
    alloy::sol! {
        /// Emitted when tokens are deposited into the exchange contract.
        event Deposit(address indexed depositer, uint256 depositAmount);

        /// Emitted when tokens are withdrawn from the exchange contract.
        event Withdraw(address indexed withdrawer, uint256 withdrawAmount);

        /// Internal balance of an account.
        function internalBalance(address account) external view returns (uint256);

        /// Overwrite the internal balance of an account.
        function setInternalBalance(address user, uint256 amount) external;
    }
}

pub use abi::{internalBalanceCall, setInternalBalanceCall, Deposit, Withdraw};

/// Default signature hash of the event for the given direction.
pub fn event_signature(direction: Direction) -> B256 {
    match direction {
        Direction::Deposit => Deposit::SIGNATURE_HASH,
        Direction::Withdraw => Withdraw::SIGNATURE_HASH,
    }
}

/// Calldata reading the internal balance of `account`.
pub fn internal_balance_call(contract: Address, account: Address) -> ContractCall {
    ContractCall::new(
        contract,
        Bytes::from(internalBalanceCall { account }.abi_encode()),
    )
}

/// Decode the return data of `internalBalance`.
pub fn decode_internal_balance(data: &[u8]) -> crate::Result<U256> {
    Ok(internalBalanceCall::abi_decode_returns(data)?)
}

/// Calldata overwriting the internal balance of `user`.
pub fn set_internal_balance_call(contract: Address, user: Address, amount: U256) -> ContractCall {
    ContractCall::new(
        contract,
        Bytes::from(setInternalBalanceCall { user, amount }.abi_encode()),
    )
}
