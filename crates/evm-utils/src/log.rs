use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolEvent,
};
use dimp_utils::Direction;

use crate::contract::{event_signature, Deposit, Withdraw};

/// A log emitted by the exchange contract, as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Topics, signature first.
    pub topics: Vec<B256>,
    /// Non-indexed data.
    pub data: Bytes,
    /// Hash of the transaction that emitted the log.
    pub tx_hash: Option<B256>,
    /// Block containing the transaction.
    pub block_number: Option<u64>,
}

/// A decoded deposit or withdraw log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeLog {
    /// Event signature hash (topic 0).
    pub signature: B256,
    /// Depositor or withdrawer (topic 1).
    pub actor: Address,
    /// Raw contract amount.
    pub amount: U256,
    /// Transaction hash.
    pub tx_hash: B256,
    /// Block number.
    pub block_number: u64,
}

/// Log decoding error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Exchange events carry exactly the signature and the actor.
    #[error("expected 2 topics, got {0}")]
    UnexpectedTopics(usize),
    /// The payload does not match the event ABI.
    #[error("invalid event payload: {0}")]
    Abi(String),
    /// Pending logs have no transaction hash or block number.
    #[error("log is pending")]
    Pending,
}

impl RawLog {
    /// Decode as the exchange event of `direction`.
    ///
    /// Topic 0 is matched by the caller, which may watch an overridden
    /// signature; the body is decoded with the ABI of the event.
    pub fn decode(&self, direction: Direction) -> Result<ExchangeLog, DecodeError> {
        let [signature, actor] = self.topics.as_slice() else {
            return Err(DecodeError::UnexpectedTopics(self.topics.len()));
        };
        let (Some(tx_hash), Some(block_number)) = (self.tx_hash, self.block_number) else {
            return Err(DecodeError::Pending);
        };
        let topics = [event_signature(direction), *actor];
        let (actor, amount) = match direction {
            Direction::Deposit => {
                let event = Deposit::decode_raw_log(topics, &self.data)
                    .map_err(|err| DecodeError::Abi(err.to_string()))?;
                (event.depositer, event.depositAmount)
            }
            Direction::Withdraw => {
                let event = Withdraw::decode_raw_log(topics, &self.data)
                    .map_err(|err| DecodeError::Abi(err.to_string()))?;
                (event.withdrawer, event.withdrawAmount)
            }
        };
        Ok(ExchangeLog {
            signature: *signature,
            actor,
            amount,
            tx_hash,
            block_number,
        })
    }
}

#[cfg(feature = "client")]
impl From<alloy::rpc::types::Log> for RawLog {
    fn from(log: alloy::rpc::types::Log) -> Self {
        Self {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
            tx_hash: log.transaction_hash,
            block_number: log.block_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit_log(amount: u64) -> RawLog {
        let actor = Address::repeat_byte(0xab);
        RawLog {
            address: Address::repeat_byte(0x01),
            topics: vec![Deposit::SIGNATURE_HASH, actor.into_word()],
            data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
            tx_hash: Some(B256::repeat_byte(0xcd)),
            block_number: Some(42),
        }
    }

    #[test]
    fn test_decode_exchange_log() {
        let log = deposit_log(2_500_000).decode(Direction::Deposit).unwrap();
        assert_eq!(log.signature, Deposit::SIGNATURE_HASH);
        assert_eq!(log.actor, Address::repeat_byte(0xab));
        assert_eq!(log.amount, U256::from(2_500_000u64));
        assert_eq!(log.block_number, 42);
    }

    #[test]
    fn test_decode_withdraw_with_overridden_signature() {
        let mut raw = deposit_log(7);
        raw.topics[0] = B256::repeat_byte(0x77);
        let log = raw.decode(Direction::Withdraw).unwrap();
        assert_eq!(log.signature, B256::repeat_byte(0x77));
        assert_eq!(log.actor, Address::repeat_byte(0xab));
        assert_eq!(log.amount, U256::from(7u64));
    }

    #[test]
    fn test_reject_malformed_logs() {
        let mut log = deposit_log(1);
        log.topics.push(B256::ZERO);
        assert_eq!(
            log.decode(Direction::Deposit),
            Err(DecodeError::UnexpectedTopics(3))
        );

        let mut log = deposit_log(1);
        log.data = Bytes::from(vec![0u8; 3]);
        assert!(matches!(
            log.decode(Direction::Deposit),
            Err(DecodeError::Abi(_))
        ));

        let mut log = deposit_log(1);
        log.tx_hash = None;
        assert_eq!(log.decode(Direction::Deposit), Err(DecodeError::Pending));
    }
}
