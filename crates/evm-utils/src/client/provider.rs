use alloy::{
    eips::BlockNumberOrTag,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{contract, ChainClient, ContractCall, FeeEstimate, RawLog};

const POLYGON_CHAIN_ID: u64 = 137;

/// Options for [`AlloyChainClient`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ClientOptions {
    /// Chain id used to sign transactions.
    #[builder(default = POLYGON_CHAIN_ID)]
    chain_id: u64,
    /// Lower bound of the priority fee, in wei per gas.
    #[builder(default, setter(strip_option))]
    min_priority_fee: Option<u128>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A [`ChainClient`] backed by an alloy HTTP provider.
pub struct AlloyChainClient {
    provider: DynProvider,
    has_signer: bool,
    options: ClientOptions,
}

impl std::fmt::Debug for AlloyChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyChainClient")
            .field("has_signer", &self.has_signer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AlloyChainClient {
    /// Create a read-only client.
    pub fn new(rpc_url: Url) -> Self {
        Self::new_with_options(rpc_url, None, ClientOptions::default())
    }

    /// Create a client, signing with `signer` when provided.
    pub fn new_with_options(
        rpc_url: Url,
        signer: Option<PrivateKeySigner>,
        options: ClientOptions,
    ) -> Self {
        let has_signer = signer.is_some();
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(rpc_url)
                .erased(),
            None => ProviderBuilder::new().connect_http(rpc_url).erased(),
        };
        Self {
            provider,
            has_signer,
            options,
        }
    }

    /// Parse a hex-encoded private key.
    pub fn parse_signer(key: &str) -> crate::Result<PrivateKeySigner> {
        key.trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|err: alloy::signers::local::LocalSignerError| {
                crate::Error::Signer(err.to_string())
            })
    }

    /// Get the underlying provider.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    fn request(call: &ContractCall) -> TransactionRequest {
        TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.input.clone())
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn block_number(&self) -> crate::Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn logs(&self, contract: Address, from_block: u64) -> crate::Result<Vec<RawLog>> {
        let filter = Filter::new().address(contract).from_block(from_block);
        let logs = self.provider.get_logs(&filter).await?;
        tracing::trace!(%contract, from_block, len = logs.len(), "fetched logs");
        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    async fn internal_balance(&self, contract: Address, account: Address) -> crate::Result<U256> {
        let call = contract::internal_balance_call(contract, account);
        let output = self.provider.call(Self::request(&call)).await?;
        contract::decode_internal_balance(&output)
    }

    async fn estimate_gas(&self, call: &ContractCall) -> crate::Result<u64> {
        Ok(self.provider.estimate_gas(Self::request(call)).await?)
    }

    async fn suggest_fees(&self) -> crate::Result<FeeEstimate> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or(crate::Error::Missing("latest block"))?;
        let base_fee = block
            .header
            .base_fee_per_gas
            .ok_or(crate::Error::Missing("base fee"))?;
        let priority_fee = self.provider.get_max_priority_fee_per_gas().await?;
        Ok(FeeEstimate::new(base_fee.into(), priority_fee)
            .with_min_priority_fee(self.options.min_priority_fee))
    }

    async fn submit(
        &self,
        call: &ContractCall,
        gas_limit: u64,
        fees: &FeeEstimate,
    ) -> crate::Result<B256> {
        if !self.has_signer {
            return Err(crate::Error::SignerNotConfigured);
        }
        let request = Self::request(call)
            .with_chain_id(self.options.chain_id)
            .with_gas_limit(gas_limit)
            .with_max_fee_per_gas(fees.max_fee_per_gas()?)
            .with_max_priority_fee_per_gas(fees.priority_fee());
        let pending = self.provider.send_transaction(request).await?;
        let hash = *pending.tx_hash();
        tracing::debug!(%hash, to = %call.to, gas_limit, "submitted transaction");
        Ok(hash)
    }
}
