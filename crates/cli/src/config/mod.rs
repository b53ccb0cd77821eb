use std::sync::Arc;

use dimp_sdk::{
    cache::RedisCache,
    evm_utils::{
        alloy::primitives::{Address, B256},
        AlloyChainClient, ClientOptions as ChainOptions,
    },
    notify::RedisNotifier,
    store::PgLedgerStore,
    utils::{
        constants::{
            DEFAULT_DRIFT_THRESHOLD, DEFAULT_POLL_INTERVAL, DEFAULT_REORG_MARGIN,
            DEFAULT_RETRY_BACKOFF, DEFAULT_SYNC_LOCK_TTL,
        },
        Decimal,
    },
    Client, ClientOptions,
};
use eyre::OptionExt;
use serde_with::{serde_as, DisplayFromStr};
use url::Url;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_DATABASE_URL: &str = "postgres://localhost/dimp";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1/";
const DEFAULT_CHAIN_ID: u64 = 137;

/// Configuration.
#[serde_as]
#[derive(Debug, clap::Args, serde::Serialize, serde::Deserialize, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the chain.
    #[arg(long, short = 'u', env, default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
    /// Chain id used to sign transactions.
    #[arg(long, env, default_value_t = DEFAULT_CHAIN_ID)]
    chain_id: u64,
    /// Lower bound of the priority fee, in wei per gas.
    #[arg(long, env)]
    min_priority_fee: Option<u64>,
    /// Hex-encoded private key of the admin account.
    ///
    /// Required by commands writing balances to the exchange contract.
    #[arg(long, env, hide_env_values = true)]
    admin_key: Option<String>,
    /// Database URL of the ledger.
    #[arg(long, env, default_value = DEFAULT_DATABASE_URL)]
    database_url: String,
    /// Redis URL of the shared cache.
    #[arg(long, env, default_value = DEFAULT_REDIS_URL)]
    redis_url: String,
    /// Exchange contract.
    #[arg(long, env)]
    exchange_contract: Option<Address>,
    /// Token held by the exchange contract.
    #[arg(long, env)]
    token_address: Option<Address>,
    /// Override the topic of the deposit event.
    #[arg(long)]
    deposit_signature: Option<B256>,
    /// Override the topic of the withdraw event.
    #[arg(long)]
    withdraw_signature: Option<B256>,
    /// Interval between two log polling passes.
    #[arg(long, env, default_value_t = humantime::Duration::from(DEFAULT_POLL_INTERVAL))]
    #[serde_as(as = "DisplayFromStr")]
    poll_interval: humantime::Duration,
    /// Backoff after a failed RPC call.
    #[arg(long, env, default_value_t = humantime::Duration::from(DEFAULT_RETRY_BACKOFF))]
    #[serde_as(as = "DisplayFromStr")]
    retry_backoff: humantime::Duration,
    /// Number of blocks re-scanned behind the chain head on start-up.
    #[arg(long, env, default_value_t = DEFAULT_REORG_MARGIN)]
    reorg_margin: u64,
    /// Drift (in DIMP) above which the contract balance is corrected.
    #[arg(long, env, default_value_t = DEFAULT_DRIFT_THRESHOLD)]
    #[serde_as(as = "DisplayFromStr")]
    drift_threshold: Decimal,
    /// TTL of the per-user sync lock.
    #[arg(long, env, default_value_t = humantime::Duration::from(DEFAULT_SYNC_LOCK_TTL))]
    #[serde_as(as = "DisplayFromStr")]
    sync_lock_ttl: humantime::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            min_priority_fee: None,
            admin_key: None,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            exchange_contract: None,
            token_address: None,
            deposit_signature: None,
            withdraw_signature: None,
            poll_interval: DEFAULT_POLL_INTERVAL.into(),
            retry_backoff: DEFAULT_RETRY_BACKOFF.into(),
            reorg_margin: DEFAULT_REORG_MARGIN,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            sync_lock_ttl: DEFAULT_SYNC_LOCK_TTL.into(),
        }
    }
}

impl Config {
    /// Database URL of the ledger.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Connect to the ledger store.
    pub async fn ledger_store(&self) -> eyre::Result<PgLedgerStore> {
        Ok(PgLedgerStore::connect(&self.database_url).await?)
    }

    /// Creates a chain client, signing with the admin key if set.
    pub fn chain_client(&self) -> eyre::Result<AlloyChainClient> {
        let rpc_url: Url = self.rpc_url.parse()?;
        let signer = self
            .admin_key
            .as_deref()
            .map(AlloyChainClient::parse_signer)
            .transpose()?;
        if signer.is_none() {
            tracing::warn!("admin key is not set, balance writes will fail");
        }
        let options = match self.min_priority_fee {
            Some(fee) => ChainOptions::builder()
                .chain_id(self.chain_id)
                .min_priority_fee(u128::from(fee))
                .build(),
            None => ChainOptions::builder().chain_id(self.chain_id).build(),
        };
        Ok(AlloyChainClient::new_with_options(rpc_url, signer, options))
    }

    /// Options of the [`Client`].
    pub fn client_options(&self) -> eyre::Result<ClientOptions> {
        Ok(ClientOptions::builder()
            .exchange_contract(
                self.exchange_contract
                    .ok_or_eyre("`exchange_contract` is not set")?,
            )
            .token_address(self.token_address.ok_or_eyre("`token_address` is not set")?)
            .drift_threshold(self.drift_threshold)
            .sync_lock_ttl(self.sync_lock_ttl.into())
            .poll_interval(self.poll_interval.into())
            .retry_backoff(self.retry_backoff.into())
            .reorg_margin(self.reorg_margin)
            .deposit_signature(self.deposit_signature)
            .withdraw_signature(self.withdraw_signature)
            .build())
    }

    /// Connects to every backend and creates a [`Client`].
    pub async fn client(&self) -> eyre::Result<Client> {
        let options = self.client_options()?;
        let chain = self.chain_client()?;
        let store = self.ledger_store().await?;
        let cache = RedisCache::connect(&self.redis_url).await?;
        let notifier = RedisNotifier::new(cache.connection());
        Ok(Client::new(
            Arc::new(store),
            Arc::new(cache),
            Arc::new(chain),
            Arc::new(notifier),
            options,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() -> eyre::Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        assert!(content.contains("poll_interval = \"5s\""));
        assert!(content.contains("drift_threshold = \"99\""));
        assert!(!content.contains("admin_key"));
        let parsed: Config = toml::from_str(&content)?;
        assert_eq!(parsed.sync_lock_ttl, config.sync_lock_ttl);
        assert_eq!(parsed.drift_threshold, config.drift_threshold);
        Ok(())
    }

    #[test]
    fn client_options_require_contract_addresses() {
        let config = Config::default();
        let err = config.client_options().unwrap_err();
        assert!(err.to_string().contains("exchange_contract"));
    }
}
