use std::{sync::Arc, time::Duration};

use dimp_evm_utils::{
    alloy::primitives::{Address, B256},
    ChainClient,
};
use dimp_utils::{
    constants::{
        DEFAULT_DRIFT_THRESHOLD, DEFAULT_POLL_INTERVAL, DEFAULT_REORG_MARGIN,
        DEFAULT_RETRY_BACKOFF, DEFAULT_SYNC_LOCK_TTL,
    },
    AppConfig, Decimal, Direction, TxKind, UserId,
};
use typed_builder::TypedBuilder;

use crate::{
    cache::KeyValueCache,
    config::ConfigLoader,
    envelope::UserData,
    ingest::{EventWatcher, WatcherOptions},
    model::InternalTransaction,
    notify::Notifier,
    reconcile::{ReconcileOptions, Reconciler, SyncReport},
    referral::ReferralDistributor,
    requests,
    rewards::{self, Credit},
    stats::{self, ReferralPage, ReferralStats},
    store::LedgerStore,
};

/// Options for [`Client`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ClientOptions {
    exchange_contract: Address,
    token_address: Address,
    #[builder(default = DEFAULT_DRIFT_THRESHOLD)]
    drift_threshold: Decimal,
    #[builder(default = DEFAULT_SYNC_LOCK_TTL)]
    sync_lock_ttl: Duration,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,
    #[builder(default = DEFAULT_RETRY_BACKOFF)]
    retry_backoff: Duration,
    #[builder(default = DEFAULT_REORG_MARGIN)]
    reorg_margin: u64,
    #[builder(default)]
    deposit_signature: Option<B256>,
    #[builder(default)]
    withdraw_signature: Option<B256>,
}

impl ClientOptions {
    /// Exchange contract.
    pub fn exchange_contract(&self) -> Address {
        self.exchange_contract
    }

    /// Token held by the exchange contract.
    pub fn token_address(&self) -> Address {
        self.token_address
    }

    fn watcher_options(&self, direction: Direction) -> WatcherOptions {
        let signature = match direction {
            Direction::Deposit => self.deposit_signature,
            Direction::Withdraw => self.withdraw_signature,
        };
        let mut options = WatcherOptions::builder()
            .exchange_contract(self.exchange_contract)
            .token_address(self.token_address)
            .poll_interval(self.poll_interval)
            .retry_backoff(self.retry_backoff)
            .reorg_margin(self.reorg_margin)
            .build();
        options.signature = signature;
        options
    }
}

/// Entry point wiring the ledger store, the cache, the chain and the
/// notification layer together.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn KeyValueCache>,
    chain: Arc<dyn ChainClient>,
    options: ClientOptions,
    config: ConfigLoader,
    reconciler: Reconciler,
    referral: ReferralDistributor,
}

impl Client {
    /// Create a new [`Client`].
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<dyn KeyValueCache>,
        chain: Arc<dyn ChainClient>,
        notifier: Arc<dyn Notifier>,
        options: ClientOptions,
    ) -> Self {
        let reconciler = Reconciler::new(
            store.clone(),
            cache.clone(),
            chain.clone(),
            notifier,
            ReconcileOptions::builder()
                .exchange_contract(options.exchange_contract)
                .drift_threshold(options.drift_threshold)
                .lock_ttl(options.sync_lock_ttl)
                .build(),
        );
        Self {
            config: ConfigLoader::new(cache.clone()),
            referral: ReferralDistributor::new(store.clone()),
            reconciler,
            store,
            cache,
            chain,
            options,
        }
    }

    /// Get the ledger store.
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Get the cache.
    pub fn cache(&self) -> &Arc<dyn KeyValueCache> {
        &self.cache
    }

    /// Get the chain client.
    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    /// Get the options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Get the app config loader.
    pub fn config_loader(&self) -> &ConfigLoader {
        &self.config
    }

    /// Get the reconciler.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Get the referral distributor.
    pub fn referral_distributor(&self) -> &ReferralDistributor {
        &self.referral
    }

    /// Create the event watcher of `direction`.
    pub fn event_watcher(&self, direction: Direction) -> EventWatcher {
        EventWatcher::new(
            direction,
            self.store.clone(),
            self.chain.clone(),
            self.reconciler.clone(),
            self.config.clone(),
            self.options.watcher_options(direction),
        )
    }

    /// Load the current app config.
    pub async fn app_config(&self) -> crate::Result<AppConfig> {
        self.config.load().await
    }

    /// Merge approved rewards of `user` and reconcile the on-chain balance.
    pub async fn sync(&self, user: UserId) -> crate::Result<SyncReport> {
        let config = self.app_config().await?;
        self.reconciler.sync(user, &config).await
    }

    /// File a sync request.
    pub async fn request_sync(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> crate::Result<InternalTransaction> {
        let config = self.app_config().await?;
        requests::request_sync(self.store.as_ref(), user, amount, &config).await
    }

    /// Approve the pending sync request of `user`.
    pub async fn approve_sync_request(
        &self,
        user: UserId,
        admin: Option<UserId>,
    ) -> crate::Result<InternalTransaction> {
        requests::approve_sync_request(self.store.as_ref(), user, admin).await
    }

    /// Reject the pending sync request of `user`.
    pub async fn reject_sync_request(
        &self,
        user: UserId,
        admin: Option<UserId>,
    ) -> crate::Result<InternalTransaction> {
        requests::reject_sync_request(self.store.as_ref(), user, admin).await
    }

    /// Check whether `user` may withdraw `amount`.
    pub async fn check_withdrawal(&self, user: UserId, amount: Decimal) -> crate::Result<UserData> {
        let config = self.app_config().await?;
        requests::check_withdrawal(self.store.as_ref(), user, amount, &config).await
    }

    /// Credit a reward or a bonus.
    pub async fn credit(
        &self,
        user: UserId,
        kind: TxKind,
        dimp: Decimal,
        dact: Decimal,
    ) -> crate::Result<Credit> {
        let config = self.app_config().await?;
        rewards::credit(
            self.store.as_ref(),
            &self.referral,
            &config,
            user,
            kind,
            dimp,
            dact,
        )
        .await
    }

    /// Spend from the balance.
    pub async fn spend(
        &self,
        user: UserId,
        amount: Decimal,
        note: Option<String>,
    ) -> crate::Result<InternalTransaction> {
        rewards::spend(self.store.as_ref(), user, amount, note).await
    }

    /// Referral statistics of `user`.
    pub async fn referral_stats(&self, user: UserId) -> crate::Result<ReferralStats> {
        stats::referral_stats(self.store.as_ref(), user).await
    }

    /// A page of the referrals of `user`, most recent first.
    pub async fn referral_page(
        &self,
        user: UserId,
        page: usize,
        size: usize,
    ) -> crate::Result<ReferralPage> {
        stats::referral_page(self.store.as_ref(), user, page, size).await
    }
}
