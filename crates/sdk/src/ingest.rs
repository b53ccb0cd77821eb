use std::{future::Future, sync::Arc, time::Duration};

use dimp_evm_utils::{
    alloy::primitives::{Address, B256},
    contract::event_signature,
    ChainClient, ExchangeLog, RawLog,
};
use dimp_utils::{
    constants::{DEFAULT_POLL_INTERVAL, DEFAULT_REORG_MARGIN, DEFAULT_RETRY_BACKOFF},
    fixed::contract_amount_to_decimal,
    ChainTxStatus, Decimal, Direction, UserId,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::Instrument;
use typed_builder::TypedBuilder;

use crate::{
    cache::SyncLock,
    config::ConfigLoader,
    model::ChainTransaction,
    reconcile::{Reconciler, SyncReport},
    store::LedgerStore,
};

/// Options of [`EventWatcher`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct WatcherOptions {
    /// Exchange contract emitting the events.
    pub exchange_contract: Address,
    /// Token held by the exchange contract, recorded on the mirrors.
    pub token_address: Address,
    /// Event signature override.
    #[builder(default, setter(strip_option))]
    pub signature: Option<B256>,
    /// Delay between passes.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// Delay before retrying after a failed pass.
    #[builder(default = DEFAULT_RETRY_BACKOFF)]
    pub retry_backoff: Duration,
    /// Number of blocks re-scanned behind the head on start.
    #[builder(default = DEFAULT_REORG_MARGIN)]
    pub reorg_margin: u64,
}

/// First block of the next scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    from_block: u64,
}

impl Checkpoint {
    /// Start scanning from `from_block`.
    pub fn new(from_block: u64) -> Self {
        Self { from_block }
    }

    /// First block of the next scan.
    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    fn advance(&mut self, block: u64) {
        self.from_block = self.from_block.max(block);
    }
}

/// Why a log was refused for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    /// The amount is zero.
    NonPositiveAmount,
    /// The withdrawal exceeds the ledger balance.
    InsufficientBalance,
}

/// Outcome of applying one exchange log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The ledger has been updated.
    Applied {
        /// Owner.
        user: UserId,
        /// Ledger amount.
        amount: Decimal,
    },
    /// The transaction hash has already been recorded.
    AlreadyProcessed,
    /// No user is bound to the actor.
    UnknownAccount,
    /// Refused without touching the ledger. Retrying cannot change the result.
    Rejected(RejectReason),
    /// A balance write for the user is in flight; the log is retried by a later pass.
    UserSyncing,
}

impl ApplyOutcome {
    /// Whether the checkpoint may move to the block of the log.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Applied { .. } | Self::AlreadyProcessed | Self::UnknownAccount
        )
    }

    /// Whether the log has to be applied by a later pass.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UserSyncing)
    }
}

/// Counters of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Applied logs.
    pub applied: usize,
    /// Logs recorded by an earlier pass.
    pub already_processed: usize,
    /// Logs of unknown actors.
    pub unknown_accounts: usize,
    /// Logs refused for good.
    pub rejected: usize,
    /// Logs left for a later pass.
    pub skipped: usize,
    /// Logs that could not be decoded.
    pub malformed: usize,
    /// Logs whose application failed.
    pub failed: usize,
}

/// Converts exchange logs of one direction into ledger entries.
///
/// Application is idempotent by transaction hash, so re-scanning blocks is
/// always safe.
#[derive(Clone)]
pub struct EventWatcher {
    direction: Direction,
    signature: B256,
    store: Arc<dyn LedgerStore>,
    chain: Arc<dyn ChainClient>,
    lock: SyncLock,
    reconciler: Reconciler,
    config: ConfigLoader,
    options: WatcherOptions,
}

impl EventWatcher {
    /// Create a watcher for `direction`.
    pub fn new(
        direction: Direction,
        store: Arc<dyn LedgerStore>,
        chain: Arc<dyn ChainClient>,
        reconciler: Reconciler,
        config: ConfigLoader,
        options: WatcherOptions,
    ) -> Self {
        Self {
            direction,
            signature: options
                .signature
                .unwrap_or_else(|| event_signature(direction)),
            store,
            chain,
            lock: reconciler.sync_lock().clone(),
            reconciler,
            config,
            options,
        }
    }

    /// Direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Signature hash of the watched event.
    pub fn signature(&self) -> B256 {
        self.signature
    }

    /// Checkpoint trailing the current head by the reorg margin.
    pub async fn initial_checkpoint(&self) -> crate::Result<Checkpoint> {
        let height = self.chain.block_number().await?;
        Ok(Checkpoint::new(
            height.saturating_sub(self.options.reorg_margin),
        ))
    }

    /// Scan from the checkpoint to the head once.
    ///
    /// The checkpoint moves to the block of each settled log until the first
    /// log that has to be retried; later logs are still applied. Rejected
    /// logs neither move nor hold the checkpoint.
    pub async fn poll_once(&self, checkpoint: &mut Checkpoint) -> crate::Result<PassSummary> {
        let logs = self
            .chain
            .logs(self.options.exchange_contract, checkpoint.from_block())
            .await?;
        let mut summary = PassSummary::default();
        let mut held = false;

        for raw in logs {
            let Some(log) = self.route(&raw, &mut summary) else {
                continue;
            };
            let (settled, retryable) = match self.apply_event(&log).await {
                Ok(outcome) => {
                    match &outcome {
                        ApplyOutcome::Applied { .. } => summary.applied += 1,
                        ApplyOutcome::AlreadyProcessed => summary.already_processed += 1,
                        ApplyOutcome::UnknownAccount => summary.unknown_accounts += 1,
                        ApplyOutcome::Rejected(reason) => {
                            tracing::debug!(hash = %log.tx_hash, %reason, "log rejected");
                            summary.rejected += 1;
                        }
                        ApplyOutcome::UserSyncing => {
                            tracing::info!(hash = %log.tx_hash, "user syncing, log left for a later pass");
                            summary.skipped += 1;
                        }
                    }
                    (outcome.is_settled(), outcome.is_retryable())
                }
                Err(err) => {
                    tracing::warn!(%err, hash = %log.tx_hash, "failed to apply log");
                    summary.failed += 1;
                    (false, true)
                }
            };
            if retryable {
                held = true;
            } else if settled && !held {
                checkpoint.advance(log.block_number);
            }
        }

        Ok(summary)
    }

    fn route(&self, raw: &RawLog, summary: &mut PassSummary) -> Option<ExchangeLog> {
        if raw.topics.len() != 2 {
            tracing::warn!(topics = raw.topics.len(), hash = ?raw.tx_hash, "dropping log with unexpected topics");
            summary.malformed += 1;
            return None;
        }
        if raw.topics[0] != self.signature {
            return None;
        }
        match raw.decode(self.direction) {
            Ok(log) => Some(log),
            Err(err) => {
                tracing::warn!(%err, hash = ?raw.tx_hash, "dropping undecodable log");
                summary.malformed += 1;
                None
            }
        }
    }

    /// Apply one decoded log to the ledger.
    pub async fn apply_event(&self, log: &ExchangeLog) -> crate::Result<ApplyOutcome> {
        if self.store.chain_transaction(log.tx_hash).await?.is_some() {
            return Ok(ApplyOutcome::AlreadyProcessed);
        }

        let raw = u128::try_from(log.amount).map_err(|_| {
            crate::Error::invalid_argument(format!("amount {} out of range", log.amount))
        })?;
        let amount = contract_amount_to_decimal(raw)?;
        if amount <= Decimal::ZERO {
            tracing::warn!(hash = %log.tx_hash, "rejecting non-positive amount");
            return Ok(ApplyOutcome::Rejected(RejectReason::NonPositiveAmount));
        }

        let mut tx = self.store.begin().await?;
        let Some(mut user) = tx.lock_user_by_address(log.actor).await? else {
            tracing::debug!(actor = %log.actor, hash = %log.tx_hash, "no user bound to actor");
            return Ok(ApplyOutcome::UnknownAccount);
        };
        if self.lock.is_held(user.id).await? {
            return Ok(ApplyOutcome::UserSyncing);
        }

        match self.direction {
            Direction::Deposit => user.buffer += amount,
            Direction::Withdraw => {
                if amount > user.buffer {
                    tracing::warn!(user = %user.id, %amount, balance = %user.buffer, "withdrawal exceeds balance");
                    return Ok(ApplyOutcome::Rejected(RejectReason::InsufficientBalance));
                }
                user.buffer -= amount;
            }
        }

        let mirror = ChainTransaction {
            hash: log.tx_hash,
            user_id: user.id,
            direction: self.direction,
            status: ChainTxStatus::Confirmed,
            amount,
            token_address: self.options.token_address,
            actor: log.actor,
            block_number: log.block_number,
        };
        if !tx.insert_chain_transaction(&mirror).await? {
            return Ok(ApplyOutcome::AlreadyProcessed);
        }
        tx.save_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user = %user.id, hash = %log.tx_hash, %amount, block = log.block_number, "applied exchange log");
        self.refresh(user.id).await;
        Ok(ApplyOutcome::Applied {
            user: user.id,
            amount,
        })
    }

    async fn refresh(&self, user: UserId) {
        let result: crate::Result<SyncReport> = async {
            let config = self.config.load().await?;
            self.reconciler.sync(user, &config).await
        }
        .await;
        match result {
            Ok(report) => tracing::debug!(%user, action = ?report.action, "refreshed"),
            Err(err) => tracing::warn!(%err, %user, "failed to refresh after applying log"),
        }
    }

    /// Poll until the task is dropped.
    ///
    /// RPC failures are retried after the backoff from the same checkpoint.
    pub async fn run(&self) -> crate::Result<()> {
        let mut checkpoint = loop {
            match self.initial_checkpoint().await {
                Ok(checkpoint) => break checkpoint,
                Err(err) if err.is_transient() => {
                    tracing::warn!(%err, "failed to fetch the head, retrying");
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        };
        tracing::info!(from_block = checkpoint.from_block(), "started");

        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.poll_once(&mut checkpoint).await {
                Ok(summary) => {
                    tracing::debug!(?summary, from_block = checkpoint.from_block(), "pass done");
                }
                Err(err) => {
                    tracing::warn!(%err, from_block = checkpoint.from_block(), "pass failed, backing off");
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
            }
        }
    }

    /// Run inside the watcher span, logging how the watcher stopped.
    pub fn watch(self) -> impl Future<Output = crate::Result<()>> + Send + 'static {
        let span = tracing::info_span!("event_watcher", direction = %self.direction);
        async move {
            let res = self.run().await;
            match &res {
                Ok(()) => {
                    tracing::warn!("stopped");
                }
                Err(err) => {
                    tracing::error!(%err, "stopped with error");
                }
            }
            res
        }
        .instrument(span)
    }

    /// Run in a background task.
    pub fn spawn(self) -> JoinHandle<crate::Result<()>> {
        tokio::spawn(self.watch())
    }
}
