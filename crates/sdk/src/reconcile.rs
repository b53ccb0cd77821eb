use std::{sync::Arc, time::Duration};

use dimp_evm_utils::{
    alloy::primitives::{Address, B256, U256},
    contract::set_internal_balance_call,
    ChainClient,
};
use dimp_utils::{
    constants::{DEFAULT_DRIFT_THRESHOLD, DEFAULT_SYNC_LOCK_TTL},
    fixed::decimal_to_contract_amount,
    AppConfig, Decimal, TxStatus, UserId,
};
use typed_builder::TypedBuilder;

use crate::{
    cache::{read_snapshot, write_snapshot, KeyValueCache, SyncLock},
    envelope::{Alert, Envelope},
    error::PolicyViolation,
    model::User,
    notify::{alert_or_log, publish_or_log, Notifier},
    stats::referral_stats,
    store::{find_sync_request, lock_existing_user, LedgerStore},
};

/// Options of [`Reconciler`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ReconcileOptions {
    /// Exchange contract holding the mirrored balances.
    pub exchange_contract: Address,
    /// Minimal drift between the ledger and the snapshot that triggers a chain read.
    #[builder(default = DEFAULT_DRIFT_THRESHOLD)]
    pub drift_threshold: Decimal,
    /// Expiry of the sync lock.
    #[builder(default = DEFAULT_SYNC_LOCK_TTL)]
    pub lock_ttl: Duration,
}

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The user has no bound address.
    NoAddress,
    /// No snapshot was cached; it now holds the ledger balance.
    BaselineSeeded {
        /// Recorded balance.
        balance: Decimal,
    },
    /// The balance is not positive or the drift does not exceed the threshold.
    WithinThreshold {
        /// Absolute drift from the snapshot.
        drift: Decimal,
    },
    /// The contract already holds the ledger balance.
    AlreadyInSync {
        /// Contract amount.
        amount: U256,
    },
    /// Another write for the user is in flight.
    LockBusy,
    /// A `setInternalBalance` transaction has been submitted.
    Written {
        /// Transaction hash.
        tx_hash: B256,
        /// Contract amount written.
        amount: U256,
    },
}

/// Result of [`Reconciler::sync`].
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Envelope built after the reward merge.
    pub envelope: Envelope,
    /// Amount moved from the rewards into the balance, if a request was approved.
    pub merged: Option<Decimal>,
    /// Outcome of the reconciliation.
    pub action: ReconcileAction,
}

/// Keeps the balances mirrored by the exchange contract in line with the ledger.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn KeyValueCache>,
    chain: Arc<dyn ChainClient>,
    notifier: Arc<dyn Notifier>,
    lock: SyncLock,
    options: ReconcileOptions,
}

impl Reconciler {
    /// Create a reconciler.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<dyn KeyValueCache>,
        chain: Arc<dyn ChainClient>,
        notifier: Arc<dyn Notifier>,
        options: ReconcileOptions,
    ) -> Self {
        let lock = SyncLock::new(cache.clone(), options.lock_ttl);
        Self {
            store,
            cache,
            chain,
            notifier,
            lock,
            options,
        }
    }

    /// Get the options.
    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Get the sync lock.
    pub fn sync_lock(&self) -> &SyncLock {
        &self.lock
    }

    /// Merge the approved sync request of `user`, if any, into the balance.
    ///
    /// The request is reset to [`TxStatus::New`] in the same transaction.
    pub async fn merge_rewards(&self, user: UserId) -> crate::Result<Option<Decimal>> {
        let mut tx = self.store.begin().await?;
        let mut locked = lock_existing_user(tx.as_mut(), user).await?;
        let Some(mut request) =
            find_sync_request(tx.as_mut(), user, Some(TxStatus::Approved)).await?
        else {
            return Ok(None);
        };

        let requested = if request.amount > Decimal::ZERO {
            request.amount
        } else {
            locked.rewards
        };
        let approved = requested.min(locked.rewards).max(Decimal::ZERO);
        locked.rewards -= approved;
        locked.buffer += approved;
        request.status = TxStatus::New;

        tx.save_internal_transaction(&request).await?;
        tx.save_user(&locked).await?;
        tx.commit().await?;

        tracing::info!(%user, %approved, "merged approved rewards");
        Ok(Some(approved))
    }

    /// Merge approved rewards, publish the fresh envelope and reconcile.
    pub async fn sync(&self, user: UserId, config: &AppConfig) -> crate::Result<SyncReport> {
        let merged = self.merge_rewards(user).await?;
        let current = self
            .store
            .user(user)
            .await?
            .ok_or_else(|| crate::Error::not_found(format!("user {user}")))?;
        let stats = referral_stats(self.store.as_ref(), user).await?;
        let envelope = Envelope::sync(&current, stats, config);
        publish_or_log(self.notifier.as_ref(), user, &envelope).await;

        let action = self.reconcile(&current, merged.is_some()).await?;
        Ok(SyncReport {
            envelope,
            merged,
            action,
        })
    }

    /// Compare the ledger balance of `user` with the contract and correct it
    /// if needed.
    ///
    /// An increase of the on-chain balance is only allowed when `approved`.
    pub async fn reconcile(&self, user: &User, approved: bool) -> crate::Result<ReconcileAction> {
        let Some(address) = user.address else {
            return Ok(ReconcileAction::NoAddress);
        };
        let cache = self.cache.as_ref();

        let Some(snapshot) = read_snapshot(cache, user.id).await? else {
            write_snapshot(cache, user.id, user.buffer).await?;
            tracing::debug!(user = %user.id, balance = %user.buffer, "seeded balance snapshot");
            return Ok(ReconcileAction::BaselineSeeded {
                balance: user.buffer,
            });
        };

        let drift = (user.buffer - snapshot).abs();
        if user.buffer <= Decimal::ZERO || drift <= self.options.drift_threshold {
            return Ok(ReconcileAction::WithinThreshold { drift });
        }

        let on_chain = self
            .chain
            .internal_balance(self.options.exchange_contract, address)
            .await?;
        let target = U256::from(decimal_to_contract_amount(user.buffer)?);
        if target == on_chain {
            write_snapshot(cache, user.id, user.buffer).await?;
            return Ok(ReconcileAction::AlreadyInSync { amount: target });
        }

        if !approved && target > on_chain {
            let violation = PolicyViolation::UnauthorizedIncrease {
                user: user.id,
                target,
                on_chain,
            };
            alert_or_log(self.notifier.as_ref(), &Alert::new(user.id, &violation)).await;
            return Err(violation.into());
        }

        let Some(guard) = self.lock.try_acquire(user.id).await? else {
            tracing::info!(user = %user.id, "sync already in flight");
            return Ok(ReconcileAction::LockBusy);
        };
        let written = self.write_balance(address, target).await;
        if let Err(err) = guard.release().await {
            tracing::warn!(%err, user = %user.id, "failed to release the sync lock");
        }
        let tx_hash = written?;

        write_snapshot(cache, user.id, user.buffer).await?;
        tracing::info!(user = %user.id, %tx_hash, %on_chain, %target, "submitted balance correction");
        Ok(ReconcileAction::Written {
            tx_hash,
            amount: target,
        })
    }

    async fn write_balance(&self, user: Address, amount: U256) -> crate::Result<B256> {
        let call = set_internal_balance_call(self.options.exchange_contract, user, amount);
        let gas_limit = self.chain.estimate_gas(&call).await?;
        let fees = self.chain.suggest_fees().await?;
        Ok(self.chain.submit(&call, gas_limit, &fees).await?)
    }
}
