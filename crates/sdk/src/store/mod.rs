use async_trait::async_trait;
use dimp_evm_utils::alloy::primitives::{Address, B256};
use dimp_utils::{ReferralLevel, TxKind, TxStatus, UserId};

use crate::model::{
    ChainTransaction, InternalTransaction, NewInternalTransaction, NewUser, ReferralRelation, User,
};

/// In-memory store.
pub mod memory;

/// PostgreSQL store.
#[cfg(postgres)]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(postgres)]
pub use postgres::PgLedgerStore;

/// Durable storage of the ledger.
///
/// Reads through the store itself take no locks. Mutations go through a
/// [`LedgerTransaction`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Begin a transaction.
    async fn begin(&self) -> crate::Result<Box<dyn LedgerTransaction>>;

    /// Insert a user.
    async fn insert_user(&self, user: NewUser) -> crate::Result<User>;

    /// Get a user by id.
    async fn user(&self, id: UserId) -> crate::Result<Option<User>>;

    /// Get a user by bound address.
    async fn user_by_address(&self, address: Address) -> crate::Result<Option<User>>;

    /// Get a processed chain transaction.
    async fn chain_transaction(&self, hash: B256) -> crate::Result<Option<ChainTransaction>>;

    /// Relations where `beneficiary` receives commissions, oldest first.
    async fn referrals_of(&self, beneficiary: UserId) -> crate::Result<Vec<ReferralRelation>>;

    /// Internal transactions of a user, oldest first.
    async fn internal_transactions(&self, user: UserId)
        -> crate::Result<Vec<InternalTransaction>>;
}

/// A ledger transaction.
///
/// Row locks taken with the `lock_*` methods are held until the transaction
/// is committed or dropped. Dropping without committing rolls back.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Lock a user row for update.
    async fn lock_user(&mut self, id: UserId) -> crate::Result<Option<User>>;

    /// Lock the user row bound to `address` for update.
    async fn lock_user_by_address(&mut self, address: Address) -> crate::Result<Option<User>>;

    /// Save a locked user.
    async fn save_user(&mut self, user: &User) -> crate::Result<()>;

    /// Insert a chain transaction mirror.
    ///
    /// Returns `false` without writing if the hash has already been recorded.
    async fn insert_chain_transaction(&mut self, tx: &ChainTransaction) -> crate::Result<bool>;

    /// Find the relation for the given key, or an empty one if absent.
    async fn find_or_init_referral(
        &mut self,
        beneficiary: UserId,
        originator: UserId,
        level: ReferralLevel,
    ) -> crate::Result<ReferralRelation>;

    /// Insert or update a relation.
    async fn save_referral(&mut self, relation: &ReferralRelation) -> crate::Result<()>;

    /// Find the first internal transaction of `user` with the given kind and, if set, status.
    async fn find_internal_transaction(
        &mut self,
        user: UserId,
        kind: TxKind,
        status: Option<TxStatus>,
    ) -> crate::Result<Option<InternalTransaction>>;

    /// Insert an internal transaction.
    async fn insert_internal_transaction(
        &mut self,
        tx: NewInternalTransaction,
    ) -> crate::Result<InternalTransaction>;

    /// Update an internal transaction.
    async fn save_internal_transaction(&mut self, tx: &InternalTransaction) -> crate::Result<()>;

    /// Commit.
    async fn commit(self: Box<Self>) -> crate::Result<()>;
}

/// Lock `id` or fail with [`Error::NotFound`](crate::Error::NotFound).
pub(crate) async fn lock_existing_user(
    tx: &mut dyn LedgerTransaction,
    id: UserId,
) -> crate::Result<User> {
    tx.lock_user(id)
        .await?
        .ok_or_else(|| crate::Error::not_found(format!("user {id}")))
}

/// Find the sync request of `user` in the given status.
pub(crate) async fn find_sync_request(
    tx: &mut dyn LedgerTransaction,
    user: UserId,
    status: Option<TxStatus>,
) -> crate::Result<Option<InternalTransaction>> {
    tx.find_internal_transaction(user, TxKind::Sync, status)
        .await
}
