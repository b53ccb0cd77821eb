use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use dimp_evm_utils::alloy::primitives::{Address, B256};
use dimp_utils::{Decimal, ReferralLevel, TxKind, TxStatus, UserId};
use indexmap::IndexMap;
use tokio::sync::OwnedMutexGuard;

use super::{LedgerStore, LedgerTransaction};
use crate::model::{
    ChainTransaction, InternalTransaction, NewInternalTransaction, NewUser, ReferralRelation, User,
};

type ReferralKey = (UserId, UserId, ReferralLevel);
type RowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    chain_transactions: HashMap<B256, ChainTransaction>,
    internal_transactions: BTreeMap<i64, InternalTransaction>,
    referrals: IndexMap<ReferralKey, ReferralRelation>,
    last_user_id: i64,
    last_internal_id: i64,
}

impl Tables {
    fn address_owner(&self, address: Address, except: Option<UserId>) -> Option<UserId> {
        self.users
            .values()
            .find(|user| user.address == Some(address) && Some(user.id) != except)
            .map(|user| user.id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<UserId, RowLock>>,
}

/// A [`LedgerStore`] kept in memory.
///
/// User rows are locked with per-user async mutexes; writes are staged in the
/// transaction and applied on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, id: UserId) -> RowLock {
        self.inner
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> crate::Result<Box<dyn LedgerTransaction>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            guards: HashMap::default(),
            staged: Staged::default(),
        }))
    }

    async fn insert_user(&self, user: NewUser) -> crate::Result<User> {
        let mut tables = self.tables();
        if let Some(address) = user.address {
            if let Some(owner) = tables.address_owner(address, None) {
                return Err(crate::Error::AddressTaken { address, owner });
            }
        }
        if user.buffer < Decimal::ZERO {
            return Err(crate::Error::InvalidAmount(user.buffer));
        }
        tables.last_user_id += 1;
        let user = user.into_user(UserId(tables.last_user_id));
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> crate::Result<Option<User>> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn user_by_address(&self, address: Address) -> crate::Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|user| user.address == Some(address))
            .cloned())
    }

    async fn chain_transaction(&self, hash: B256) -> crate::Result<Option<ChainTransaction>> {
        Ok(self.tables().chain_transactions.get(&hash).cloned())
    }

    async fn referrals_of(&self, beneficiary: UserId) -> crate::Result<Vec<ReferralRelation>> {
        Ok(self
            .tables()
            .referrals
            .values()
            .filter(|relation| relation.beneficiary == beneficiary)
            .cloned()
            .collect())
    }

    async fn internal_transactions(
        &self,
        user: UserId,
    ) -> crate::Result<Vec<InternalTransaction>> {
        Ok(self
            .tables()
            .internal_transactions
            .values()
            .filter(|tx| tx.user_id == user)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct Staged {
    users: BTreeMap<UserId, User>,
    chain_transactions: HashMap<B256, ChainTransaction>,
    internal_transactions: BTreeMap<i64, InternalTransaction>,
    referrals: IndexMap<ReferralKey, ReferralRelation>,
}

struct MemoryTransaction {
    store: MemoryStore,
    guards: HashMap<UserId, OwnedMutexGuard<()>>,
    staged: Staged,
}

impl MemoryTransaction {
    fn read_user(&self, id: UserId) -> Option<User> {
        self.staged
            .users
            .get(&id)
            .cloned()
            .or_else(|| self.store.tables().users.get(&id).cloned())
    }

    fn staged_address_owner(&self, address: Address, except: UserId) -> Option<UserId> {
        self.staged
            .users
            .values()
            .find(|user| user.address == Some(address) && user.id != except)
            .map(|user| user.id)
    }
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn lock_user(&mut self, id: UserId) -> crate::Result<Option<User>> {
        if !self.guards.contains_key(&id) {
            let guard = self.store.row_lock(id).lock_owned().await;
            self.guards.insert(id, guard);
        }
        Ok(self.read_user(id))
    }

    async fn lock_user_by_address(&mut self, address: Address) -> crate::Result<Option<User>> {
        let staged = self
            .staged
            .users
            .values()
            .find(|user| user.address == Some(address))
            .map(|user| user.id);
        let Some(id) = staged.or_else(|| self.store.tables().address_owner(address, None)) else {
            return Ok(None);
        };
        let user = self.lock_user(id).await?;
        // The address may have been rebound while waiting for the lock.
        Ok(user.filter(|user| user.address == Some(address)))
    }

    async fn save_user(&mut self, user: &User) -> crate::Result<()> {
        if !self.guards.contains_key(&user.id) {
            return Err(crate::Error::store(format!("user {} is not locked", user.id)));
        }
        if user.buffer < Decimal::ZERO {
            return Err(crate::Error::store(format!(
                "user {}: buffer must not be negative",
                user.id
            )));
        }
        if let Some(address) = user.address {
            let owner = self
                .staged_address_owner(address, user.id)
                .or_else(|| self.store.tables().address_owner(address, Some(user.id)));
            if let Some(owner) = owner {
                return Err(crate::Error::AddressTaken { address, owner });
            }
        }
        self.staged.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_chain_transaction(&mut self, tx: &ChainTransaction) -> crate::Result<bool> {
        if self.staged.chain_transactions.contains_key(&tx.hash)
            || self
                .store
                .tables()
                .chain_transactions
                .contains_key(&tx.hash)
        {
            return Ok(false);
        }
        self.staged.chain_transactions.insert(tx.hash, tx.clone());
        Ok(true)
    }

    async fn find_or_init_referral(
        &mut self,
        beneficiary: UserId,
        originator: UserId,
        level: ReferralLevel,
    ) -> crate::Result<ReferralRelation> {
        let key = (beneficiary, originator, level);
        if let Some(relation) = self.staged.referrals.get(&key) {
            return Ok(relation.clone());
        }
        Ok(self
            .store
            .tables()
            .referrals
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ReferralRelation::new(beneficiary, originator, level)))
    }

    async fn save_referral(&mut self, relation: &ReferralRelation) -> crate::Result<()> {
        let key = (relation.beneficiary, relation.originator, relation.level);
        self.staged.referrals.insert(key, relation.clone());
        Ok(())
    }

    async fn find_internal_transaction(
        &mut self,
        user: UserId,
        kind: TxKind,
        status: Option<TxStatus>,
    ) -> crate::Result<Option<InternalTransaction>> {
        let matches = |tx: &InternalTransaction| {
            tx.user_id == user && tx.kind == kind && status.map_or(true, |status| tx.status == status)
        };
        let tables = self.store.tables();
        let committed = tables
            .internal_transactions
            .iter()
            .map(|(id, tx)| self.staged.internal_transactions.get(id).unwrap_or(tx));
        let fresh = self
            .staged
            .internal_transactions
            .iter()
            .filter(|(id, _)| !tables.internal_transactions.contains_key(id))
            .map(|(_, tx)| tx);
        Ok(committed.chain(fresh).find(|tx| matches(tx)).cloned())
    }

    async fn insert_internal_transaction(
        &mut self,
        tx: NewInternalTransaction,
    ) -> crate::Result<InternalTransaction> {
        let id = {
            let mut tables = self.store.tables();
            tables.last_internal_id += 1;
            tables.last_internal_id
        };
        let tx = tx.into_transaction(id);
        self.staged.internal_transactions.insert(id, tx.clone());
        Ok(tx)
    }

    async fn save_internal_transaction(&mut self, tx: &InternalTransaction) -> crate::Result<()> {
        let exists = self.staged.internal_transactions.contains_key(&tx.id)
            || self
                .store
                .tables()
                .internal_transactions
                .contains_key(&tx.id);
        if !exists {
            return Err(crate::Error::not_found(format!(
                "internal transaction {}",
                tx.id
            )));
        }
        self.staged.internal_transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> crate::Result<()> {
        let MemoryTransaction {
            store,
            guards,
            staged,
        } = *self;
        {
            let mut tables = store.tables();
            if let Some(hash) = staged
                .chain_transactions
                .keys()
                .find(|hash| tables.chain_transactions.contains_key(*hash))
            {
                return Err(crate::Error::DuplicateHash(*hash));
            }
            for user in staged.users.values() {
                let Some(address) = user.address else {
                    continue;
                };
                let owner = tables
                    .users
                    .values()
                    .filter(|other| !staged.users.contains_key(&other.id))
                    .find(|other| other.address == Some(address))
                    .map(|other| other.id);
                if let Some(owner) = owner {
                    return Err(crate::Error::AddressTaken { address, owner });
                }
            }
            tables.users.extend(staged.users);
            tables.chain_transactions.extend(staged.chain_transactions);
            tables
                .internal_transactions
                .extend(staged.internal_transactions);
            tables.referrals.extend(staged.referrals);
        }
        drop(guards);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dimp_utils::{ChainTxStatus, Direction};
    use rust_decimal_macros::dec;

    use super::*;

    fn address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn test_rollback_on_drop() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser::builder().address(address(1)).build())
            .await?;

        let mut tx = store.begin().await?;
        let mut locked = tx.lock_user(user.id).await?.unwrap();
        locked.buffer = dec!(10);
        tx.save_user(&locked).await?;
        drop(tx);

        assert_eq!(store.user(user.id).await?.unwrap().buffer, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_row_lock_serializes_transactions() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let user = store.insert_user(NewUser::builder().build()).await?;

        let mut first = store.begin().await?;
        first.lock_user(user.id).await?;

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await?;
                let mut locked = second.lock_user(user.id).await?.unwrap();
                locked.buffer += dec!(1);
                second.save_user(&locked).await?;
                second.commit().await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        let mut locked = first.lock_user(user.id).await?.unwrap();
        locked.buffer += dec!(2);
        first.save_user(&locked).await?;
        first.commit().await?;

        contender.await??;
        assert_eq!(store.user(user.id).await?.unwrap().buffer, dec!(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_chain_transaction_is_inserted_once() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser::builder().address(address(1)).build())
            .await?;
        let mirror = ChainTransaction {
            hash: B256::repeat_byte(9),
            user_id: user.id,
            direction: Direction::Deposit,
            status: ChainTxStatus::Confirmed,
            amount: dec!(5),
            token_address: address(2),
            actor: address(1),
            block_number: 1,
        };

        let mut tx = store.begin().await?;
        assert!(tx.insert_chain_transaction(&mirror).await?);
        assert!(!tx.insert_chain_transaction(&mirror).await?);
        tx.commit().await?;

        let mut tx = store.begin().await?;
        assert!(!tx.insert_chain_transaction(&mirror).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_address_is_unique() -> eyre::Result<()> {
        let store = MemoryStore::new();
        store
            .insert_user(NewUser::builder().address(address(1)).build())
            .await?;
        let other = store.insert_user(NewUser::builder().build()).await?;
        assert!(matches!(
            store
                .insert_user(NewUser::builder().address(address(1)).build())
                .await,
            Err(crate::Error::AddressTaken { .. })
        ));

        let mut tx = store.begin().await?;
        let mut locked = tx.lock_user(other.id).await?.unwrap();
        locked.address = Some(address(1));
        assert!(matches!(
            tx.save_user(&locked).await,
            Err(crate::Error::AddressTaken { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_save_requires_lock_and_non_negative_buffer() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let user = store.insert_user(NewUser::builder().build()).await?;

        let mut tx = store.begin().await?;
        assert!(tx.save_user(&user).await.is_err());

        let mut locked = tx.lock_user(user.id).await?.unwrap();
        locked.buffer = dec!(-1);
        assert!(tx.save_user(&locked).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_find_internal_transaction_sees_staged_updates() -> eyre::Result<()> {
        let store = MemoryStore::new();
        let user = store.insert_user(NewUser::builder().build()).await?;

        let mut tx = store.begin().await?;
        tx.lock_user(user.id).await?;
        let mut request = tx
            .insert_internal_transaction(
                NewInternalTransaction::builder()
                    .user_id(user.id)
                    .kind(TxKind::Sync)
                    .status(TxStatus::Requested)
                    .amount(dec!(100))
                    .build(),
            )
            .await?;
        tx.commit().await?;

        let mut tx = store.begin().await?;
        tx.lock_user(user.id).await?;
        request.status = TxStatus::Approved;
        tx.save_internal_transaction(&request).await?;
        let found = tx
            .find_internal_transaction(user.id, TxKind::Sync, Some(TxStatus::Approved))
            .await?;
        assert_eq!(found.map(|tx| tx.id), Some(request.id));
        assert!(tx
            .find_internal_transaction(user.id, TxKind::Sync, Some(TxStatus::Requested))
            .await?
            .is_none());
        Ok(())
    }
}
