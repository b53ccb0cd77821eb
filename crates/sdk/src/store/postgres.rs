use std::str::FromStr;

use async_trait::async_trait;
use dimp_evm_utils::alloy::primitives::{hex, Address, B256};
use dimp_utils::{
    ChainTxStatus, Decimal, Direction, ReferralLevel, Token, TxKind, TxStatus, UserId,
};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use super::{LedgerStore, LedgerTransaction};
use crate::model::{
    ChainTransaction, InternalTransaction, NewInternalTransaction, NewUser, ReferralRelation, User,
};

const USER_COLUMNS: &str = "id, address, hash, email, twitter_email, discord_email, google_email, \
    google_name, ref_slug, upline_id, ref_counter, actions, withdraw_min, withdraw_max, buffer, \
    rewards, dimp_earned, dimp_spent, dact_earned";

const INTERNAL_COLUMNS: &str = "id, user_id, author_id, kind, status, amount, token, address, note";

const CHAIN_COLUMNS: &str =
    "hash, user_id, direction, status, amount, token_address, actor, block_number";

const REFERRAL_COLUMNS: &str = "beneficiary_id, originator_id, level, originator_referrals, \
    originator_address, originator_email, originator_name, dimp, dact";

/// A [`LedgerStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Connect to the database at `url`.
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(16).connect(url).await?;
        Ok(Self { pool })
    }

    /// Create from an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> crate::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> crate::Result<Box<dyn LedgerTransaction>> {
        Ok(Box::new(PgTransaction {
            tx: self.pool.begin().await?,
        }))
    }

    async fn insert_user(&self, user: NewUser) -> crate::Result<User> {
        if user.buffer < Decimal::ZERO {
            return Err(crate::Error::InvalidAmount(user.buffer));
        }
        if let Some(address) = user.address {
            if let Some(owner) = self.user_by_address(address).await? {
                return Err(crate::Error::AddressTaken {
                    address,
                    owner: owner.id,
                });
            }
        }
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (address, hash, email, twitter_email, discord_email, google_email, \
             google_name, ref_slug, upline_id, buffer, rewards) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.address.map(encode_address))
        .bind(&user.hash)
        .bind(&user.email)
        .bind(&user.twitter_email)
        .bind(&user.discord_email)
        .bind(&user.google_email)
        .bind(&user.google_name)
        .bind(&user.ref_slug)
        .bind(user.upline.map(|id| id.0))
        .bind(user.buffer)
        .bind(user.rewards)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn user(&self, id: UserId) -> crate::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn user_by_address(&self, address: Address) -> crate::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE address = $1"
        ))
        .bind(encode_address(address))
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn chain_transaction(&self, hash: B256) -> crate::Result<Option<ChainTransaction>> {
        sqlx::query_as::<_, ChainRow>(&format!(
            "SELECT {CHAIN_COLUMNS} FROM chain_transactions WHERE hash = $1"
        ))
        .bind(hex::encode_prefixed(hash))
        .fetch_optional(&self.pool)
        .await?
        .map(ChainTransaction::try_from)
        .transpose()
    }

    async fn referrals_of(&self, beneficiary: UserId) -> crate::Result<Vec<ReferralRelation>> {
        sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referral_relations \
             WHERE beneficiary_id = $1 ORDER BY created_at ASC"
        ))
        .bind(beneficiary.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ReferralRelation::try_from)
        .collect()
    }

    async fn internal_transactions(
        &self,
        user: UserId,
    ) -> crate::Result<Vec<InternalTransaction>> {
        sqlx::query_as::<_, InternalRow>(&format!(
            "SELECT {INTERNAL_COLUMNS} FROM internal_transactions WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(InternalTransaction::try_from)
        .collect()
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgTransaction {
    async fn lock_user(&mut self, id: UserId) -> crate::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn lock_user_by_address(&mut self, address: Address) -> crate::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE address = $1 FOR UPDATE"
        ))
        .bind(encode_address(address))
        .fetch_optional(&mut *self.tx)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn save_user(&mut self, user: &User) -> crate::Result<()> {
        if user.buffer < Decimal::ZERO {
            return Err(crate::Error::store(format!(
                "user {}: buffer must not be negative",
                user.id
            )));
        }
        if let Some(address) = user.address {
            let owner = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM users WHERE address = $1 AND id <> $2",
            )
            .bind(encode_address(address))
            .bind(user.id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
            if let Some(owner) = owner {
                return Err(crate::Error::AddressTaken {
                    address,
                    owner: UserId(owner),
                });
            }
        }
        sqlx::query(
            "UPDATE users SET address = $2, hash = $3, email = $4, twitter_email = $5, \
             discord_email = $6, google_email = $7, google_name = $8, ref_slug = $9, \
             upline_id = $10, ref_counter = $11, actions = $12, withdraw_min = $13, \
             withdraw_max = $14, buffer = $15, rewards = $16, dimp_earned = $17, \
             dimp_spent = $18, dact_earned = $19 WHERE id = $1",
        )
        .bind(user.id.0)
        .bind(user.address.map(encode_address))
        .bind(&user.hash)
        .bind(&user.email)
        .bind(&user.twitter_email)
        .bind(&user.discord_email)
        .bind(&user.google_email)
        .bind(&user.google_name)
        .bind(&user.ref_slug)
        .bind(user.upline.map(|id| id.0))
        .bind(user.ref_counter)
        .bind(user.actions)
        .bind(user.withdraw_min)
        .bind(user.withdraw_max)
        .bind(user.buffer)
        .bind(user.rewards)
        .bind(user.dimp_earned)
        .bind(user.dimp_spent)
        .bind(user.dact_earned)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_chain_transaction(&mut self, tx: &ChainTransaction) -> crate::Result<bool> {
        let block_number = i64::try_from(tx.block_number)
            .map_err(|_| crate::Error::store("block number out of range"))?;
        let result = sqlx::query(&format!(
            "INSERT INTO chain_transactions ({CHAIN_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (hash) DO NOTHING"
        ))
        .bind(hex::encode_prefixed(tx.hash))
        .bind(tx.user_id.0)
        .bind(tx.direction.as_ref())
        .bind(i16::from(tx.status))
        .bind(tx.amount)
        .bind(encode_address(tx.token_address))
        .bind(encode_address(tx.actor))
        .bind(block_number)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_or_init_referral(
        &mut self,
        beneficiary: UserId,
        originator: UserId,
        level: ReferralLevel,
    ) -> crate::Result<ReferralRelation> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referral_relations \
             WHERE beneficiary_id = $1 AND originator_id = $2 AND level = $3 FOR UPDATE"
        ))
        .bind(beneficiary.0)
        .bind(originator.0)
        .bind(i16::from(level))
        .fetch_optional(&mut *self.tx)
        .await?;
        match row {
            Some(row) => row.try_into(),
            None => Ok(ReferralRelation::new(beneficiary, originator, level)),
        }
    }

    async fn save_referral(&mut self, relation: &ReferralRelation) -> crate::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO referral_relations ({REFERRAL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (beneficiary_id, originator_id, level) DO UPDATE SET \
             originator_referrals = EXCLUDED.originator_referrals, \
             originator_address = EXCLUDED.originator_address, \
             originator_email = EXCLUDED.originator_email, \
             originator_name = EXCLUDED.originator_name, \
             dimp = EXCLUDED.dimp, dact = EXCLUDED.dact, updated_at = now()"
        ))
        .bind(relation.beneficiary.0)
        .bind(relation.originator.0)
        .bind(i16::from(relation.level))
        .bind(relation.originator_referrals)
        .bind(relation.originator_address.map(encode_address))
        .bind(&relation.originator_email)
        .bind(&relation.originator_name)
        .bind(relation.dimp)
        .bind(relation.dact)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_internal_transaction(
        &mut self,
        user: UserId,
        kind: TxKind,
        status: Option<TxStatus>,
    ) -> crate::Result<Option<InternalTransaction>> {
        sqlx::query_as::<_, InternalRow>(&format!(
            "SELECT {INTERNAL_COLUMNS} FROM internal_transactions \
             WHERE user_id = $1 AND kind = $2 AND ($3::SMALLINT IS NULL OR status = $3) \
             ORDER BY id LIMIT 1 FOR UPDATE"
        ))
        .bind(user.0)
        .bind(kind.as_ref())
        .bind(status.map(i16::from))
        .fetch_optional(&mut *self.tx)
        .await?
        .map(InternalTransaction::try_from)
        .transpose()
    }

    async fn insert_internal_transaction(
        &mut self,
        tx: NewInternalTransaction,
    ) -> crate::Result<InternalTransaction> {
        sqlx::query_as::<_, InternalRow>(&format!(
            "INSERT INTO internal_transactions \
             (user_id, author_id, kind, status, amount, token, address, note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {INTERNAL_COLUMNS}"
        ))
        .bind(tx.user_id.0)
        .bind(tx.author_id.map(|id| id.0))
        .bind(tx.kind.as_ref())
        .bind(i16::from(tx.status))
        .bind(tx.amount)
        .bind(tx.token.as_ref())
        .bind(tx.address.map(encode_address))
        .bind(&tx.note)
        .fetch_one(&mut *self.tx)
        .await?
        .try_into()
    }

    async fn save_internal_transaction(&mut self, tx: &InternalTransaction) -> crate::Result<()> {
        let result = sqlx::query(
            "UPDATE internal_transactions SET author_id = $2, kind = $3, status = $4, \
             amount = $5, token = $6, address = $7, note = $8 WHERE id = $1",
        )
        .bind(tx.id)
        .bind(tx.author_id.map(|id| id.0))
        .bind(tx.kind.as_ref())
        .bind(i16::from(tx.status))
        .bind(tx.amount)
        .bind(tx.token.as_ref())
        .bind(tx.address.map(encode_address))
        .bind(&tx.note)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(crate::Error::not_found(format!(
                "internal transaction {}",
                tx.id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> crate::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn encode_address(address: Address) -> String {
    hex::encode_prefixed(address)
}

fn decode_address(value: &str) -> crate::Result<Address> {
    Address::from_str(value).map_err(|err| crate::Error::store(format!("address {value}: {err}")))
}

fn decode_enum<T: FromStr>(what: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::store(format!("unknown {what} `{value}`")))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    address: Option<String>,
    hash: String,
    email: String,
    twitter_email: String,
    discord_email: String,
    google_email: String,
    google_name: String,
    ref_slug: String,
    upline_id: Option<i64>,
    ref_counter: i64,
    actions: i64,
    withdraw_min: Decimal,
    withdraw_max: Decimal,
    buffer: Decimal,
    rewards: Decimal,
    dimp_earned: Decimal,
    dimp_spent: Decimal,
    dact_earned: Decimal,
}

impl TryFrom<UserRow> for User {
    type Error = crate::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId(row.id),
            address: row.address.as_deref().map(decode_address).transpose()?,
            hash: row.hash,
            email: row.email,
            twitter_email: row.twitter_email,
            discord_email: row.discord_email,
            google_email: row.google_email,
            google_name: row.google_name,
            ref_slug: row.ref_slug,
            upline: row.upline_id.map(UserId),
            ref_counter: row.ref_counter,
            actions: row.actions,
            withdraw_min: row.withdraw_min,
            withdraw_max: row.withdraw_max,
            buffer: row.buffer,
            rewards: row.rewards,
            dimp_earned: row.dimp_earned,
            dimp_spent: row.dimp_spent,
            dact_earned: row.dact_earned,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InternalRow {
    id: i64,
    user_id: i64,
    author_id: Option<i64>,
    kind: String,
    status: i16,
    amount: Decimal,
    token: String,
    address: Option<String>,
    note: Option<String>,
}

impl TryFrom<InternalRow> for InternalTransaction {
    type Error = crate::Error;

    fn try_from(row: InternalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: UserId(row.user_id),
            author_id: row.author_id.map(UserId),
            kind: decode_enum::<TxKind>("tx kind", &row.kind)?,
            status: TxStatus::try_from(row.status)?,
            amount: row.amount,
            token: decode_enum::<Token>("token", &row.token)?,
            address: row.address.as_deref().map(decode_address).transpose()?,
            note: row.note,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChainRow {
    hash: String,
    user_id: i64,
    direction: String,
    status: i16,
    amount: Decimal,
    token_address: String,
    actor: String,
    block_number: i64,
}

impl TryFrom<ChainRow> for ChainTransaction {
    type Error = crate::Error;

    fn try_from(row: ChainRow) -> Result<Self, Self::Error> {
        let hash = B256::from_str(&row.hash)
            .map_err(|err| crate::Error::store(format!("hash {}: {err}", row.hash)))?;
        Ok(Self {
            hash,
            user_id: UserId(row.user_id),
            direction: decode_enum::<Direction>("direction", &row.direction)?,
            status: ChainTxStatus::try_from(row.status)?,
            amount: row.amount,
            token_address: decode_address(&row.token_address)?,
            actor: decode_address(&row.actor)?,
            block_number: u64::try_from(row.block_number)
                .map_err(|_| crate::Error::store("negative block number"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReferralRow {
    beneficiary_id: i64,
    originator_id: i64,
    level: i16,
    originator_referrals: i64,
    originator_address: Option<String>,
    originator_email: String,
    originator_name: String,
    dimp: Decimal,
    dact: Decimal,
}

impl TryFrom<ReferralRow> for ReferralRelation {
    type Error = crate::Error;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        Ok(Self {
            beneficiary: UserId(row.beneficiary_id),
            originator: UserId(row.originator_id),
            level: ReferralLevel::try_from(row.level)?,
            originator_referrals: row.originator_referrals,
            originator_address: row
                .originator_address
                .as_deref()
                .map(decode_address)
                .transpose()?,
            originator_email: row.originator_email,
            originator_name: row.originator_name,
            dimp: row.dimp,
            dact: row.dact,
        })
    }
}
