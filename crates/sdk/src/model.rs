use dimp_evm_utils::alloy::primitives::{Address, B256};
use dimp_utils::{
    ChainTxStatus, Decimal, Direction, ReferralLevel, Token, TxKind, TxStatus, UserId,
};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// A platform user and their DIMP balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identifier.
    pub id: UserId,
    /// Bound wallet address.
    pub address: Option<Address>,
    /// Login hash.
    pub hash: String,
    /// Primary email.
    pub email: String,
    /// Email of the linked Twitter account.
    pub twitter_email: String,
    /// Email of the linked Discord account.
    pub discord_email: String,
    /// Email of the linked Google account.
    pub google_email: String,
    /// Display name of the linked Google account.
    pub google_name: String,
    /// Referral slug.
    pub ref_slug: String,
    /// Referrer.
    pub upline: Option<UserId>,
    /// Number of direct referrals.
    pub ref_counter: i64,
    /// Number of completed actions.
    pub actions: i64,
    /// Minimal withdrawal override in USD, `0` for the default.
    pub withdraw_min: Decimal,
    /// Maximal withdrawal override in USD, `0` for the default.
    pub withdraw_max: Decimal,
    /// Spendable balance, mirrored on chain.
    pub buffer: Decimal,
    /// Pending rewards.
    pub rewards: Decimal,
    /// Lifetime DIMP earned.
    pub dimp_earned: Decimal,
    /// Lifetime DIMP spent.
    pub dimp_spent: Decimal,
    /// Lifetime DACT earned.
    pub dact_earned: Decimal,
}

impl User {
    /// Best known contact: the primary email, then the Twitter, Discord and
    /// Google emails, and the Google name as a last resort.
    pub fn contact_email(&self) -> &str {
        [
            &self.email,
            &self.twitter_email,
            &self.discord_email,
            &self.google_email,
            &self.google_name,
        ]
        .into_iter()
        .find(|email| !email.is_empty())
        .map(String::as_str)
        .unwrap_or_default()
    }
}

/// A user to be inserted.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewUser {
    /// Bound wallet address.
    #[builder(default, setter(strip_option))]
    pub address: Option<Address>,
    /// Login hash.
    #[builder(default, setter(into))]
    pub hash: String,
    /// Primary email.
    #[builder(default, setter(into))]
    pub email: String,
    /// Email of the linked Twitter account.
    #[builder(default, setter(into))]
    pub twitter_email: String,
    /// Email of the linked Discord account.
    #[builder(default, setter(into))]
    pub discord_email: String,
    /// Email of the linked Google account.
    #[builder(default, setter(into))]
    pub google_email: String,
    /// Display name of the linked Google account.
    #[builder(default, setter(into))]
    pub google_name: String,
    /// Referral slug.
    #[builder(default, setter(into))]
    pub ref_slug: String,
    /// Referrer.
    #[builder(default, setter(strip_option))]
    pub upline: Option<UserId>,
    /// Initial spendable balance.
    #[builder(default)]
    pub buffer: Decimal,
    /// Initial pending rewards.
    #[builder(default)]
    pub rewards: Decimal,
}

impl NewUser {
    /// Materialize with the given id.
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            address: self.address,
            hash: self.hash,
            email: self.email,
            twitter_email: self.twitter_email,
            discord_email: self.discord_email,
            google_email: self.google_email,
            google_name: self.google_name,
            ref_slug: self.ref_slug,
            upline: self.upline,
            ref_counter: 0,
            actions: 0,
            withdraw_min: Decimal::ZERO,
            withdraw_max: Decimal::ZERO,
            buffer: self.buffer,
            rewards: self.rewards,
            dimp_earned: Decimal::ZERO,
            dimp_spent: Decimal::ZERO,
            dact_earned: Decimal::ZERO,
        }
    }
}

/// A ledger entry that is not tied to a chain transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTransaction {
    /// Identifier.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// Author: the referrer, an administrator or the owner.
    pub author_id: Option<UserId>,
    /// Kind.
    pub kind: TxKind,
    /// Status.
    pub status: TxStatus,
    /// Amount.
    pub amount: Decimal,
    /// Token.
    pub token: Token,
    /// Address of the owner at creation time.
    pub address: Option<Address>,
    /// Note.
    pub note: Option<String>,
}

/// An internal transaction to be inserted.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewInternalTransaction {
    /// Owner.
    pub user_id: UserId,
    /// Author.
    #[builder(default, setter(strip_option))]
    pub author_id: Option<UserId>,
    /// Kind.
    pub kind: TxKind,
    /// Status.
    #[builder(default)]
    pub status: TxStatus,
    /// Amount.
    pub amount: Decimal,
    /// Token.
    #[builder(default)]
    pub token: Token,
    /// Address.
    #[builder(default)]
    pub address: Option<Address>,
    /// Note.
    #[builder(default, setter(strip_option, into))]
    pub note: Option<String>,
}

impl NewInternalTransaction {
    /// Materialize with the given id.
    pub fn into_transaction(self, id: i64) -> InternalTransaction {
        InternalTransaction {
            id,
            user_id: self.user_id,
            author_id: self.author_id,
            kind: self.kind,
            status: self.status,
            amount: self.amount,
            token: self.token,
            address: self.address,
            note: self.note,
        }
    }
}

/// Mirror of a processed exchange contract event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTransaction {
    /// Transaction hash, the idempotency key.
    pub hash: B256,
    /// Owner.
    pub user_id: UserId,
    /// Direction.
    pub direction: Direction,
    /// Status.
    pub status: ChainTxStatus,
    /// Amount in ledger units.
    pub amount: Decimal,
    /// Token contract.
    pub token_address: Address,
    /// Depositor or withdrawer.
    pub actor: Address,
    /// Block number.
    pub block_number: u64,
}

/// Referral relation between a beneficiary and an originator at a given level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRelation {
    /// Upline receiving the commission.
    pub beneficiary: UserId,
    /// Downline whose activity produces the commission.
    pub originator: UserId,
    /// Level.
    pub level: ReferralLevel,
    /// Referral count of the originator.
    pub originator_referrals: i64,
    /// Address of the originator.
    pub originator_address: Option<Address>,
    /// Contact email of the originator.
    pub originator_email: String,
    /// Display name of the originator.
    pub originator_name: String,
    /// Accumulated DIMP commission.
    pub dimp: Decimal,
    /// Accumulated DACT commission.
    pub dact: Decimal,
}

impl ReferralRelation {
    /// An empty relation.
    pub fn new(beneficiary: UserId, originator: UserId, level: ReferralLevel) -> Self {
        Self {
            beneficiary,
            originator,
            level,
            originator_referrals: 0,
            originator_address: None,
            originator_email: String::new(),
            originator_name: String::new(),
            dimp: Decimal::ZERO,
            dact: Decimal::ZERO,
        }
    }

    /// Refresh the originator metadata.
    pub fn describe(&mut self, originator: &User) -> &mut Self {
        self.originator_referrals = originator.ref_counter;
        self.originator_address = originator.address;
        self.originator_email = originator.contact_email().to_string();
        self.originator_name = originator.google_name.clone();
        self
    }
}
