use dimp_evm_utils::alloy::primitives::{Address, B256, U256};
use dimp_utils::{Decimal, UserId};

/// SDK Error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from [`dimp_evm_utils`].
    #[error("chain: {0}")]
    Chain(#[from] dimp_evm_utils::Error),
    /// Error from [`dimp_utils`].
    #[error("utils: {0}")]
    Utils(#[from] dimp_utils::Error),
    /// Ledger store error.
    #[error("store: {0}")]
    Store(String),
    /// Cache error.
    #[error("cache: {0}")]
    Cache(String),
    /// Json error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Request rejected.
    #[error("rejected: {0}")]
    Rejected(Rejection),
    /// Policy violation.
    #[error("policy violation: {0}")]
    Policy(PolicyViolation),
    /// Not found error.
    #[error("not found: {0}")]
    NotFound(String),
    /// The chain transaction has already been recorded.
    #[error("chain transaction {0} has already been recorded")]
    DuplicateHash(B256),
    /// The address is bound to another user.
    #[error("address {address} is already bound to user {owner}")]
    AddressTaken {
        /// Address.
        address: Address,
        /// Current owner.
        owner: UserId,
    },
    /// Invalid amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Configuration error.
    #[error("config: {0}")]
    Config(String),
}

/// Reasons a user request is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    /// The amount exceeds the spendable balance.
    InsufficientFunds,
    /// The amount is below the minimal withdrawal.
    MinWithdrawal,
    /// The amount is above the maximal withdrawal.
    MaxWithdrawal,
    /// A previous request is still pending.
    WaitUntilResolved,
}

impl Rejection {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// Policy violations detected by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// The ledger holds more than the contract without an approved sync request.
    #[error("user {user}: ledger balance {target} exceeds on-chain balance {on_chain} without an approved sync")]
    UnauthorizedIncrease {
        /// User.
        user: UserId,
        /// Contract amount derived from the ledger.
        target: U256,
        /// Contract amount currently on chain.
        on_chain: U256,
    },
}

impl Error {
    /// Create a store error.
    pub fn store(msg: impl ToString) -> Self {
        Self::Store(msg.to_string())
    }

    /// Create a cache error.
    pub fn cache(msg: impl ToString) -> Self {
        Self::Cache(msg.to_string())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl ToString) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    /// Create a not found error.
    pub fn not_found(what: impl ToString) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Chain(err) => err.is_transient(),
            Self::Store(_) | Self::Cache(_) => true,
            _ => false,
        }
    }

    /// Reason code if the error is a rejection.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<Rejection> for Error {
    fn from(value: Rejection) -> Self {
        Self::Rejected(value)
    }
}

impl From<PolicyViolation> for Error {
    fn from(value: PolicyViolation) -> Self {
        Self::Policy(value)
    }
}

#[cfg(postgres)]
impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        Self::Store(value.to_string())
    }
}

#[cfg(postgres)]
impl From<sqlx::migrate::MigrateError> for Error {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::Config(format!("migrate: {value}"))
    }
}

#[cfg(redis)]
impl From<redis::RedisError> for Error {
    fn from(value: redis::RedisError) -> Self {
        Self::Cache(value.to_string())
    }
}
