use std::time::Duration;

use rust_decimal::Decimal;

/// Decimals of DIMP amounts stored by the exchange contract.
pub const DIMP_DECIMALS: u8 = 6;

/// Default drift threshold (in DIMP) above which the reconciler corrects the contract.
pub const DEFAULT_DRIFT_THRESHOLD: Decimal = Decimal::from_parts(99, 0, 0, false, 0);

/// Default TTL of the per-user sync lock.
pub const DEFAULT_SYNC_LOCK_TTL: Duration = Duration::from_secs(60);

/// Default number of blocks re-scanned behind the chain head on start-up.
pub const DEFAULT_REORG_MARGIN: u64 = 20;

/// Default interval between two log polling passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default backoff after a failed RPC call.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Decimal places used when converting USD limits to DIMP.
pub const USD_CONVERSION_PRECISION: u32 = 2;

/// Cache key of the shared [`AppConfig`](crate::AppConfig).
pub const APP_CONFIG_KEY: &str = "app_config";

/// Prefix of the per-user sync lock key.
pub const SYNC_LOCK_PREFIX: &str = "is_syncing_";

/// Prefix of the per-user on-chain balance snapshot key.
pub const BALANCE_SNAPSHOT_PREFIX: &str = "balance_";

/// Prefix of the per-user notification channel.
pub const NOTIFICATION_CHANNEL_PREFIX: &str = "notification_ch@";
