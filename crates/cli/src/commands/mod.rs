use std::path::Path;

use app_config::AppConfig;
use credit::Credit;
use enum_dispatch::enum_dispatch;
use init_config::InitConfig;
use migrate::Migrate;
use referrals::Referrals;
use sync::SyncBalance;
use sync_request::SyncRequest;
use watch::Watch;

use crate::config::Config;

mod app_config;
mod credit;
mod init_config;
mod migrate;
mod referrals;
mod sync;
mod sync_request;
mod watch;

/// Commands.
#[enum_dispatch]
#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Initialize config file.
    InitConfig(InitConfig),
    /// Run the database migrations.
    Migrate(Migrate),
    /// Watch deposit and withdraw events of the exchange contract.
    Watch(Watch),
    /// Merge approved rewards and reconcile the on-chain balance of a user.
    Sync(SyncBalance),
    /// Manage sync requests.
    SyncRequest(SyncRequest),
    /// Credit a reward or a bonus.
    Credit(Credit),
    /// Show referral statistics.
    Referrals(Referrals),
    /// Show or reset the shared app config.
    AppConfig(AppConfig),
}

#[enum_dispatch(Commands)]
pub(crate) trait Command {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()>;
}

pub(crate) struct Context<'a> {
    config_path: &'a Path,
    config: &'a Config,
}

impl<'a> Context<'a> {
    pub(super) fn new(config_path: &'a Path, config: &'a Config) -> Self {
        Self {
            config_path,
            config,
        }
    }

    pub(crate) fn config_path(&self) -> &Path {
        self.config_path
    }

    pub(crate) fn config(&self) -> &Config {
        self.config
    }

    pub(crate) async fn client(&self) -> eyre::Result<dimp_sdk::Client> {
        self.config.client().await
    }
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json(value: &impl serde::Serialize) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
