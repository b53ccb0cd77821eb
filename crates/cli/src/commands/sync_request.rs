use dimp_sdk::utils::{Decimal, UserId};

use super::{print_json, Command, Context};

/// Sync request commands.
#[derive(Debug, clap::Args)]
pub struct SyncRequest {
    #[command(subcommand)]
    command: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    /// File a sync request on behalf of a user.
    Create {
        user: UserId,
        /// Amount to merge. Defaults to all pending rewards.
        #[arg(long, default_value_t = Decimal::ZERO)]
        amount: Decimal,
    },
    /// Approve the pending sync request of a user.
    Approve {
        user: UserId,
        /// Approving administrator.
        #[arg(long)]
        admin: Option<UserId>,
        /// Run the sync right after the approval.
        #[arg(long)]
        sync: bool,
    },
    /// Reject the pending sync request of a user.
    Reject {
        user: UserId,
        /// Rejecting administrator.
        #[arg(long)]
        admin: Option<UserId>,
    },
}

impl Command for SyncRequest {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let client = ctx.client().await?;
        let entry = match &self.command {
            Subcommand::Create { user, amount } => client.request_sync(*user, *amount).await?,
            Subcommand::Approve { user, admin, sync } => {
                let entry = client.approve_sync_request(*user, *admin).await?;
                if *sync {
                    let report = client.sync(*user).await?;
                    tracing::info!(merged = ?report.merged, action = ?report.action, "synced");
                }
                entry
            }
            Subcommand::Reject { user, admin } => {
                client.reject_sync_request(*user, *admin).await?
            }
        };
        print_json(&entry)
    }
}
