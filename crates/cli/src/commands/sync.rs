use dimp_sdk::{reconcile::ReconcileAction, utils::UserId};

use super::{print_json, Command, Context};

/// Merge approved rewards and reconcile the on-chain balance of a user.
#[derive(Debug, clap::Args)]
pub struct SyncBalance {
    /// User id.
    user: UserId,
    /// Also print the refreshed user data.
    #[arg(long)]
    show_data: bool,
}

impl Command for SyncBalance {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let client = ctx.client().await?;
        let report = client.sync(self.user).await?;

        if let Some(merged) = report.merged {
            println!("Merged {merged} DIMP of approved rewards");
        }
        match report.action {
            ReconcileAction::NoAddress => println!("No address bound, nothing to reconcile"),
            ReconcileAction::BaselineSeeded { balance } => {
                println!("Recorded {balance} DIMP as the baseline snapshot")
            }
            ReconcileAction::WithinThreshold { drift } => {
                println!("Drift of {drift} DIMP is within the threshold")
            }
            ReconcileAction::AlreadyInSync { amount } => {
                println!("Contract already holds {amount}")
            }
            ReconcileAction::LockBusy => println!("Another sync is in progress, try again later"),
            ReconcileAction::Written { tx_hash, amount } => {
                println!("Balance set to {amount}: {tx_hash}")
            }
        }

        if self.show_data {
            print_json(&report.envelope)?;
        }
        Ok(())
    }
}
