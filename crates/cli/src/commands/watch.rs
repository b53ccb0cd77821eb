use dimp_sdk::utils::Direction;
use tokio::task::JoinSet;

use super::{Command, Context};

/// Watch exchange contract events until interrupted.
#[derive(Debug, clap::Args)]
pub struct Watch {
    /// Only watch events of this direction.
    #[arg(long, value_enum)]
    only: Option<Direction>,
}

impl Command for Watch {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let client = ctx.client().await?;
        let directions = match self.only {
            Some(direction) => vec![direction],
            None => vec![Direction::Deposit, Direction::Withdraw],
        };

        // Dropping the set aborts the remaining watchers.
        let mut watchers = JoinSet::new();
        for direction in directions {
            watchers.spawn(client.event_watcher(direction).watch());
        }

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("interrupted, stopping watchers");
                Ok(())
            }
            Some(res) = watchers.join_next() => {
                res??;
                eyre::bail!("a watcher stopped unexpectedly");
            }
        }
    }
}
