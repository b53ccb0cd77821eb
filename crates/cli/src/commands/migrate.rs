use super::{Command, Context};

/// Run the database migrations.
#[derive(Debug, clap::Args)]
pub struct Migrate {}

impl Command for Migrate {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let store = ctx.config().ledger_store().await?;
        store.migrate().await?;
        tracing::info!(database = %ctx.config().database_url(), "migrations applied");
        Ok(())
    }
}
