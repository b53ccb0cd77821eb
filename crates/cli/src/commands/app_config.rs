use super::{print_json, Command, Context};

/// Show the shared app config.
#[derive(Debug, clap::Args)]
pub struct AppConfig {
    /// Replace the cached config with the defaults.
    #[arg(long)]
    reset: bool,
}

impl Command for AppConfig {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let client = ctx.client().await?;
        let loader = client.config_loader();
        let config = if self.reset {
            let config = loader.reset().await?;
            tracing::info!("app config reset to the defaults");
            config
        } else {
            loader.load().await?
        };
        print_json(&config)
    }
}
