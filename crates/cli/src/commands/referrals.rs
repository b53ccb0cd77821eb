use dimp_sdk::utils::UserId;

use super::{print_json, Command, Context};

/// Show referral statistics of a user.
#[derive(Debug, clap::Args)]
pub struct Referrals {
    /// User id.
    user: UserId,
    /// List the referrals on this page instead of the totals.
    #[arg(long)]
    page: Option<usize>,
    /// Page size.
    #[arg(long, default_value_t = 20)]
    size: usize,
}

impl Command for Referrals {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let client = ctx.client().await?;
        match self.page {
            Some(page) => print_json(&client.referral_page(self.user, page, self.size).await?),
            None => print_json(&client.referral_stats(self.user).await?),
        }
    }
}
