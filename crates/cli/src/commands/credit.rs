use dimp_sdk::utils::{Decimal, TxKind, UserId};

use super::{print_json, Command, Context};

/// Credit pending rewards to a user and pay the referral commissions.
#[derive(Debug, clap::Args)]
pub struct Credit {
    /// User id.
    user: UserId,
    /// Kind of the credit, `reward` or `bonus`.
    #[arg(long, value_enum, default_value_t = TxKind::Reward)]
    kind: TxKind,
    /// DIMP amount.
    #[arg(long, default_value_t = Decimal::ZERO)]
    dimp: Decimal,
    /// DACT amount.
    #[arg(long, default_value_t = Decimal::ZERO)]
    dact: Decimal,
}

impl Command for Credit {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()> {
        let client = ctx.client().await?;
        let credit = client
            .credit(self.user, self.kind, self.dimp, self.dact)
            .await?;
        print_json(&credit)
    }
}
