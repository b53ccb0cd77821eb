use std::sync::Arc;

use dimp_utils::{AppConfig, Decimal, ReferralLevel, UserId};
use serde::Serialize;

use crate::{model::ReferralRelation, store::LedgerStore};

/// Commission credited to one upline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelCredit {
    /// Level of the beneficiary relative to the originator.
    pub level: ReferralLevel,
    /// Upline receiving the commission.
    pub beneficiary: UserId,
    /// DIMP credited.
    pub dimp: Decimal,
    /// DACT credited.
    pub dact: Decimal,
}

/// Distributes commissions over the upline chain of a user.
///
/// Each level is committed in its own transaction holding the beneficiary's
/// row lock. A failure at one level leaves the lower levels committed.
#[derive(Clone)]
pub struct ReferralDistributor {
    store: Arc<dyn LedgerStore>,
}

impl ReferralDistributor {
    /// Create a distributor over `store`.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Credit `rate[level] * dimp` and `rate[level] * dact` to each of the
    /// (up to three) uplines of `originator`.
    pub async fn distribute(
        &self,
        config: &AppConfig,
        originator: UserId,
        dimp: Decimal,
        dact: Decimal,
    ) -> crate::Result<Vec<LevelCredit>> {
        if dimp < Decimal::ZERO || dact < Decimal::ZERO {
            return Err(crate::Error::InvalidAmount(dimp.min(dact)));
        }
        self.walk(originator, |level| {
            let rate = config.referral_rate(level);
            (rate * dimp, rate * dact)
        })
        .await
    }

    /// Materialize the relations of `originator` without crediting anything.
    pub async fn link(&self, originator: UserId) -> crate::Result<Vec<LevelCredit>> {
        self.walk(originator, |_| (Decimal::ZERO, Decimal::ZERO))
            .await
    }

    async fn walk(
        &self,
        originator: UserId,
        deltas: impl Fn(ReferralLevel) -> (Decimal, Decimal),
    ) -> crate::Result<Vec<LevelCredit>> {
        let origin = self
            .store
            .user(originator)
            .await?
            .ok_or_else(|| crate::Error::not_found(format!("user {originator}")))?;

        let mut visited = vec![originator];
        let mut next = origin.upline;
        let mut credits = Vec::with_capacity(ReferralLevel::ALL.len());

        for level in ReferralLevel::ALL {
            let Some(beneficiary) = next else {
                break;
            };
            if visited.contains(&beneficiary) {
                tracing::warn!(%originator, %beneficiary, %level, "upline cycle detected");
                break;
            }
            visited.push(beneficiary);

            let (dimp, dact) = deltas(level);
            let mut tx = self.store.begin().await?;
            let Some(mut upline) = tx.lock_user(beneficiary).await? else {
                tracing::warn!(%originator, %beneficiary, %level, "upline not found");
                break;
            };

            let mut relation: ReferralRelation = tx
                .find_or_init_referral(beneficiary, originator, level)
                .await?;
            relation.describe(&origin);
            relation.dimp += dimp;
            relation.dact += dact;
            tx.save_referral(&relation).await?;

            upline.rewards += dimp;
            upline.dimp_earned += dimp;
            upline.dact_earned += dact;
            tx.save_user(&upline).await?;
            tx.commit().await?;

            tracing::debug!(%originator, %beneficiary, %level, %dimp, %dact, "credited referral commission");
            credits.push(LevelCredit {
                level,
                beneficiary,
                dimp,
                dact,
            });
            next = upline.upline;
        }

        Ok(credits)
    }
}
