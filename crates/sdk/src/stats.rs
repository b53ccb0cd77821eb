use dimp_utils::{Decimal, ReferralLevel, UserId};
use serde::{Deserialize, Serialize};

use crate::{model::ReferralRelation, store::LedgerStore};

/// Largest page accepted by [`referral_page`].
pub const MAX_PAGE_SIZE: usize = 100;

/// Referral counters and commission totals of a beneficiary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferralStats {
    /// Number of relations.
    pub total_counter: u64,
    /// Level 1 relations.
    pub lvl_one_counter: u64,
    /// Level 2 relations.
    pub lvl_two_counter: u64,
    /// Level 3 relations.
    pub lvl_three_counter: u64,
    /// DIMP earned over all levels.
    pub dimp_total: Decimal,
    /// DIMP earned from level 1.
    pub dimp_lvl_one: Decimal,
    /// DIMP earned from level 2.
    pub dimp_lvl_two: Decimal,
    /// DIMP earned from level 3.
    pub dimp_lvl_three: Decimal,
    /// DACT earned over all levels.
    pub dact_total: Decimal,
    /// DACT earned from level 1.
    pub dact_lvl_one: Decimal,
    /// DACT earned from level 2.
    pub dact_lvl_two: Decimal,
    /// DACT earned from level 3.
    pub dact_lvl_three: Decimal,
}

impl ReferralStats {
    /// Aggregate relations of a single beneficiary.
    pub fn aggregate<'a>(relations: impl IntoIterator<Item = &'a ReferralRelation>) -> Self {
        let mut stats = Self::default();
        for relation in relations {
            stats.total_counter += 1;
            stats.dimp_total += relation.dimp;
            stats.dact_total += relation.dact;
            let (counter, dimp, dact) = match relation.level {
                ReferralLevel::One => (
                    &mut stats.lvl_one_counter,
                    &mut stats.dimp_lvl_one,
                    &mut stats.dact_lvl_one,
                ),
                ReferralLevel::Two => (
                    &mut stats.lvl_two_counter,
                    &mut stats.dimp_lvl_two,
                    &mut stats.dact_lvl_two,
                ),
                ReferralLevel::Three => (
                    &mut stats.lvl_three_counter,
                    &mut stats.dimp_lvl_three,
                    &mut stats.dact_lvl_three,
                ),
            };
            *counter += 1;
            *dimp += relation.dimp;
            *dact += relation.dact;
        }
        stats
    }
}

/// Load and aggregate the referral statistics of `beneficiary`.
pub async fn referral_stats(
    store: &dyn LedgerStore,
    beneficiary: UserId,
) -> crate::Result<ReferralStats> {
    let relations = store.referrals_of(beneficiary).await?;
    Ok(ReferralStats::aggregate(&relations))
}

/// A page of referral relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralPage {
    /// Total number of relations.
    pub count: usize,
    /// Next page number, if any.
    pub next: Option<usize>,
    /// Previous page number, if any.
    pub previous: Option<usize>,
    /// Relations on this page.
    pub results: Vec<ReferralRelation>,
}

/// Load one page of the relations of `beneficiary`, most recent first.
///
/// Pages are numbered from `1`.
pub async fn referral_page(
    store: &dyn LedgerStore,
    beneficiary: UserId,
    page: usize,
    size: usize,
) -> crate::Result<ReferralPage> {
    if page == 0 {
        return Err(crate::Error::invalid_argument("pages are numbered from 1"));
    }
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(crate::Error::invalid_argument(format!(
            "page size must be in 1..={MAX_PAGE_SIZE}"
        )));
    }
    let mut relations = store.referrals_of(beneficiary).await?;
    relations.reverse();
    let count = relations.len();
    let start = (page - 1).saturating_mul(size);
    let results = relations.into_iter().skip(start).take(size).collect();
    Ok(ReferralPage {
        count,
        next: (start.saturating_add(size) < count).then_some(page + 1),
        previous: (page > 1 && start <= count).then(|| page - 1),
        results,
    })
}
