use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{constants::USD_CONVERSION_PRECISION, Error, ReferralLevel};

/// Application configuration shared through the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Settings.
    pub settings: Settings,
    /// Price of one DIMP in USD.
    pub dimp_usd_rate: Decimal,
}

/// Settings of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Referral commission rates.
    #[serde(rename = "ref")]
    pub referral: ReferralRates,
    /// Price table in USD.
    pub prices: Prices,
    /// Withdrawal limits.
    pub limits: Limits,
}

/// Referral commission rate for each upline level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRates {
    /// Direct referrer.
    pub lvl_one: Decimal,
    /// Referrer of the direct referrer.
    pub lvl_two: Decimal,
    /// Third level.
    pub lvl_three: Decimal,
}

/// Prices of the rewarded actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prices {
    /// View.
    pub view: Decimal,
    /// Follower.
    pub follower: Decimal,
    /// Retweet.
    pub retweet: Decimal,
    /// Comment.
    pub comment: Decimal,
    /// Repost.
    pub repost: Decimal,
}

/// Withdrawal limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Minimal withdrawal in USD.
    pub withdraw_min: Decimal,
    /// Maximal withdrawal in USD.
    pub withdraw_max: Decimal,
    /// Minimal withdrawal in DIMP.
    pub withdraw_min_dimp: Decimal,
    /// Maximal withdrawal in DIMP.
    pub withdraw_max_dimp: Decimal,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: Settings {
                referral: ReferralRates {
                    lvl_one: Decimal::new(7, 2),
                    lvl_two: Decimal::new(5, 2),
                    lvl_three: Decimal::new(3, 2),
                },
                prices: Prices {
                    view: Decimal::new(5, 3),
                    follower: Decimal::new(1, 2),
                    retweet: Decimal::new(2, 2),
                    comment: Decimal::new(15, 2),
                    repost: Decimal::new(2, 1),
                },
                limits: Limits {
                    withdraw_min: Decimal::ONE,
                    withdraw_max: Decimal::ONE_HUNDRED,
                    withdraw_min_dimp: Decimal::ONE_THOUSAND,
                    withdraw_max_dimp: Decimal::new(100_000, 0),
                },
            },
            dimp_usd_rate: Decimal::new(1, 3),
        }
    }
}

impl ReferralRates {
    /// Commission rate for the given level.
    pub fn rate(&self, level: ReferralLevel) -> Decimal {
        match level {
            ReferralLevel::One => self.lvl_one,
            ReferralLevel::Two => self.lvl_two,
            ReferralLevel::Three => self.lvl_three,
        }
    }
}

impl AppConfig {
    /// Commission rate for the given referral level.
    pub fn referral_rate(&self, level: ReferralLevel) -> Decimal {
        self.settings.referral.rate(level)
    }

    /// Convert a USD value to DIMP, rounded to `precision` decimal places.
    ///
    /// # Examples
    ///
    /// ```
    /// use dimp_utils::AppConfig;
    /// use rust_decimal_macros::dec;
    ///
    /// let config = AppConfig::default();
    /// assert_eq!(config.usd_to_dimp(dec!(1), 2).unwrap(), dec!(1000));
    /// assert_eq!(config.usd_to_dimp(dec!(0.0123456), 2).unwrap(), dec!(12.35));
    /// ```
    pub fn usd_to_dimp(&self, usd: Decimal, precision: u32) -> crate::Result<Decimal> {
        if self.dimp_usd_rate <= Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "`dimp_usd_rate` must be positive, got {}",
                self.dimp_usd_rate
            )));
        }
        let dimp = usd
            .checked_div(self.dimp_usd_rate)
            .ok_or(Error::Overflow("usd to dimp"))?;
        Ok(dimp.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Minimal withdrawal in DIMP, using `override_usd` when it is positive.
    pub fn min_withdrawal(&self, override_usd: Decimal) -> crate::Result<Decimal> {
        let usd = if override_usd > Decimal::ZERO {
            override_usd
        } else {
            self.settings.limits.withdraw_min
        };
        self.usd_to_dimp(usd, USD_CONVERSION_PRECISION)
    }

    /// Maximal withdrawal in DIMP, using `override_usd` when it is positive.
    pub fn max_withdrawal(&self, override_usd: Decimal) -> crate::Result<Decimal> {
        let usd = if override_usd > Decimal::ZERO {
            override_usd
        } else {
            self.settings.limits.withdraw_max
        };
        self.usd_to_dimp(usd, USD_CONVERSION_PRECISION)
    }
}
