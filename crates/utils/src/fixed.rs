use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{constants::DIMP_DECIMALS, Error};

const MAX_REPR: u128 = 0x0000_0000_FFFF_FFFF_FFFF_FFFF_FFFF_FFFF;

/// Convert an unsigned fixed-point number to [`Decimal`].
///
/// Returns `None` if it cannot be represented exactly as a [`Decimal`].
///
/// # Examples
///
/// ```
/// use dimp_utils::fixed::unsigned_fixed_to_decimal;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     unsigned_fixed_to_decimal(100_451_723_195, 6),
///     Some(dec!(100_451.723195)),
/// );
///
/// assert_eq!(unsigned_fixed_to_decimal(u128::MAX, 6), None);
/// ```
pub fn unsigned_fixed_to_decimal(num: u128, decimals: u8) -> Option<Decimal> {
    if num > MAX_REPR {
        return None;
    }
    Decimal::try_from_i128_with_scale(num as i128, decimals as u32)
        .ok()
        .map(|d| d.normalize())
}

/// Convert a contract amount (in units of `10^-6` DIMP) to a ledger amount.
///
/// The conversion is exact; amounts beyond the range of [`Decimal`] are rejected.
///
/// # Examples
///
/// ```
/// use dimp_utils::fixed::contract_amount_to_decimal;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(contract_amount_to_decimal(1_500_000).unwrap(), dec!(1.5));
/// ```
pub fn contract_amount_to_decimal(raw: u128) -> crate::Result<Decimal> {
    unsigned_fixed_to_decimal(raw, DIMP_DECIMALS).ok_or(Error::Overflow("contract amount"))
}

/// Convert a ledger amount to a contract amount (in units of `10^-6` DIMP).
///
/// Digits beyond the sixth decimal place are truncated toward zero.
///
/// # Examples
///
/// ```
/// use dimp_utils::fixed::decimal_to_contract_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(decimal_to_contract_amount(dec!(1234.5678919)).unwrap(), 1_234_567_891);
/// assert!(decimal_to_contract_amount(dec!(-1)).is_err());
/// ```
pub fn decimal_to_contract_amount(amount: Decimal) -> crate::Result<u128> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::NegativeAmount(amount));
    }
    let factor = Decimal::from(10u64.pow(DIMP_DECIMALS as u32));
    amount
        .checked_mul(factor)
        .map(|scaled| scaled.trunc())
        .and_then(|scaled| scaled.to_u128())
        .ok_or(Error::Overflow("ledger amount"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_contract_amount_to_decimal() {
        assert_eq!(contract_amount_to_decimal(0).unwrap(), Decimal::ZERO);
        assert_eq!(contract_amount_to_decimal(1).unwrap(), dec!(0.000001));
        assert_eq!(
            contract_amount_to_decimal(1_000_000_000_000).unwrap(),
            dec!(1_000_000)
        );
        assert!(contract_amount_to_decimal(u128::MAX).is_err());
    }

    #[test]
    fn test_decimal_to_contract_amount_truncates() {
        assert_eq!(decimal_to_contract_amount(dec!(0.0000019)).unwrap(), 1);
        assert_eq!(decimal_to_contract_amount(dec!(1050)).unwrap(), 1_050_000_000);
        assert_eq!(decimal_to_contract_amount(Decimal::ZERO).unwrap(), 0);
        assert!(matches!(
            decimal_to_contract_amount(dec!(-0.5)),
            Err(Error::NegativeAmount(_))
        ));
    }

    #[test]
    fn test_ledger_amount_survives_contract_representation() {
        let amount = dec!(98765.432101);
        let raw = decimal_to_contract_amount(amount).unwrap();
        assert_eq!(contract_amount_to_decimal(raw).unwrap(), amount);
    }
}
