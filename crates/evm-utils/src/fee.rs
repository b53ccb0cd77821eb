/// Fee estimate for an EIP-1559 transaction, in wei per gas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeEstimate {
    base_fee: u128,
    priority_fee: u128,
    min_priority_fee: Option<u128>,
}

impl FeeEstimate {
    /// Create a new estimate.
    pub fn new(base_fee: u128, priority_fee: u128) -> Self {
        Self {
            base_fee,
            priority_fee,
            min_priority_fee: None,
        }
    }

    /// Set priority fee.
    #[inline]
    pub fn with_priority_fee(mut self, priority_fee: u128) -> Self {
        self.set_priority_fee(priority_fee);
        self
    }

    /// Set min priority fee.
    #[inline]
    pub fn with_min_priority_fee(mut self, min_priority_fee: Option<u128>) -> Self {
        self.set_min_priority_fee(min_priority_fee);
        self
    }

    /// Set priority fee.
    pub fn set_priority_fee(&mut self, priority_fee: u128) -> &mut Self {
        self.priority_fee = priority_fee;
        self
    }

    /// Set min priority fee.
    pub fn set_min_priority_fee(&mut self, min_priority_fee: Option<u128>) -> &mut Self {
        self.min_priority_fee = min_priority_fee;
        self
    }

    /// Base fee of the latest block.
    pub fn base_fee(&self) -> u128 {
        self.base_fee
    }

    /// Priority fee, raised to the configured minimum.
    pub fn priority_fee(&self) -> u128 {
        match self.min_priority_fee {
            Some(min) => self.priority_fee.max(min),
            None => self.priority_fee,
        }
    }

    /// Fee cap: base fee plus priority fee.
    pub fn max_fee_per_gas(&self) -> crate::Result<u128> {
        self.base_fee
            .checked_add(self.priority_fee())
            .ok_or(crate::Error::FeeOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_fee_is_base_plus_priority() {
        let fees = FeeEstimate::new(30_000_000_000, 1_500_000_000);
        assert_eq!(fees.max_fee_per_gas().unwrap(), 31_500_000_000);
    }

    #[test]
    fn test_min_priority_fee() {
        let fees = FeeEstimate::new(100, 1).with_min_priority_fee(Some(30));
        assert_eq!(fees.priority_fee(), 30);
        assert_eq!(fees.max_fee_per_gas().unwrap(), 130);
        assert!(FeeEstimate::new(u128::MAX, 1).max_fee_per_gas().is_err());
    }
}
