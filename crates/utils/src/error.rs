/// Utils error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The value cannot be represented in the target type.
    #[error("overflow: {0}")]
    Overflow(&'static str),
    /// Negative amounts have no on-chain representation.
    #[error("negative amount: {0}")]
    NegativeAmount(rust_decimal::Decimal),
    /// Unknown discriminant.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// Enum name.
        kind: &'static str,
        /// Raw value.
        value: String,
    },
    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn unknown_variant(kind: &'static str, value: impl ToString) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.to_string(),
        }
    }
}
