/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RPC transport error.
    #[error("rpc: {0}")]
    Rpc(#[from] alloy::transports::TransportError),
    /// ABI error.
    #[error("abi: {0}")]
    Abi(#[from] alloy::sol_types::Error),
    /// Log decoding error.
    #[error("decode: {0}")]
    Decode(#[from] crate::log::DecodeError),
    /// Utils error.
    #[error("utils: {0}")]
    Utils(#[from] dimp_utils::Error),
    /// No signer has been configured for the write path.
    #[error("signer is not configured")]
    SignerNotConfigured,
    /// Invalid signer.
    #[error("signer: {0}")]
    Signer(String),
    /// Missing data in an RPC response.
    #[error("missing: {0}")]
    Missing(&'static str),
    /// Fee overflow.
    #[error("fee overflow")]
    FeeOverflow,
}

impl Error {
    /// Whether the error comes from the transport and is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Missing(_))
    }
}
