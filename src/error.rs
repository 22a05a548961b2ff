//! Typed errors for the chain layer.

/// Failures surfaced by on-chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// No RPC endpoint or relayer key configured.
    #[error("chain access not configured: {0}")]
    NotConfigured(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    /// Transaction mined with a failed status.
    #[error("{label} transaction reverted: {hash}")]
    Reverted { label: String, hash: String },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("no wallet for handle '{0}'")]
    WalletNotFound(String),
}
