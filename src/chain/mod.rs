//! On-chain access: the agent token, its permits, and the NFT collection.
//!
//! All writes are sent from the relayer (deployer) wallet. Agent keys only
//! ever sign permits off-chain.

pub mod contracts;
pub mod funding;
pub mod permit;
pub mod rpc;
pub mod transfer;
pub mod treasury;

pub use funding::InitialFunder;
pub use permit::{PermitSigner, SignedPermit};
pub use rpc::RpcChain;
pub use transfer::{TokenTransferCoordinator, TransferReceipt};
pub use treasury::Treasury;

use crate::error::ChainError;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

/// A confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub hash: B256,
    pub block_number: Option<u64>,
}

impl TxOutcome {
    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash)
    }
}

/// Operations against the agent token and NFT contracts.
///
/// Submitting methods wait for the receipt and fail with
/// [`ChainError::Reverted`] when the transaction did not succeed.
#[async_trait]
pub trait TokenChain: Send + Sync {
    fn token_address(&self) -> Address;
    fn relayer_address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64, ChainError>;
    async fn token_name(&self) -> Result<String, ChainError>;
    /// Current ERC-2612 nonce of `owner`.
    async fn permit_nonce(&self, owner: Address) -> Result<U256, ChainError>;
    async fn token_balance(&self, owner: Address) -> Result<U256, ChainError>;

    async fn submit_permit(&self, permit: &SignedPermit) -> Result<TxOutcome, ChainError>;
    async fn transfer_from(&self, from: Address, to: Address, amount: U256) -> Result<TxOutcome, ChainError>;
    /// Transfer from the relayer's own balance.
    async fn transfer(&self, to: Address, amount: U256) -> Result<TxOutcome, ChainError>;

    async fn mint_nft(&self, to: Address, token_uri: &str, title: &str) -> Result<TxOutcome, ChainError>;
    async fn nft_balance(&self, owner: Address) -> Result<U256, ChainError>;
}

/// Chain used when no RPC endpoint or relayer key is configured.
#[derive(Debug, Clone)]
pub struct OfflineChain {
    token: Address,
    relayer: Address,
}

impl OfflineChain {
    pub fn new(token: Address, relayer: Address) -> Self {
        Self { token, relayer }
    }

    fn unavailable<T>(&self, op: &str) -> Result<T, ChainError> {
        Err(ChainError::NotConfigured(format!(
            "{op} needs rpc_url and deployer_private_key"
        )))
    }
}

#[async_trait]
impl TokenChain for OfflineChain {
    fn token_address(&self) -> Address {
        self.token
    }

    fn relayer_address(&self) -> Address {
        self.relayer
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.unavailable("chain_id")
    }

    async fn token_name(&self) -> Result<String, ChainError> {
        self.unavailable("name")
    }

    async fn permit_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
        self.unavailable("nonces")
    }

    async fn token_balance(&self, _owner: Address) -> Result<U256, ChainError> {
        self.unavailable("balanceOf")
    }

    async fn submit_permit(&self, _permit: &SignedPermit) -> Result<TxOutcome, ChainError> {
        self.unavailable("permit")
    }

    async fn transfer_from(&self, _from: Address, _to: Address, _amount: U256) -> Result<TxOutcome, ChainError> {
        self.unavailable("transferFrom")
    }

    async fn transfer(&self, _to: Address, _amount: U256) -> Result<TxOutcome, ChainError> {
        self.unavailable("transfer")
    }

    async fn mint_nft(&self, _to: Address, _token_uri: &str, _title: &str) -> Result<TxOutcome, ChainError> {
        self.unavailable("mintAgentNFTsCollection")
    }

    async fn nft_balance(&self, _owner: Address) -> Result<U256, ChainError> {
        self.unavailable("balanceOf")
    }
}

/// Parse a hex address, mapping failures to [`ChainError::InvalidKey`].
pub fn parse_address(value: &str) -> Result<Address, ChainError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| ChainError::InvalidKey(format!("invalid address '{value}': {e}")))
}
