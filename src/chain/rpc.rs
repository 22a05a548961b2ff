//! JSON-RPC backed [`TokenChain`] that sends every write from the relayer.

use crate::chain::contracts::{IAgentCoin, IAgentNFTs};
use crate::chain::{SignedPermit, TokenChain, TxOutcome};
use crate::error::ChainError;
use crate::identity::AgentKeypair;
use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Live chain access through an HTTP provider carrying the relayer wallet.
#[derive(Clone)]
pub struct RpcChain {
    provider: DynProvider<Ethereum>,
    token: Address,
    nft: Address,
    relayer: Address,
}

impl RpcChain {
    /// Build a provider for `rpc_url` that signs with `relayer_key`.
    pub fn connect(
        rpc_url: &str,
        relayer_key: &str,
        token: Address,
        nft: Address,
    ) -> Result<Self, ChainError> {
        let relayer = AgentKeypair::from_hex(relayer_key)?;
        let signer = relayer.to_signer()?;
        let url = rpc_url
            .parse()
            .map_err(|e| ChainError::NotConfigured(format!("invalid rpc_url '{rpc_url}': {e}")))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!("Chain relayer: {}", relayer.address_string());
        Ok(Self {
            provider,
            token,
            nft,
            relayer: relayer.address(),
        })
    }
}

/// Wait for a submitted transaction and require a successful receipt.
async fn confirm(
    label: &str,
    pending: PendingTransactionBuilder<Ethereum>,
) -> Result<TxOutcome, ChainError> {
    let hash = *pending.tx_hash();
    debug!("{} submitted: {:#x}", label, hash);

    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| ChainError::Rpc(format!("{label} receipt: {e}")))?;

    if !receipt.status() {
        warn!("{} reverted: {:#x}", label, hash);
        return Err(ChainError::Reverted {
            label: label.to_string(),
            hash: format!("{hash:#x}"),
        });
    }

    Ok(TxOutcome {
        hash,
        block_number: receipt.block_number(),
    })
}

fn rpc_err(op: &str) -> impl FnOnce(alloy::contract::Error) -> ChainError + '_ {
    move |e| ChainError::Rpc(format!("{op}: {e}"))
}

#[async_trait]
impl TokenChain for RpcChain {
    fn token_address(&self) -> Address {
        self.token
    }

    fn relayer_address(&self) -> Address {
        self.relayer
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_chainId: {e}")))
    }

    async fn token_name(&self) -> Result<String, ChainError> {
        IAgentCoin::new(self.token, &self.provider)
            .name()
            .call()
            .await
            .map_err(rpc_err("name()"))
    }

    async fn permit_nonce(&self, owner: Address) -> Result<U256, ChainError> {
        IAgentCoin::new(self.token, &self.provider)
            .nonces(owner)
            .call()
            .await
            .map_err(rpc_err("nonces()"))
    }

    async fn token_balance(&self, owner: Address) -> Result<U256, ChainError> {
        IAgentCoin::new(self.token, &self.provider)
            .balanceOf(owner)
            .call()
            .await
            .map_err(rpc_err("balanceOf()"))
    }

    async fn submit_permit(&self, signed: &SignedPermit) -> Result<TxOutcome, ChainError> {
        let p = &signed.permit;
        let sig = &signed.signature;
        let pending = IAgentCoin::new(self.token, &self.provider)
            .permit(p.owner, p.spender, p.value, p.deadline, sig.v, sig.r, sig.s)
            .send()
            .await
            .map_err(rpc_err("permit()"))?;
        confirm("permit", pending).await
    }

    async fn transfer_from(&self, from: Address, to: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        let pending = IAgentCoin::new(self.token, &self.provider)
            .transferFrom(from, to, amount)
            .send()
            .await
            .map_err(rpc_err("transferFrom()"))?;
        confirm("transferFrom", pending).await
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        let pending = IAgentCoin::new(self.token, &self.provider)
            .transfer(to, amount)
            .send()
            .await
            .map_err(rpc_err("transfer()"))?;
        confirm("transfer", pending).await
    }

    async fn mint_nft(&self, to: Address, token_uri: &str, title: &str) -> Result<TxOutcome, ChainError> {
        let pending = IAgentNFTs::new(self.nft, &self.provider)
            .mintAgentNFTsCollection(to, token_uri.to_string(), title.to_string())
            .send()
            .await
            .map_err(rpc_err("mintAgentNFTsCollection()"))?;
        confirm("mint", pending).await
    }

    async fn nft_balance(&self, owner: Address) -> Result<U256, ChainError> {
        IAgentNFTs::new(self.nft, &self.provider)
            .balanceOf(owner)
            .call()
            .await
            .map_err(rpc_err("nft balanceOf()"))
    }
}
