//! Relayer-side token and NFT operations addressed by agent handle.

use crate::chain::{parse_address, TokenChain, TokenTransferCoordinator, TransferReceipt, TxOutcome};
use crate::error::ChainError;
use crate::notify::Notifier;
use crate::state::AgentStore;
use crate::types::{clean_handle, WalletRow};
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Token grants, charges, balances and NFT minting for agent wallets.
#[derive(Clone)]
pub struct Treasury {
    chain: Arc<dyn TokenChain>,
    store: Arc<dyn AgentStore>,
    notifier: Arc<dyn Notifier>,
    coordinator: TokenTransferCoordinator,
}

impl Treasury {
    pub fn new(chain: Arc<dyn TokenChain>, store: Arc<dyn AgentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            coordinator: TokenTransferCoordinator::new(chain.clone(), notifier.clone()),
            chain,
            store,
            notifier,
        }
    }

    async fn wallet(&self, handle: &str) -> Result<WalletRow> {
        let handle = clean_handle(handle);
        self.store
            .get_wallet(&handle)
            .await?
            .ok_or_else(|| ChainError::WalletNotFound(handle).into())
    }

    /// Token balance in base units. Zero when the handle has no wallet or
    /// the chain read fails.
    pub async fn balance_of_handle(&self, handle: &str) -> Result<U256> {
        let Some(wallet) = self.store.get_wallet(&clean_handle(handle)).await? else {
            return Ok(U256::ZERO);
        };
        let address = parse_address(&wallet.address)?;
        match self.chain.token_balance(address).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                warn!("Error getting token balance of {}: {}", wallet.handle, e);
                Ok(U256::ZERO)
            }
        }
    }

    /// Relayer pays `amount` to the agent.
    pub async fn grant(&self, handle: &str, amount: U256) -> Result<TxOutcome> {
        let wallet = self.wallet(handle).await?;
        let to = parse_address(&wallet.address)?;
        let outcome = self
            .chain
            .transfer(to, amount)
            .await
            .with_context(|| format!("Grant to {} failed", wallet.handle))?;

        info!("Granted {} tokens to {}", format_ether(amount), wallet.handle);
        self.notifier
            .notify(&format!(
                "Sent {} $AGENT to {} from the treasury to {}",
                format_ether(amount),
                wallet.address,
                wallet.handle
            ))
            .await;
        Ok(outcome)
    }

    /// Agent pays `amount` back to the relayer.
    pub async fn charge(&self, handle: &str, amount: U256) -> Result<TransferReceipt> {
        let wallet = self.wallet(handle).await?;
        let receipt = self
            .coordinator
            .transfer(&wallet, self.chain.relayer_address(), amount)
            .await?;
        self.notifier
            .notify(&format!(
                "The treasury charged {} $AGENT from {}",
                format_ether(amount),
                wallet.handle
            ))
            .await;
        Ok(receipt)
    }

    /// Move `amount` between two agents' wallets.
    pub async fn transfer_between(&self, from: &str, to: &str, amount: U256) -> Result<TransferReceipt> {
        let source = self.wallet(from).await?;
        let target = self.wallet(to).await?;
        self.coordinator
            .transfer(&source, parse_address(&target.address)?, amount)
            .await
    }

    /// Mint an artwork NFT into the agent's wallet.
    pub async fn mint_nft(&self, handle: &str, artwork_url: &str, title: &str) -> Result<TxOutcome> {
        let wallet = self.wallet(handle).await?;
        let to = parse_address(&wallet.address)?;
        info!("Minting NFT '{}' ({}) to {}", title, artwork_url, wallet.address);

        match self.chain.mint_nft(to, artwork_url, title).await {
            Ok(outcome) => {
                self.notifier
                    .notify(&format!(
                        "NFT minted for {} in tx {}",
                        wallet.handle,
                        outcome.hash_hex()
                    ))
                    .await;
                Ok(outcome)
            }
            Err(e) => {
                error!("Error minting NFT for {}: {}", wallet.handle, e);
                self.notifier
                    .notify(&format!("Error minting NFT for agent: {}", wallet.handle))
                    .await;
                Err(e).context("NFT mint failed")
            }
        }
    }

    /// NFTs held by `address`; zero when the read fails.
    pub async fn owned_nfts(&self, address: Address) -> u64 {
        match self.chain.nft_balance(address).await {
            Ok(balance) => u64::try_from(balance).unwrap_or(u64::MAX),
            Err(e) => {
                warn!("Error getting NFT balance of {}: {}", address, e);
                0
            }
        }
    }
}
