//! Permit-then-transferFrom movement of tokens out of agent wallets.

use crate::chain::{parse_address, PermitSigner, TokenChain, TxOutcome};
use crate::error::ChainError;
use crate::identity::AgentKeypair;
use crate::notify::Notifier;
use crate::types::WalletRow;
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

/// The two confirmed transactions of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub permit: TxOutcome,
    pub transfer: TxOutcome,
}

/// Moves tokens from an agent wallet using a fresh permit.
///
/// The relayer submits `permit` and waits for it to confirm before
/// submitting `transferFrom`. Any failed step aborts the whole transfer.
#[derive(Clone)]
pub struct TokenTransferCoordinator {
    chain: Arc<dyn TokenChain>,
    signer: PermitSigner,
    notifier: Arc<dyn Notifier>,
}

impl TokenTransferCoordinator {
    pub fn new(chain: Arc<dyn TokenChain>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            signer: PermitSigner::new(chain.clone()),
            chain,
            notifier,
        }
    }

    /// Transfer `amount` (base units) from `from` to `to`.
    pub async fn transfer(&self, from: &WalletRow, to: Address, amount: U256) -> Result<TransferReceipt> {
        match self.run(from, to, amount).await {
            Ok(receipt) => {
                info!(
                    "Transferred {} tokens {} -> {} (tx {})",
                    format_ether(amount),
                    from.address,
                    to,
                    receipt.transfer.hash_hex()
                );
                self.notifier
                    .notify(&format!(
                        "Sent {} $AGENT from {} to {}",
                        format_ether(amount),
                        from.address,
                        to
                    ))
                    .await;
                Ok(receipt)
            }
            Err(e) => {
                error!("Transfer from {} failed: {:#}", from.handle, e);
                self.notifier
                    .notify(&format!("Transfer from {} to {} failed: {:#}", from.address, to, e))
                    .await;
                Err(e)
            }
        }
    }

    async fn run(&self, from: &WalletRow, to: Address, amount: U256) -> Result<TransferReceipt> {
        let owner = AgentKeypair::from_hex(&from.private_key)
            .with_context(|| format!("Wallet key for '{}' is unusable", from.handle))?;
        if parse_address(&from.address)? != owner.address() {
            return Err(ChainError::InvalidKey(format!(
                "stored key does not match address {}",
                from.address
            )))
            .context("Wallet row is inconsistent");
        }

        let signed = self
            .signer
            .sign_max_permit(&owner, self.chain.relayer_address())
            .await
            .context("Failed to sign permit")?;

        let permit = self
            .chain
            .submit_permit(&signed)
            .await
            .context("Permit transaction failed")?;

        let transfer = self
            .chain
            .transfer_from(owner.address(), to, amount)
            .await
            .context("transferFrom transaction failed")?;

        Ok(TransferReceipt { permit, transfer })
    }
}
