//! Initial token grant for new agent wallets.

use crate::chain::{TokenChain, TxOutcome};
use crate::error::ChainError;
use crate::notify::Notifier;
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Whole tokens granted to every new wallet unless configured otherwise.
pub const DEFAULT_INITIAL_GRANT: &str = "100";

/// Sends the starting balance from the relayer to new wallets.
#[derive(Clone)]
pub struct InitialFunder {
    chain: Arc<dyn TokenChain>,
    notifier: Arc<dyn Notifier>,
    amount: U256,
}

impl InitialFunder {
    /// `grant_tokens` is a decimal amount of whole tokens (18 decimals).
    pub fn new(chain: Arc<dyn TokenChain>, notifier: Arc<dyn Notifier>, grant_tokens: &str) -> Result<Self> {
        let amount = parse_ether(grant_tokens.trim())
            .with_context(|| format!("Invalid initial grant amount '{grant_tokens}'"))?;
        Ok(Self {
            chain,
            notifier,
            amount,
        })
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    /// Transfer the grant to `address` and wait for confirmation.
    ///
    /// Returns `Ok(None)` when no chain is configured.
    pub async fn fund(&self, address: Address) -> Result<Option<TxOutcome>> {
        info!("Sending {} tokens to {}", format_ether(self.amount), address);
        match self.chain.transfer(address, self.amount).await {
            Ok(outcome) => {
                info!("Initial funds sent to {} (tx {})", address, outcome.hash_hex());
                Ok(Some(outcome))
            }
            Err(ChainError::NotConfigured(reason)) => {
                warn!("Skipping initial funds for {}: {}", address, reason);
                Ok(None)
            }
            Err(e) => {
                error!("Error sending initial funds to {}: {}", address, e);
                self.notifier
                    .notify(&format!("Error sending initial funds to {address}: {e}"))
                    .await;
                Err(e).context("Initial funding failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::OfflineChain;
    use crate::notify::RecordingNotifier;

    #[test]
    fn default_grant_is_one_hundred_tokens() {
        let funder = InitialFunder::new(
            Arc::new(OfflineChain::new(Address::ZERO, Address::ZERO)),
            Arc::new(RecordingNotifier::default()),
            DEFAULT_INITIAL_GRANT,
        )
        .unwrap();
        assert_eq!(funder.amount(), U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)));
    }

    #[test]
    fn rejects_bad_amount() {
        let result = InitialFunder::new(
            Arc::new(OfflineChain::new(Address::ZERO, Address::ZERO)),
            Arc::new(RecordingNotifier::default()),
            "lots",
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn skips_without_chain() {
        let notifier = Arc::new(RecordingNotifier::default());
        let funder = InitialFunder::new(
            Arc::new(OfflineChain::new(Address::ZERO, Address::ZERO)),
            notifier.clone(),
            "100",
        )
        .unwrap();
        assert_eq!(funder.fund(Address::repeat_byte(9)).await.unwrap(), None);
        assert!(notifier.messages().is_empty());
    }
}
