//! Custodial wallet provisioning for agent handles.

use crate::chain::{InitialFunder, PermitSigner, TokenChain};
use crate::identity::AgentKeypair;
use crate::notify::Notifier;
use crate::state::AgentStore;
use crate::types::{clean_handle, WalletRow, SIGNATURE_ERROR_SENTINEL};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Creates at most one wallet per handle.
///
/// A new wallet gets a fresh keypair, a max-allowance permit for the relayer
/// and the initial token grant. Signing and funding are best effort: the
/// wallet row is persisted either way.
#[derive(Clone)]
pub struct WalletProvisioner {
    chain: Arc<dyn TokenChain>,
    store: Arc<dyn AgentStore>,
    notifier: Arc<dyn Notifier>,
    signer: PermitSigner,
    funder: InitialFunder,
}

impl WalletProvisioner {
    pub fn new(
        chain: Arc<dyn TokenChain>,
        store: Arc<dyn AgentStore>,
        notifier: Arc<dyn Notifier>,
        funder: InitialFunder,
    ) -> Self {
        Self {
            signer: PermitSigner::new(chain.clone()),
            chain,
            store,
            notifier,
            funder,
        }
    }

    /// Return the handle's wallet, creating it first if needed.
    pub async fn ensure_wallet(&self, handle: &str) -> Result<WalletRow> {
        let handle = clean_handle(handle);
        if handle.is_empty() {
            bail!("Wallet handle is required");
        }

        if let Some(existing) = self.store.get_wallet(&handle).await? {
            info!("Wallet already exists for {}: {}", handle, existing.address);
            return Ok(existing);
        }

        let keypair = AgentKeypair::generate();
        info!("Creating wallet for {}: {}", handle, keypair.address_string());

        let permit_signature = match self
            .signer
            .sign_max_permit(&keypair, self.chain.relayer_address())
            .await
        {
            Ok(signed) => signed.signature.to_hex(),
            Err(e) => {
                warn!("Could not sign permit for {}: {}", handle, e);
                self.notifier
                    .notify(&format!("Error generating permit signature for {handle}: {e}"))
                    .await;
                SIGNATURE_ERROR_SENTINEL.to_string()
            }
        };

        let row = WalletRow {
            handle: handle.clone(),
            address: keypair.address_string(),
            private_key: keypair.private_key_hex(),
            permit_signature,
            created_at: Utc::now(),
        };

        let (stored, created) = self
            .store
            .insert_wallet_if_absent(&row)
            .await
            .with_context(|| format!("Failed to save wallet for {handle}"))?;

        if !created {
            info!("Wallet for {} was created concurrently, keeping {}", handle, stored.address);
            return Ok(stored);
        }

        // The funder reports its own failures.
        if let Err(e) = self.funder.fund(keypair.address()).await {
            error!("Wallet for {} created without initial funds: {:#}", handle, e);
        }

        Ok(stored)
    }
}
