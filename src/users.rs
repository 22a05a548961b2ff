//! End users identified by their connected wallet address.

use crate::state::AgentStore;
use crate::types::EndUser;
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct EndUsers {
    store: Arc<dyn AgentStore>,
}

fn normalize(address: &str) -> Result<String> {
    let address = address.trim().to_lowercase();
    if address.len() != 42 || !address.starts_with("0x") || !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Invalid wallet address: {address}");
    }
    Ok(address)
}

impl EndUsers {
    pub fn new(store: Arc<dyn AgentStore>) -> Self {
        Self { store }
    }

    /// Record a wallet connection, creating the user on first sight.
    pub async fn get_or_create(&self, address: &str) -> Result<EndUser> {
        let address = normalize(address)?;
        let user = self.store.get_or_create_end_user(&address).await?;
        info!("End user {} connected (agent created: {})", user.address, user.agent_created);
        Ok(user)
    }

    pub async fn mark_agent_created(&self, address: &str) -> Result<()> {
        let address = normalize(address)?;
        self.store.get_or_create_end_user(&address).await?;
        self.store.set_agent_created(&address).await
    }

    /// Whether the user behind `address` has created an agent. Unknown users have not.
    pub async fn has_agent(&self, address: &str) -> Result<bool> {
        let address = normalize(address)?;
        Ok(self
            .store
            .get_end_user(&address)
            .await?
            .is_some_and(|u| u.agent_created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LocalStore;

    const ADDR: &str = "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn users() -> EndUsers {
        EndUsers::new(Arc::new(LocalStore::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn create_is_idempotent_and_case_insensitive() {
        let users = users();
        let first = users.get_or_create(ADDR).await.unwrap();
        let again = users.get_or_create(&ADDR.to_lowercase()).await.unwrap();
        assert_eq!(first.id, again.id);
        assert!(!first.agent_created);
    }

    #[tokio::test]
    async fn mark_agent_created_sets_flag() {
        let users = users();
        assert!(!users.has_agent(ADDR).await.unwrap());
        users.mark_agent_created(ADDR).await.unwrap();
        assert!(users.has_agent(ADDR).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_malformed_address() {
        assert!(users().get_or_create("0x1234").await.is_err());
        assert!(users().has_agent("not-an-address-at-all-but-forty-two-chars!").await.is_err());
    }
}
