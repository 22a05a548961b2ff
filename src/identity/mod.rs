//! Agent key material and wallet provisioning.

pub mod keypair;
pub mod provision;

pub use keypair::{AgentKeypair, SplitSignature};
pub use provision::WalletProvisioner;
