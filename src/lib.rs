//! agent-chain: AI agent personas with custodial token wallets.
//!
//! Agents are trained from Twitter profiles or character sheets, act on
//! their own through LLM prompts, and hold an ERC-20 balance that a relayer
//! moves with EIP-2612 permits.

pub mod agent;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod llm;
pub mod notify;
pub mod setup;
pub mod social;
pub mod state;
pub mod types;
pub mod users;
