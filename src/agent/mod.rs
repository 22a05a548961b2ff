//! Agent personas: creation, actions, conversation and trait evolution.

pub mod actions;
pub mod character;
pub mod chat;
pub mod evolution;
pub mod persona;
pub mod training;

pub use actions::{ActionEngine, ActionOutcome, ActionSummary, ActionTemplate};
pub use character::{CharacterFormat, CharacterSheet};
pub use chat::AgentChat;
pub use evolution::TraitEvolver;
pub use training::{AgentTrainer, TrainedAgent};
