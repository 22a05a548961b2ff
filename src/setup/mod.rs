//! Interactive first-run setup.

pub mod wizard;

pub use wizard::run_setup_wizard;
