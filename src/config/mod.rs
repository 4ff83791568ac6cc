//! Configuration module for ledger-vault
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Local application settings

pub mod paths;
pub mod settings;

pub use paths::LedgerPaths;
pub use settings::Settings;
