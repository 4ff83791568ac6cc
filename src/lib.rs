//! ledger-vault - personal finance ledger with an end-to-end encrypted vault
//!
//! Transaction amounts and notes can be sealed with AES-256-GCM under a random
//! data key. The data key is itself wrapped with a key derived from the user's
//! master password (PBKDF2-HMAC-SHA256), so changing the password never
//! touches record data.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `crypto`: Key derivation, envelope cipher and key types
//! - `models`: Transactions, recurring templates, ids and money
//! - `storage`: Settings and record stores (JSON files or in memory)
//! - `vault`: Key management, vault state machine, field codec and bulk transitions
//! - `services`: Transaction and recurring-transaction business logic
//! - `display`: Terminal formatting
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger_vault::storage::Storage;
//! use ledger_vault::vault::Vault;
//!
//! let storage = Storage::in_memory();
//! let mut vault = Vault::open(&storage, user_id).await?;
//! vault.activate(&password).await?;
//! ```

pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod vault;

pub use error::{LedgerError, LedgerResult};
