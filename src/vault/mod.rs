//! End-to-end encryption vault
//!
//! A per-user data key encrypts the amount and note of every financial
//! record. The data key is itself wrapped by a key derived from the master
//! password, and only the wrapped form is ever persisted.

pub mod codec;
pub mod keys;
pub mod state;
pub mod transition;

pub use codec::{DecodedFields, Decrypted, FieldAccess, FieldCodec};
pub use keys::KeyManager;
pub use state::{Vault, VaultState, VaultStatus};
pub use transition::{Direction, KindTally, TransitionEngine, TransitionReport};
