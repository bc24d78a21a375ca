//! Authentication state for the API client.
//!
//! This module provides:
//! - `TokenStore`: the persisted bearer token, with expiry and tier selection
//! - `StorageTier`: durable/session backends (file, keychain, memory)
//! - `CredentialRecord`/`Persistence`: the stored record and where it lives
//!
//! A record read back at or after its expiry is treated as absent and removed.

pub mod credential;
pub mod store;
pub mod tier;

pub use credential::{CredentialRecord, Persistence};
pub use store::{TokenStore, TOKEN_KEY};
pub use tier::{FileTier, KeyringTier, MemoryTier, StorageError, StorageTier};
