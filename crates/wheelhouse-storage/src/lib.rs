//! Durability-tiered session persistence for the Wheelhouse client.
//!
//! This crate provides:
//! - A [`KeyValueStore`] trait over simple string key-value backends
//! - A durable, file-backed tier that survives process restarts
//! - An ephemeral, in-memory tier cleared at process end
//! - A [`CredentialStore`] that owns both tiers and enforces the
//!   one-active-tier discipline for the session snapshot

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;
mod types;

pub use credentials::CredentialStore;
pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
pub use types::{Credential, Durability, PermissionGrant, SessionUser};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error on the write path
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
