//! Vault module: multi-vault registry with cached logins.
//!
//! This module provides:
//! - `Secret` and expiry predicates (`secret`)
//! - Per-vault persisted settings (`settings`)
//! - The reauthentication policy (`policy`)
//! - `VaultClient`, one logged-in vault (`client`)
//! - `VaultRegistry`, all vaults plus the settings file (`registry`)
//! - Atomic settings file I/O (`store`)

pub mod client;
pub mod policy;
pub mod registry;
pub mod secret;
pub mod settings;
pub mod store;

// Re-export the most commonly used items.
pub use client::{LoginOutcome, VaultClient};
pub use policy::ReauthPolicy;
pub use registry::{OperationOutput, VaultOperation, VaultRegistry};
pub use secret::{ExpiryStatus, Secret};
pub use settings::{normalize_vault_url, vault_short_name, VaultClientSettings};
