//! Backend collaborators: authentication and remote secret access.
//!
//! The vault layer only talks to these traits:
//! - `Authenticator` performs the interactive login and turns a cached
//!   `AuthRecord` into a live `VaultBackend` handle.
//! - `VaultBackend` is one authenticated connection to one vault.
//!
//! Concrete implementations for Azure live in `azure` (REST data plane)
//! and `azure_cli` (login delegated to the `az` executable).

pub mod azure;
pub mod azure_cli;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use azure::AzureKeyVaultBackend;
pub use azure_cli::AzureCliAuthenticator;

/// Failures reported by a backend. Mapped into `AzkvError` by `VaultClient`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Request(String),

    #[error("{0}")]
    Auth(String),
}

/// Opaque, serialized proof of a completed interactive login.
///
/// Stored in the settings file verbatim and handed back to the
/// authenticator that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord(String);

impl AuthRecord {
    pub fn from_serialized(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Secret metadata as returned by listings (never carries a value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretProperties {
    pub name: String,
    pub expires_on: Option<DateTime<Utc>>,
}

/// A single secret fetched by name: metadata plus value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBundle {
    pub properties: SecretProperties,
    pub value: String,
}

/// One authenticated connection to one vault.
pub trait VaultBackend: Send + Sync {
    /// Fetch a secret's current value and metadata.
    fn get_secret(&self, name: &str) -> Result<SecretBundle, BackendError>;

    /// List metadata for every secret in the vault.
    fn list_secret_properties(&self) -> Result<Vec<SecretProperties>, BackendError>;

    /// Create or update a secret.
    fn set_secret(&self, name: &str, value: &str) -> Result<(), BackendError>;
}

/// Issues auth records and builds backend handles from them.
pub trait Authenticator: Send + Sync {
    /// Run the full interactive login. May block on user interaction.
    fn authenticate(&self) -> Result<AuthRecord, BackendError>;

    /// Build a handle for `vault_url` from a cached record, without user
    /// interaction. Fails if the record is invalid or expired.
    fn build_handle(
        &self,
        vault_url: &str,
        record: &AuthRecord,
    ) -> Result<Box<dyn VaultBackend>, BackendError>;
}
