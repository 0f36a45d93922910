use thiserror::Error;

/// All errors that can occur in azkv.
#[derive(Debug, Error)]
pub enum AzkvError {
    // --- Client errors ---
    #[error("Client not initialized: {0}")]
    ClientNotInitialized(String),

    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Secret request failed: {0}")]
    SecretRequest(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // --- Registry errors ---
    #[error("Vault '{0}' is already registered")]
    DuplicateVault(String),

    #[error("Vault '{0}' is not registered (run `azkv vaults add`)")]
    VaultNotRegistered(String),

    #[error("No vaults found, add one with `azkv vaults add`")]
    NoVaults,

    #[error("Settings file is corrupt and was reset: {0}")]
    CorruptSettings(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Editor error: {0}")]
    EditorError(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl AzkvError {
    /// Process exit status for this error, distinct per failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            AzkvError::ClientNotInitialized(_) => 2,
            AzkvError::SecretNotFound(_) => 3,
            AzkvError::SecretRequest(_) => 4,
            AzkvError::AuthenticationFailed(_) => 5,
            AzkvError::DuplicateVault(_) => 6,
            AzkvError::VaultNotRegistered(_) | AzkvError::NoVaults => 7,
            AzkvError::CorruptSettings(_) => 8,
            AzkvError::Validation(_) => 9,
            AzkvError::UserCancelled => 130,
            _ => 1,
        }
    }
}

/// Convenience type alias for azkv results.
pub type Result<T> = std::result::Result<T, AzkvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_exit_codes_are_distinct() {
        let errors = [
            AzkvError::ClientNotInitialized("x".into()),
            AzkvError::SecretNotFound("x".into()),
            AzkvError::SecretRequest("x".into()),
            AzkvError::AuthenticationFailed("x".into()),
            AzkvError::DuplicateVault("x".into()),
            AzkvError::CorruptSettings("x".into()),
            AzkvError::Validation("x".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(AzkvError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn request_error_embeds_backend_message() {
        let err = AzkvError::SecretRequest("403 Forbidden".into());
        assert!(err.to_string().contains("403 Forbidden"));
    }
}
