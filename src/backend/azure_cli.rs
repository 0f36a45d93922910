//! Authenticator that delegates the interactive login to the Azure CLI.
//!
//! `az login` owns the browser flow and the token cache; azkv only keeps
//! a small auth record (tenant + account) so later runs can ask `az` for
//! a Key Vault token silently.

use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AuthRecord, Authenticator, AzureKeyVaultBackend, BackendError, VaultBackend};

/// Resource identifier for Key Vault data-plane tokens.
const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Authority recorded for logins made through the public cloud.
const DEFAULT_AUTHORITY: &str = "login.microsoftonline.com";

/// What azkv persists as the opaque auth record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CliAccountRecord {
    authority: String,
    tenant_id: String,
    username: String,
}

/// Subset of `az account show --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountShow {
    tenant_id: String,
    #[serde(default)]
    user: Option<AccountUser>,
}

#[derive(Debug, Deserialize)]
struct AccountUser {
    name: String,
}

/// Subset of `az account get-access-token --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenResponse {
    access_token: String,
}

/// Logs in through `az` and builds `AzureKeyVaultBackend` handles.
pub struct AzureCliAuthenticator {
    program: String,
    tenant_id: Option<String>,
    timeout: Duration,
}

impl AzureCliAuthenticator {
    pub fn new(tenant_id: Option<String>, timeout: Duration) -> Self {
        Self {
            program: "az".to_string(),
            tenant_id,
            timeout,
        }
    }

    /// Use a different executable than `az` (e.g. a wrapper script).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run `az <args>` and return stdout, mapping failures to `Auth`.
    fn run_az(&self, args: &[&str]) -> Result<Vec<u8>, BackendError> {
        debug!(program = %self.program, ?args, "running azure cli");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| BackendError::Auth(format!("failed to run '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Auth(format!(
                "'{} {}' failed: {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

impl Authenticator for AzureCliAuthenticator {
    fn authenticate(&self) -> Result<AuthRecord, BackendError> {
        let mut login_args = vec!["login", "--allow-no-subscriptions", "--output", "none"];
        if let Some(tenant) = self.tenant_id.as_deref() {
            login_args.extend(["--tenant", tenant]);
        }
        info!("starting interactive azure login");
        self.run_az(&login_args)?;

        let stdout = self.run_az(&["account", "show", "--output", "json"])?;
        let account: AccountShow = serde_json::from_slice(&stdout)
            .map_err(|e| BackendError::Auth(format!("unexpected 'az account show' output: {e}")))?;

        let record = CliAccountRecord {
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: self.tenant_id.clone().unwrap_or(account.tenant_id),
            username: account.user.map(|u| u.name).unwrap_or_default(),
        };
        encode_record(&record)
    }

    fn build_handle(
        &self,
        vault_url: &str,
        record: &AuthRecord,
    ) -> Result<Box<dyn VaultBackend>, BackendError> {
        let account = decode_record(record)?;
        let stdout = self.run_az(&[
            "account",
            "get-access-token",
            "--resource",
            KEY_VAULT_RESOURCE,
            "--tenant",
            &account.tenant_id,
            "--output",
            "json",
        ])?;
        let token: AccessTokenResponse = serde_json::from_slice(&stdout).map_err(|e| {
            BackendError::Auth(format!("unexpected 'az account get-access-token' output: {e}"))
        })?;

        Ok(Box::new(AzureKeyVaultBackend::new(
            vault_url,
            token.access_token,
            self.timeout,
        )))
    }
}

fn encode_record(record: &CliAccountRecord) -> Result<AuthRecord, BackendError> {
    serde_json::to_string(record)
        .map(AuthRecord::from_serialized)
        .map_err(|e| BackendError::Auth(format!("could not serialize auth record: {e}")))
}

fn decode_record(record: &AuthRecord) -> Result<CliAccountRecord, BackendError> {
    serde_json::from_str(record.as_str())
        .map_err(|e| BackendError::Auth(format!("cached auth record is invalid: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips_through_opaque_string() {
        let record = CliAccountRecord {
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: "00000000-0000-0000-0000-000000000001".to_string(),
            username: "dev@example.com".to_string(),
        };
        let opaque = encode_record(&record).unwrap();
        assert!(opaque.as_str().contains("tenant_id"));
        assert_eq!(decode_record(&opaque).unwrap(), record);
    }

    #[test]
    fn garbage_record_is_an_auth_error() {
        let err = decode_record(&AuthRecord::from_serialized("not json")).unwrap_err();
        assert!(matches!(err, BackendError::Auth(_)));
    }

    #[test]
    fn parses_account_show_output() {
        let stdout = br#"{
            "environmentName": "AzureCloud",
            "id": "sub",
            "tenantId": "tenant-1",
            "user": {"name": "dev@example.com", "type": "user"}
        }"#;
        let account: AccountShow = serde_json::from_slice(stdout).unwrap();
        assert_eq!(account.tenant_id, "tenant-1");
        assert_eq!(account.user.unwrap().name, "dev@example.com");
    }

    #[test]
    fn missing_program_is_an_auth_error() {
        let auth = AzureCliAuthenticator::new(None, Duration::from_secs(5))
            .with_program("azkv-test-no-such-binary");
        let err = auth
            .build_handle(
                "https://kv.vault.azure.net",
                &AuthRecord::from_serialized(
                    r#"{"authority":"a","tenant_id":"t","username":"u"}"#,
                ),
            )
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Auth(m) if m.contains("failed to run")));
    }
}
