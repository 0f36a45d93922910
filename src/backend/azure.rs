//! Azure Key Vault data-plane backend.
//!
//! Talks to the Key Vault REST API with a bearer token:
//!
//! ```text
//! GET {vault}/secrets/{name}?api-version=7.4   -> SecretBundle
//! GET {vault}/secrets?api-version=7.4          -> paged SecretItem list (nextLink)
//! PUT {vault}/secrets/{name}?api-version=7.4   -> {"value": "..."}
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use ureq::Agent;

use super::{BackendError, SecretBundle, SecretProperties, VaultBackend};

/// Key Vault REST API version used for every request.
const SECRETS_API_VERSION: &str = "7.4";

/// Upper bound on followed `nextLink` pages, guards against a looping server.
const MAX_LIST_PAGES: usize = 1_000;

/// An authenticated connection to one Key Vault.
pub struct AzureKeyVaultBackend {
    agent: Agent,
    vault_url: String,
    bearer: String,
}

impl AzureKeyVaultBackend {
    /// Build a backend for `vault_url` that authenticates with `bearer`.
    pub fn new(vault_url: &str, bearer: String, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: config.into(),
            vault_url: vault_url.trim_end_matches('/').to_string(),
            bearer,
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/secrets/{}?api-version={}",
            self.vault_url, name, SECRETS_API_VERSION
        )
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.bearer)
    }

    /// GET `url` and decode the JSON body, mapping HTTP failures.
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BackendError> {
        let mut response = self
            .agent
            .get(url)
            .header("Authorization", &self.auth_header())
            .call()
            .map_err(|e| BackendError::Request(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        debug!(%url, status = status.as_u16(), "key vault GET");

        if status.as_u16() == 404 {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(BackendError::NotFound(error_message(&body)));
        }
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| BackendError::Request(format!("invalid response from {url}: {e}")))
    }
}

impl VaultBackend for AzureKeyVaultBackend {
    fn get_secret(&self, name: &str) -> Result<SecretBundle, BackendError> {
        let bundle: SecretBundleResponse = self.get_json(&self.secret_url(name))?;
        Ok(bundle.into_bundle(name))
    }

    fn list_secret_properties(&self) -> Result<Vec<SecretProperties>, BackendError> {
        let mut url = format!(
            "{}/secrets?api-version={}",
            self.vault_url, SECRETS_API_VERSION
        );
        let mut collected = Vec::new();

        for _ in 0..MAX_LIST_PAGES {
            let page: SecretListResponse = self.get_json(&url)?;
            collected.extend(page.value.into_iter().filter_map(SecretItem::into_properties));

            match page.next_link {
                Some(next) if !next.is_empty() => url = next,
                _ => return Ok(collected),
            }
        }

        Err(BackendError::Request(format!(
            "secret listing exceeded {MAX_LIST_PAGES} pages"
        )))
    }

    fn set_secret(&self, name: &str, value: &str) -> Result<(), BackendError> {
        let url = self.secret_url(name);
        let mut response = self
            .agent
            .put(&url)
            .header("Authorization", &self.auth_header())
            .send_json(json!({ "value": value }))
            .map_err(|e| BackendError::Request(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        debug!(%url, status = status.as_u16(), "key vault PUT");

        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct SecretAttributes {
    /// Expiry as unix seconds.
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SecretBundleResponse {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    attributes: SecretAttributes,
}

impl SecretBundleResponse {
    fn into_bundle(self, requested_name: &str) -> SecretBundle {
        let name = self
            .id
            .as_deref()
            .and_then(secret_name_from_id)
            .unwrap_or(requested_name)
            .to_string();

        SecretBundle {
            properties: SecretProperties {
                name,
                expires_on: self.attributes.exp.and_then(timestamp_to_utc),
            },
            value: self.value.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    id: String,
    #[serde(default)]
    attributes: SecretAttributes,
}

impl SecretItem {
    fn into_properties(self) -> Option<SecretProperties> {
        let name = secret_name_from_id(&self.id)?.to_string();
        Some(SecretProperties {
            name,
            expires_on: self.attributes.exp.and_then(timestamp_to_utc),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretListResponse {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the secret name from an id like
/// `https://kv.vault.azure.net/secrets/<name>[/<version>]`.
fn secret_name_from_id(id: &str) -> Option<&str> {
    let (_, rest) = id.split_once("/secrets/")?;
    let name = rest.split('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn timestamp_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Pull the human-readable message out of a Key Vault error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.code, envelope.error.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message,
            (Some(code), None) => code,
            (None, None) => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

fn status_error(status: u16, body: &str) -> BackendError {
    if status == 401 || status == 403 {
        return BackendError::Auth(format!("{status} {}", error_message(body)));
    }
    BackendError::Request(format!("{status} {}", error_message(body)))
}
