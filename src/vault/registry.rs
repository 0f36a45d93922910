//! Multi-vault registry backed by a single settings file.
//!
//! `VaultRegistry` owns every `VaultClient`, is the only writer of the
//! settings file, and fans operations out across active vaults.
//!
//! Persistence is whole-store: every mutation rewrites the entire file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::backend::Authenticator;
use crate::errors::{AzkvError, Result};

use super::client::{LoginOutcome, VaultClient};
use super::policy::ReauthPolicy;
use super::secret::Secret;
use super::settings::{normalize_vault_url, VaultClientSettings};
use super::store;

/// Maximum number of vaults queried at the same time.
const MAX_PARALLEL_REQUESTS: usize = 8;

/// The closed set of operations that can be fanned out across vaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultOperation {
    GetSecret { name: String },
    GetSecrets,
    SetSecret(Secret),
}

/// Result of one `VaultOperation` on one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutput {
    Secret(Secret),
    Secrets(Vec<Secret>),
    Written,
}

impl VaultOperation {
    fn apply(&self, client: &VaultClient) -> Result<OperationOutput> {
        match self {
            VaultOperation::GetSecret { name } => {
                client.get_secret(name).map(OperationOutput::Secret)
            }
            VaultOperation::GetSecrets => client.get_secrets().map(OperationOutput::Secrets),
            VaultOperation::SetSecret(secret) => {
                client.set_secret(secret).map(|()| OperationOutput::Written)
            }
        }
    }
}

/// Top-level settings document with entries kept in file order, so that a
/// key appearing twice is seen instead of silently overwritten.
struct RawEntries(Vec<(String, serde_json::Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of vault URL to vault settings")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<RawEntries, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, serde_json::Value>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

pub struct VaultRegistry {
    path: PathBuf,
    clients: BTreeMap<String, VaultClient>,
    authenticator: Arc<dyn Authenticator>,
    policy: ReauthPolicy,
}

impl VaultRegistry {
    /// An empty registry persisted at `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            path: path.into(),
            clients: BTreeMap::new(),
            authenticator,
            policy: ReauthPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReauthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Construct and immediately `load`.
    pub fn open(
        path: impl Into<PathBuf>,
        authenticator: Arc<dyn Authenticator>,
        policy: ReauthPolicy,
    ) -> Result<Self> {
        let mut registry = Self::new(path, authenticator).with_policy(policy);
        registry.load()?;
        Ok(registry)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> ReauthPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, vault_url: &str) -> bool {
        self.clients.contains_key(vault_url)
    }

    pub fn get(&self, vault_url: &str) -> Option<&VaultClient> {
        self.clients.get(vault_url)
    }

    /// All clients, ordered by vault URL.
    pub fn clients(&self) -> impl Iterator<Item = &VaultClient> {
        self.clients.values()
    }

    pub fn vault_urls(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// A new client sharing this registry's authenticator and policy.
    /// It is not registered until passed to `add_client`.
    pub fn new_client(&self, vault_url: &str) -> Result<VaultClient> {
        Ok(VaultClient::new(vault_url, Arc::clone(&self.authenticator))?.with_policy(self.policy))
    }

    fn client_mut(&mut self, vault_url: &str) -> Result<&mut VaultClient> {
        self.clients
            .get_mut(vault_url)
            .ok_or_else(|| AzkvError::VaultNotRegistered(vault_url.to_string()))
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Replace the in-memory clients with the contents of the settings file.
    ///
    /// A missing or empty file yields an empty registry. If any entry is
    /// malformed, the registry is reset (and persisted empty) and
    /// `CorruptSettings` is returned.
    pub fn load(&mut self) -> Result<()> {
        self.clients.clear();

        let contents = match store::read_store(&self.path)? {
            Some(c) if !c.iter().all(u8::is_ascii_whitespace) => c,
            _ => {
                debug!(path = %self.path.display(), "no saved vaults");
                return Ok(());
            }
        };

        match self.parse_clients(&contents) {
            Ok(clients) => {
                debug!(count = clients.len(), "loaded vaults");
                self.clients = clients;
                Ok(())
            }
            Err(reason) => {
                warn!(path = %self.path.display(), %reason, "settings file is corrupt, resetting");
                self.reset()?;
                Err(AzkvError::CorruptSettings(reason))
            }
        }
    }

    /// Parse and validate every entry. Keys and `vault_url`s written by
    /// older versions are normalized; two entries for the same vault are
    /// an error.
    fn parse_clients(
        &self,
        contents: &[u8],
    ) -> std::result::Result<BTreeMap<String, VaultClient>, String> {
        let raw: Option<RawEntries> =
            serde_json::from_slice(contents).map_err(|e| format!("invalid JSON: {e}"))?;

        let mut clients = BTreeMap::new();
        for (key, value) in raw.map(|r| r.0).unwrap_or_default() {
            let mut settings: VaultClientSettings = serde_json::from_value(value)
                .map_err(|e| format!("entry '{key}': {e}"))?;
            settings
                .validate()
                .map_err(|e| format!("entry '{key}': {e}"))?;

            let normalized_key =
                normalize_vault_url(&key).map_err(|e| format!("entry '{key}': {e}"))?;
            settings
                .normalize_url()
                .map_err(|e| format!("entry '{key}': {e}"))?;
            if settings.vault_url() != normalized_key {
                return Err(format!(
                    "entry '{key}' has mismatched vault_url '{}'",
                    settings.vault_url()
                ));
            }
            if clients.contains_key(&normalized_key) {
                return Err(format!("duplicate entry for '{normalized_key}'"));
            }

            let client = VaultClient::from_settings(settings, Arc::clone(&self.authenticator))
                .with_policy(self.policy);
            clients.insert(normalized_key, client);
        }
        Ok(clients)
    }

    /// Write every client's settings to the settings file.
    pub fn save(&self) -> Result<()> {
        let snapshot: BTreeMap<&str, &VaultClientSettings> = self
            .clients
            .iter()
            .map(|(url, client)| (url.as_str(), client.settings()))
            .collect();

        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| AzkvError::SerializationError(format!("settings: {e}")))?;
        store::write_store(&self.path, &json)
    }

    /// Remove every vault and persist the empty registry.
    pub fn reset(&mut self) -> Result<()> {
        self.clients.clear();
        self.save()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Register a client. Fails with `DuplicateVault` if its URL is taken.
    pub fn add_client(&mut self, client: VaultClient) -> Result<()> {
        let url = client.vault_url().to_string();
        if self.clients.contains_key(&url) {
            return Err(AzkvError::DuplicateVault(url));
        }
        info!(vault = %url, "vault added");
        self.clients.insert(url, client);
        self.save()
    }

    /// Remove a vault by URL. Removing an unknown vault is not an error.
    /// Returns whether a vault was removed. Always persists.
    pub fn remove_client(&mut self, vault_url: &str) -> Result<bool> {
        let key = if self.clients.contains_key(vault_url) {
            vault_url.to_string()
        } else {
            normalize_vault_url(vault_url).unwrap_or_else(|_| vault_url.to_string())
        };
        let removed = self.clients.remove(&key).is_some();
        if removed {
            info!(vault = %key, "vault removed");
        }
        self.save()?;
        Ok(removed)
    }

    pub fn set_active(&mut self, vault_url: &str, active: bool) -> Result<()> {
        self.client_mut(vault_url)?.set_active(active);
        self.save()
    }

    /// Make exactly the given vaults active. At least one must be given.
    pub fn select_active(&mut self, vault_urls: &[String]) -> Result<()> {
        if vault_urls.is_empty() {
            return Err(AzkvError::Validation(
                "at least one vault must be selected".into(),
            ));
        }
        if let Some(unknown) = vault_urls.iter().find(|u| !self.clients.contains_key(*u)) {
            return Err(AzkvError::VaultNotRegistered(unknown.clone()));
        }
        for (url, client) in &mut self.clients {
            client.set_active(vault_urls.contains(url));
        }
        self.save()
    }

    pub fn activate_all(&mut self) -> Result<()> {
        for client in self.clients.values_mut() {
            client.set_active(true);
        }
        self.save()
    }

    /// Drop a vault's cached login so its next login is interactive.
    pub fn logout(&mut self, vault_url: &str) -> Result<()> {
        self.client_mut(vault_url)?.logout();
        self.save()
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// `true` if the settings file is older than the freshness window at `now`.
    pub fn is_store_stale_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let modified = store::modified_at(&self.path)?;
        Ok(self.policy.is_store_stale(modified, now))
    }

    /// Log every vault in. See `login_all_at`.
    pub fn login_all(&mut self) -> Result<()> {
        self.login_all_at(Utc::now())
    }

    /// Log every vault in, evaluated against `now`.
    ///
    /// Staleness of the settings file is computed once up front; when
    /// stale, every vault goes through a fresh interactive login. Each
    /// fresh login is persisted immediately, so an interrupted or failed
    /// run keeps the logins that already succeeded.
    pub fn login_all_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        let store_is_stale = self.is_store_stale_at(now)?;
        if store_is_stale {
            info!(path = %self.path.display(), "settings file is stale, forcing login for all vaults");
        }

        for url in self.vault_urls() {
            let outcome = self.client_mut(&url)?.login_at(store_is_stale, now)?;
            if outcome == LoginOutcome::Fresh {
                self.save()?;
            }
        }

        self.save()
    }

    /// Log a single registered vault in and persist.
    pub fn login_vault(&mut self, vault_url: &str, force_reauth: bool) -> Result<LoginOutcome> {
        let outcome = self.client_mut(vault_url)?.login(force_reauth)?;
        self.save()?;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Fan-out
    // ------------------------------------------------------------------

    /// Run `operation` on every active vault, in parallel.
    ///
    /// Every active vault gets an entry keyed by URL; a failure on one vault
    /// is recorded in its entry and does not stop the others.
    pub fn run_across_active(
        &self,
        operation: &VaultOperation,
    ) -> BTreeMap<String, Result<OperationOutput>> {
        let active: Vec<&VaultClient> = self.clients.values().filter(|c| c.is_active()).collect();
        let mut results = BTreeMap::new();

        for batch in active.chunks(MAX_PARALLEL_REQUESTS) {
            thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|client| {
                        let handle = scope.spawn(move || operation.apply(client));
                        (client.vault_url(), handle)
                    })
                    .collect();

                for (url, handle) in handles {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(AzkvError::SecretRequest(format!(
                            "worker for {url} panicked"
                        )))
                    });
                    if let Err(ref e) = result {
                        warn!(vault = %url, error = %e, "vault operation failed");
                    }
                    results.insert(url.to_string(), result);
                }
            });
        }

        results
    }
}
