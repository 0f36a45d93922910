//! In-memory authenticator and backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use azkv::backend::{
    AuthRecord, Authenticator, BackendError, SecretBundle, SecretProperties, VaultBackend,
};
use chrono::{DateTime, Utc};

type SecretMap = BTreeMap<(String, String), (String, Option<DateTime<Utc>>)>;

/// Counts logins and hands out backends over one shared secret map.
#[derive(Default)]
pub struct FakeAuthenticator {
    pub authentications: AtomicUsize,
    pub handles: AtomicUsize,
    /// Interactive logins after this many successes fail.
    pub fail_after: Option<usize>,
    /// Vaults whose backends fail every request.
    pub broken_vaults: Mutex<BTreeSet<String>>,
    pub secrets: Arc<Mutex<SecretMap>>,
}

impl FakeAuthenticator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_after(successes: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_after: Some(successes),
            ..Self::default()
        })
    }

    pub fn put(&self, vault_url: &str, name: &str, value: &str, expires_on: Option<DateTime<Utc>>) {
        self.secrets.lock().unwrap().insert(
            (vault_url.to_string(), name.to_string()),
            (value.to_string(), expires_on),
        );
    }

    pub fn value(&self, vault_url: &str, name: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(vault_url.to_string(), name.to_string()))
            .map(|(v, _)| v.clone())
    }

    pub fn break_vault(&self, vault_url: &str) {
        self.broken_vaults
            .lock()
            .unwrap()
            .insert(vault_url.to_string());
    }

    pub fn authentication_count(&self) -> usize {
        self.authentications.load(Ordering::SeqCst)
    }
}

impl Authenticator for FakeAuthenticator {
    fn authenticate(&self) -> Result<AuthRecord, BackendError> {
        let n = self.authentications.fetch_add(1, Ordering::SeqCst);
        if matches!(self.fail_after, Some(limit) if n >= limit) {
            return Err(BackendError::Auth("login window closed".into()));
        }
        Ok(AuthRecord::from_serialized(format!("fake-record-{n}")))
    }

    fn build_handle(
        &self,
        vault_url: &str,
        _record: &AuthRecord,
    ) -> Result<Box<dyn VaultBackend>, BackendError> {
        self.handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBackend {
            vault_url: vault_url.to_string(),
            broken: self.broken_vaults.lock().unwrap().contains(vault_url),
            secrets: Arc::clone(&self.secrets),
        }))
    }
}

pub struct FakeBackend {
    vault_url: String,
    broken: bool,
    secrets: Arc<Mutex<SecretMap>>,
}

impl FakeBackend {
    fn check(&self) -> Result<(), BackendError> {
        if self.broken {
            Err(BackendError::Request(format!("{} unreachable", self.vault_url)))
        } else {
            Ok(())
        }
    }
}

impl VaultBackend for FakeBackend {
    fn get_secret(&self, name: &str) -> Result<SecretBundle, BackendError> {
        self.check()?;
        let secrets = self.secrets.lock().unwrap();
        let (value, expires_on) = secrets
            .get(&(self.vault_url.clone(), name.to_string()))
            .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
        Ok(SecretBundle {
            properties: SecretProperties {
                name: name.to_string(),
                expires_on: *expires_on,
            },
            value: value.clone(),
        })
    }

    fn list_secret_properties(&self) -> Result<Vec<SecretProperties>, BackendError> {
        self.check()?;
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .filter(|((vault, _), _)| *vault == self.vault_url)
            .map(|((_, name), (_, expires_on))| SecretProperties {
                name: name.clone(),
                expires_on: *expires_on,
            })
            .collect())
    }

    fn set_secret(&self, name: &str, value: &str) -> Result<(), BackendError> {
        self.check()?;
        self.secrets.lock().unwrap().insert(
            (self.vault_url.clone(), name.to_string()),
            (value.to_string(), None),
        );
        Ok(())
    }
}
