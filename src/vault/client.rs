//! A single vault: its settings, login handling, and secret operations.
//!
//! `VaultClient` never persists itself; `VaultRegistry` owns every client
//! and writes the whole settings file.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backend::{AuthRecord, Authenticator, BackendError, VaultBackend};
use crate::errors::{AzkvError, Result};

use super::policy::ReauthPolicy;
use super::secret::Secret;
use super::settings::VaultClientSettings;

/// Which login path `VaultClient::login` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Interactive login ran; settings hold a new record and timestamp.
    Fresh,
    /// The cached record was reused; settings are unchanged.
    Reused,
}

pub struct VaultClient {
    settings: VaultClientSettings,
    policy: ReauthPolicy,
    authenticator: Arc<dyn Authenticator>,
    handle: Option<Box<dyn VaultBackend>>,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .field("initialized", &self.handle.is_some())
            .finish()
    }
}

impl VaultClient {
    /// A client for a vault that has never logged in.
    pub fn new(vault_url: &str, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        Ok(Self::from_settings(
            VaultClientSettings::new(vault_url)?,
            authenticator,
        ))
    }

    /// Rebuild a client from persisted settings. No login happens here.
    pub fn from_settings(
        settings: VaultClientSettings,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            settings,
            policy: ReauthPolicy::default(),
            authenticator,
            handle: None,
        }
    }

    pub fn with_policy(mut self, policy: ReauthPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn vault_url(&self) -> &str {
        self.settings.vault_url()
    }

    pub fn settings(&self) -> &VaultClientSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.settings.is_active()
    }

    pub fn set_active(&mut self, active: bool) {
        self.settings.set_active(active);
    }

    /// Forget the cached login and drop any live handle.
    pub fn logout(&mut self) {
        self.settings.clear_login();
        self.handle = None;
    }

    /// `true` once a login has produced a backend handle.
    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Log in, reusing the cached record unless `force_reauth` is set or
    /// the policy says it is too old.
    pub fn login(&mut self, force_reauth: bool) -> Result<LoginOutcome> {
        self.login_at(force_reauth, Utc::now())
    }

    /// Same as `login`, evaluated against an explicit clock.
    pub fn login_at(&mut self, force_reauth: bool, now: DateTime<Utc>) -> Result<LoginOutcome> {
        if self.vault_url().is_empty() {
            return Err(AzkvError::ClientNotInitialized("vault URL not set".into()));
        }

        if force_reauth || self.policy.should_reauth(&self.settings, now, false) {
            self.fresh_login(now)?;
            return Ok(LoginOutcome::Fresh);
        }

        let record = self
            .settings
            .auth_record()
            .ok_or_else(|| AzkvError::ClientNotInitialized("auth record not set".into()))?;

        match self.authenticator.build_handle(self.vault_url(), &record) {
            Ok(handle) => {
                debug!(vault = %self.vault_url(), "reused cached login");
                self.handle = Some(handle);
                Ok(LoginOutcome::Reused)
            }
            Err(e) => {
                warn!(vault = %self.vault_url(), error = %e, "cached login rejected, logging in again");
                self.fresh_login(now)?;
                Ok(LoginOutcome::Fresh)
            }
        }
    }

    fn fresh_login(&mut self, now: DateTime<Utc>) -> Result<()> {
        info!(vault = %self.vault_url(), "interactive login");
        let record: AuthRecord = self
            .authenticator
            .authenticate()
            .map_err(|e| AzkvError::AuthenticationFailed(e.to_string()))?;

        self.settings.record_login(record.clone(), now);

        let handle = self
            .authenticator
            .build_handle(self.vault_url(), &record)
            .map_err(|e| AzkvError::AuthenticationFailed(e.to_string()))?;
        self.handle = Some(handle);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    fn backend(&self) -> Result<&dyn VaultBackend> {
        self.handle.as_deref().ok_or_else(|| {
            AzkvError::ClientNotInitialized(format!("no login for {}", self.vault_url()))
        })
    }

    /// Fetch one secret, including its value.
    pub fn get_secret(&self, name: &str) -> Result<Secret> {
        let backend = self.backend()?;
        backend
            .get_secret(name)
            .map(Secret::from)
            .map_err(|e| map_backend_error(e, name))
    }

    /// List every secret in the vault. Values are never included.
    pub fn get_secrets(&self) -> Result<Vec<Secret>> {
        let backend = self.backend()?;
        let props = backend
            .list_secret_properties()
            .map_err(|e| map_backend_error(e, self.vault_url()))?;
        Ok(props.into_iter().map(Secret::from).collect())
    }

    /// Create or update a secret. Both name and value must be non-empty.
    pub fn set_secret(&self, secret: &Secret) -> Result<()> {
        let backend = self.backend()?;
        if secret.name.is_empty() {
            return Err(AzkvError::Validation("secret name cannot be empty".into()));
        }
        let value = match secret.value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Err(AzkvError::Validation(
                    "secret value cannot be empty".into(),
                ))
            }
        };

        backend
            .set_secret(&secret.name, value)
            .map_err(|e| AzkvError::SecretRequest(e.to_string()))
    }
}

/// Translate backend failures into the crate taxonomy.
fn map_backend_error(err: BackendError, subject: &str) -> AzkvError {
    match err {
        BackendError::NotFound(_) => AzkvError::SecretNotFound(subject.to_string()),
        other => AzkvError::SecretRequest(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SecretBundle, SecretProperties};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend whose responses are fixed at construction.
    struct ScriptedBackend {
        get: std::result::Result<SecretBundle, BackendError>,
        written: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl VaultBackend for ScriptedBackend {
        fn get_secret(&self, _name: &str) -> std::result::Result<SecretBundle, BackendError> {
            self.get.clone()
        }

        fn list_secret_properties(
            &self,
        ) -> std::result::Result<Vec<SecretProperties>, BackendError> {
            match &self.get {
                Ok(bundle) => Ok(vec![bundle.properties.clone()]),
                Err(e) => Err(e.clone()),
            }
        }

        fn set_secret(&self, name: &str, value: &str) -> std::result::Result<(), BackendError> {
            self.written
                .lock()
                .unwrap()
                .push((name.to_string(), value.to_string()));
            Ok(())
        }
    }

    struct ScriptedAuth {
        get: std::result::Result<SecretBundle, BackendError>,
        reject_cached: bool,
        authentications: AtomicUsize,
        handles: AtomicUsize,
        written: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ScriptedAuth {
        fn returning(get: std::result::Result<SecretBundle, BackendError>) -> Arc<Self> {
            Arc::new(Self {
                get,
                reject_cached: false,
                authentications: AtomicUsize::new(0),
                handles: AtomicUsize::new(0),
                written: Arc::new(Mutex::new(Vec::new())),
            })
        }
    }

    impl Authenticator for ScriptedAuth {
        fn authenticate(&self) -> std::result::Result<AuthRecord, BackendError> {
            let n = self.authentications.fetch_add(1, Ordering::SeqCst);
            Ok(AuthRecord::from_serialized(format!("record-{n}")))
        }

        fn build_handle(
            &self,
            _vault_url: &str,
            record: &AuthRecord,
        ) -> std::result::Result<Box<dyn VaultBackend>, BackendError> {
            if self.reject_cached && record.as_str() == "cached" {
                return Err(BackendError::Auth("expired".into()));
            }
            self.handles.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedBackend {
                get: self.get.clone(),
                written: Arc::clone(&self.written),
            }))
        }
    }

    fn bundle(name: &str, value: &str) -> SecretBundle {
        SecretBundle {
            properties: SecretProperties {
                name: name.into(),
                expires_on: None,
            },
            value: value.into(),
        }
    }

    fn client(auth: Arc<ScriptedAuth>) -> VaultClient {
        VaultClient::new("https://kv.vault.azure.net", auth).unwrap()
    }

    #[test]
    fn get_secret_before_login_is_not_initialized() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let c = client(Arc::clone(&auth));
        assert!(matches!(
            c.get_secret("a"),
            Err(AzkvError::ClientNotInitialized(_))
        ));
        assert!(matches!(c.get_secrets(), Err(AzkvError::ClientNotInitialized(_))));
        assert!(matches!(
            c.set_secret(&Secret::new("a", "1")),
            Err(AzkvError::ClientNotInitialized(_))
        ));
        // No backend was ever built.
        assert_eq!(auth.handles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn first_login_is_fresh_and_records_login() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let mut c = client(Arc::clone(&auth));
        let now = Utc::now();

        assert_eq!(c.login_at(false, now).unwrap(), LoginOutcome::Fresh);
        assert!(c.is_initialized());
        assert_eq!(c.settings().last_login_time(), Some(now));
        assert_eq!(
            c.settings().auth_record().unwrap().as_str(),
            "record-0"
        );
    }

    #[test]
    fn recent_login_is_reused_without_settings_change() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let mut c = client(Arc::clone(&auth));
        let first = Utc::now() - Duration::hours(1);
        c.login_at(false, first).unwrap();
        let before = c.settings().clone();

        assert_eq!(c.login_at(false, Utc::now()).unwrap(), LoginOutcome::Reused);
        assert_eq!(c.settings(), &before);
        assert_eq!(auth.authentications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn force_reauth_always_authenticates() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let mut c = client(Arc::clone(&auth));
        c.login(false).unwrap();
        assert_eq!(c.login(true).unwrap(), LoginOutcome::Fresh);
        assert_eq!(auth.authentications.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejected_cached_record_falls_back_to_fresh_login() {
        let auth = Arc::new(ScriptedAuth {
            get: Ok(bundle("a", "1")),
            reject_cached: true,
            authentications: AtomicUsize::new(0),
            handles: AtomicUsize::new(0),
            written: Arc::new(Mutex::new(Vec::new())),
        });
        let mut settings = VaultClientSettings::new("https://kv.vault.azure.net").unwrap();
        settings.record_login(AuthRecord::from_serialized("cached"), Utc::now());
        let mut c = VaultClient::from_settings(settings, auth.clone());

        assert_eq!(c.login(false).unwrap(), LoginOutcome::Fresh);
        assert_eq!(c.settings().auth_record().unwrap().as_str(), "record-0");
    }

    #[test]
    fn get_secret_returns_value() {
        let auth = ScriptedAuth::returning(Ok(bundle("db-password", "hunter2")));
        let mut c = client(auth);
        c.login(false).unwrap();
        let s = c.get_secret("db-password").unwrap();
        assert_eq!(s.name, "db-password");
        assert_eq!(s.value.as_deref(), Some("hunter2"));
    }

    #[test]
    fn backend_not_found_maps_to_secret_not_found() {
        let auth = ScriptedAuth::returning(Err(BackendError::NotFound("gone".into())));
        let mut c = client(auth);
        c.login(false).unwrap();
        assert!(matches!(
            c.get_secret("missing"),
            Err(AzkvError::SecretNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn backend_failure_maps_to_request_error_with_message() {
        let auth = ScriptedAuth::returning(Err(BackendError::Request("503 throttled".into())));
        let mut c = client(auth);
        c.login(false).unwrap();
        match c.get_secret("x") {
            Err(AzkvError::SecretRequest(msg)) => assert!(msg.contains("503 throttled")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(c.get_secrets(), Err(AzkvError::SecretRequest(_))));
    }

    #[test]
    fn listing_has_no_values() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let mut c = client(auth);
        c.login(false).unwrap();
        let secrets = c.get_secrets().unwrap();
        assert_eq!(secrets.len(), 1);
        assert!(secrets[0].value.is_none());
    }

    #[test]
    fn set_secret_validates_name_and_value() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let mut c = client(Arc::clone(&auth));
        c.login(false).unwrap();

        assert!(matches!(
            c.set_secret(&Secret::new("", "v")),
            Err(AzkvError::Validation(_))
        ));
        assert!(matches!(
            c.set_secret(&Secret::new("n", "")),
            Err(AzkvError::Validation(_))
        ));
        let no_value = Secret {
            name: "n".into(),
            expires_on: None,
            value: None,
        };
        assert!(matches!(c.set_secret(&no_value), Err(AzkvError::Validation(_))));

        c.set_secret(&Secret::new("n", "v")).unwrap();
        assert_eq!(
            auth.written.lock().unwrap().as_slice(),
            &[("n".to_string(), "v".to_string())]
        );
    }

    #[test]
    fn logout_clears_login_and_handle() {
        let auth = ScriptedAuth::returning(Ok(bundle("a", "1")));
        let mut c = client(auth);
        c.login(false).unwrap();
        c.logout();
        assert!(!c.is_initialized());
        assert!(!c.settings().has_login());
    }
}
