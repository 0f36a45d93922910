//! Reauthentication policy.
//!
//! Two independent staleness signals decide whether a cached login may be
//! reused:
//! - the settings file's modification time (`store_freshness`), evaluated
//!   once per registry-wide login and applied to every vault;
//! - each vault's own `last_login_time` (`login_validity`).

use chrono::{DateTime, Duration, Utc};

use super::settings::VaultClientSettings;

/// Default lifetime of a cached login, in hours.
pub const DEFAULT_LOGIN_VALIDITY_HOURS: i64 = 6;

/// Default maximum age of the settings file, in hours.
pub const DEFAULT_STORE_FRESHNESS_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReauthPolicy {
    pub login_validity: Duration,
    pub store_freshness: Duration,
}

impl Default for ReauthPolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_LOGIN_VALIDITY_HOURS, DEFAULT_STORE_FRESHNESS_HOURS)
    }
}

impl ReauthPolicy {
    /// Windows out of `Duration`'s range saturate to `Duration::MAX`.
    pub fn from_hours(login_validity_hours: i64, store_freshness_hours: i64) -> Self {
        Self {
            login_validity: saturating_hours(login_validity_hours),
            store_freshness: saturating_hours(store_freshness_hours),
        }
    }

    /// Decide whether `settings` needs a fresh interactive login at `now`.
    pub fn should_reauth(
        &self,
        settings: &VaultClientSettings,
        now: DateTime<Utc>,
        store_is_stale: bool,
    ) -> bool {
        if store_is_stale {
            return true;
        }
        match (settings.auth_record(), settings.last_login_time()) {
            (Some(_), Some(last_login)) => now
                .checked_sub_signed(self.login_validity)
                .is_some_and(|cutoff| last_login < cutoff),
            _ => true,
        }
    }

    /// A store with no modification time (missing file) counts as stale.
    pub fn is_store_stale(&self, modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match modified {
            Some(mtime) => now
                .checked_sub_signed(self.store_freshness)
                .is_some_and(|cutoff| mtime < cutoff),
            None => true,
        }
    }
}

fn saturating_hours(hours: i64) -> Duration {
    Duration::try_hours(hours).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AuthRecord;

    fn logged_in_at(at: DateTime<Utc>) -> VaultClientSettings {
        let mut s = VaultClientSettings::new("https://kv.vault.azure.net").unwrap();
        s.record_login(AuthRecord::from_serialized("rec"), at);
        s
    }

    #[test]
    fn never_logged_in_always_reauths() {
        let policy = ReauthPolicy::default();
        let s = VaultClientSettings::new("https://kv.vault.azure.net").unwrap();
        let now = Utc::now();
        assert!(policy.should_reauth(&s, now, false));
        assert!(policy.should_reauth(&s, now, true));
    }

    #[test]
    fn five_hour_old_login_is_reused() {
        let policy = ReauthPolicy::default();
        let now = Utc::now();
        let s = logged_in_at(now - Duration::hours(5));
        assert!(!policy.should_reauth(&s, now, false));
    }

    #[test]
    fn seven_hour_old_login_reauths() {
        let policy = ReauthPolicy::default();
        let now = Utc::now();
        let s = logged_in_at(now - Duration::hours(7));
        assert!(policy.should_reauth(&s, now, false));
    }

    #[test]
    fn stale_store_overrides_fresh_login() {
        let policy = ReauthPolicy::default();
        let now = Utc::now();
        let s = logged_in_at(now - Duration::hours(1));
        assert!(policy.should_reauth(&s, now, true));
    }

    #[test]
    fn store_staleness_window() {
        let policy = ReauthPolicy::default();
        let now = Utc::now();
        assert!(!policy.is_store_stale(Some(now - Duration::hours(23)), now));
        assert!(policy.is_store_stale(Some(now - Duration::hours(25)), now));
        assert!(policy.is_store_stale(None, now));
    }

    #[test]
    fn custom_windows_are_respected() {
        let policy = ReauthPolicy::from_hours(4, 4);
        let now = Utc::now();
        let s = logged_in_at(now - Duration::hours(5));
        assert!(policy.should_reauth(&s, now, false));
        assert!(policy.is_store_stale(Some(now - Duration::hours(5)), now));
    }

    #[test]
    fn huge_windows_never_overflow() {
        let policy = ReauthPolicy::from_hours(i64::MAX, i64::MAX);
        assert_eq!(policy.login_validity, Duration::MAX);

        let now = Utc::now();
        let s = logged_in_at(now - Duration::days(365));
        assert!(!policy.should_reauth(&s, now, false));
        assert!(!policy.is_store_stale(Some(now - Duration::days(365)), now));
    }
}
