//! The `Secret` type handed to the presentation layer.
//!
//! Listings only carry `name` and `expires_on`; `value` is filled in when
//! a secret is fetched individually.

use chrono::{DateTime, Duration, Utc};

use crate::backend::{SecretBundle, SecretProperties};

/// Default "expiring soon" window in days.
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 15;

/// A Key Vault secret, with or without its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub expires_on: Option<DateTime<Utc>>,
    pub value: Option<String>,
}

/// Where a secret stands relative to its expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    Expired,
    ExpiringSoon,
    Valid,
    NoExpiry,
}

impl Secret {
    /// A secret carrying a value, ready to be written.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expires_on: None,
            value: Some(value.into()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_soon_expired(&self) -> bool {
        self.is_soon_expired_at(Utc::now(), Duration::days(DEFAULT_EXPIRY_WARNING_DAYS))
    }

    /// `true` when `expires_on` lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_on, Some(exp) if exp < now)
    }

    /// `true` when not yet expired but expiring within `window` of `now`.
    pub fn is_soon_expired_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.expires_on {
            Some(exp) => {
                exp >= now && now.checked_add_signed(window).map_or(true, |limit| exp < limit)
            }
            None => false,
        }
    }

    pub fn expiry_status_at(&self, now: DateTime<Utc>, window: Duration) -> ExpiryStatus {
        if self.expires_on.is_none() {
            ExpiryStatus::NoExpiry
        } else if self.is_expired_at(now) {
            ExpiryStatus::Expired
        } else if self.is_soon_expired_at(now, window) {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Valid
        }
    }
}

impl From<SecretProperties> for Secret {
    fn from(props: SecretProperties) -> Self {
        Self {
            name: props.name,
            expires_on: props.expires_on,
            value: None,
        }
    }
}

impl From<SecretBundle> for Secret {
    fn from(bundle: SecretBundle) -> Self {
        Self {
            name: bundle.properties.name,
            expires_on: bundle.properties.expires_on,
            value: Some(bundle.value),
        }
    }
}
