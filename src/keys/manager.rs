//! Key lifecycle management — building and persisting key records.
//!
//! Creation resolves policy first, then builds the record, then inserts.
//! Expiry is always the fixed 24-hour validity window regardless of the
//! resolved duration; `duration_minutes` travels on the record as display
//! metadata only.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tracing::info;

use super::policy::OverrideResolver;
use super::request::CreateKeyRequest;
use super::store::{KeyMode, KeyRecord, KeyStatus, KeyStore, epoch_to_iso, now_epoch};
use crate::{Error, Result};

/// Fixed validity window applied to every key at creation.
pub const KEY_VALIDITY: Duration = Duration::from_secs(24 * 3600);

/// Allowed shape for admin-supplied custom key strings.
static CUSTOM_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{4,64}$").expect("pattern is valid"));

/// Orchestrates quick/custom key creation against the store and resolver.
pub struct KeyLifecycleManager {
    store: Arc<KeyStore>,
    resolver: Arc<OverrideResolver>,
}

impl KeyLifecycleManager {
    /// Wire the manager to its store and policy resolver.
    #[must_use]
    pub fn new(store: Arc<KeyStore>, resolver: Arc<OverrideResolver>) -> Self {
        Self { store, resolver }
    }

    /// Create a quick key.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the request is not quick-mode, plus any
    /// resolver failure.
    pub fn create_quick(&self, request: &CreateKeyRequest) -> Result<KeyRecord> {
        if request.mode != KeyMode::Quick {
            return Err(Error::validation(
                "quick key creation called with non-quick mode",
            ));
        }
        self.create(request)
    }

    /// Create a custom key, optionally with an explicit key string.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for mode mismatch, a malformed custom key
    /// string, or a duplicate id; [`Error::Authorization`] when a custom key
    /// string is supplied without an applied admin override.
    pub fn create_custom(&self, request: &CreateKeyRequest) -> Result<KeyRecord> {
        if request.mode != KeyMode::Custom {
            return Err(Error::validation(
                "custom key creation called with non-custom mode",
            ));
        }
        self.create(request)
    }

    fn create(&self, request: &CreateKeyRequest) -> Result<KeyRecord> {
        let requester = request.requester_id();
        let resolved = self
            .resolver
            .resolve(requester, &request.role_id, request)?;

        let now = now_epoch();
        let expires_at = now + KEY_VALIDITY.as_secs_f64();
        let record = KeyRecord {
            key_id: String::new(),
            mode: request.mode,
            user_id: request.user_id.clone(),
            role_id: resolved.role_id,
            duration_minutes: resolved.resolved_duration,
            applied_by_admin: resolved.applied_by_admin,
            created_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            expires_at,
            expiry_iso: epoch_to_iso(expires_at),
            status: KeyStatus::Active,
        };

        let explicit_id = match request.custom_key_string.as_deref() {
            Some(custom) if request.mode == KeyMode::Custom => {
                if !resolved.applied_by_admin {
                    return Err(Error::authorization(
                        "only an admin may set a custom key string",
                    ));
                }
                if !CUSTOM_KEY_PATTERN.is_match(custom) {
                    return Err(Error::validation(
                        "custom_key_string invalid format; allowed A-Z a-z 0-9 - _ length 4-64",
                    ));
                }
                Some(custom)
            }
            _ => None,
        };

        let stored = self.store.insert(record, explicit_id)?;

        info!(
            event = "key.created",
            key_id = %stored.key_id,
            mode = ?stored.mode,
            user_id = %stored.user_id,
        );

        Ok(stored)
    }
}
