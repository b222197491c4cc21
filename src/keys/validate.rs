//! Key validation — the read path clients hit on every download.
//!
//! Validation is non-consuming: an active key stays active. The only
//! validation-time mutation is the lazy burn of a record whose expiry has
//! passed. Admin overrides (global or per-requester) short-circuit the
//! lookup entirely with a synthetic one-hour window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state::AuthState;
use super::store::{KeyStatus, KeyStore, epoch_to_iso, now_epoch};

/// Synthetic validity window reported while an admin override is active.
pub const LEGACY_OVERRIDE_WINDOW_SECS: u64 = 3600;

/// Outcome of a key validation, always carrying expiry information for
/// client display when a window is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `false` only for caller errors (unknown or expired key).
    pub ok: bool,
    /// Whether the key currently grants access.
    pub valid: bool,
    /// Human-readable status message.
    pub message: String,
    /// Absolute expiry, epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    /// Expiry rendered as ISO-8601 UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_iso: Option<String>,
    /// Seconds until expiry at the time of validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl ValidationResult {
    fn rejected(message: &str) -> Self {
        Self {
            ok: false,
            valid: false,
            message: message.to_string(),
            expires_at: None,
            expiry_iso: None,
            expires_in: None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn with_window(ok: bool, valid: bool, message: &str, expires_at: f64, now: f64) -> Self {
        Self {
            ok,
            valid,
            message: message.to_string(),
            expires_at: Some(expires_at),
            expiry_iso: Some(epoch_to_iso(expires_at)),
            expires_in: Some((expires_at - now) as i64),
        }
    }
}

/// Validate `key_id`, honoring admin overrides for `requester`.
///
/// Missing keys and expired keys are caller errors (`ok = false`); a revoked
/// key is a well-formed answer (`ok = true, valid = false`). Expired records
/// are burned in place, so a later validation reports them as revoked only
/// after this call has already rejected them as expired.
#[must_use]
pub fn validate_key(
    store: &KeyStore,
    state: &AuthState,
    key_id: &str,
    requester: Option<&str>,
) -> ValidationResult {
    let key_id = key_id.trim();
    if key_id.is_empty() {
        return ValidationResult::rejected("No key provided");
    }

    let now = now_epoch();

    if state.global_override() || requester.is_some_and(|r| state.user_override(r)) {
        #[allow(clippy::cast_precision_loss)]
        let expires_at = now + LEGACY_OVERRIDE_WINDOW_SECS as f64;
        debug!(key_id, "validation short-circuited by admin override");
        return ValidationResult::with_window(
            true,
            true,
            "ADMIN OVERRIDE ACTIVE",
            expires_at,
            now,
        );
    }

    let Some(record) = store.get(key_id) else {
        return ValidationResult::rejected("Invalid or unknown key");
    };

    if record.is_expired_at(now) {
        store.burn(key_id);
        debug!(key_id, "expired key burned during validation");
        return ValidationResult::rejected("Key expired");
    }

    match record.status {
        KeyStatus::Active => {
            ValidationResult::with_window(true, true, "Key is valid", record.expires_at, now)
        }
        KeyStatus::Revoked => {
            ValidationResult::with_window(true, false, "Key is revoked", record.expires_at, now)
        }
    }
}
