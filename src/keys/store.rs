//! Key store — in-memory persistence for issued access keys.
//!
//! [`KeyStore`] is a thread-safe map from key id to [`KeyRecord`]. All
//! operations serialize through one mutex guarding the map and never block on
//! I/O while holding it. Records are removed only by process restart; expiry
//! is enforced lazily at validation time (no background sweeper).

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use parking_lot::Mutex;
use rand::RngExt;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Length of generated key ids.
const KEY_ID_LEN: usize = 10;

/// How a key was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Auto-issued key with a short default duration and no admin input.
    Quick,
    /// Key with caller/admin-specified duration and optionally an explicit id.
    Custom,
}

/// Key lifecycle status. The only transition is Active → Revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Key is live and validates successfully until expiry.
    Active,
    /// Key was burned; there is no path back to Active.
    Revoked,
}

/// A single issued access key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Unique key identifier; what clients present for validation.
    pub key_id: String,
    /// Quick or custom issuance mode.
    #[serde(rename = "type")]
    pub mode: KeyMode,
    /// Owner identity; may be `"anonymous"` or empty.
    pub user_id: String,
    /// Capability granted by the key.
    pub role_id: String,
    /// Policy-resolved duration. Display metadata only — actual expiry is
    /// always the fixed validity window in `expires_at`.
    pub duration_minutes: u32,
    /// Whether an admin override shaped this record.
    pub applied_by_admin: bool,
    /// Issuance instant, ISO-8601 UTC.
    pub created_at: String,
    /// Absolute expiry instant, Unix epoch seconds.
    pub expires_at: f64,
    /// `expires_at` rendered as ISO-8601 UTC for client display.
    pub expiry_iso: String,
    /// Active or revoked.
    pub status: KeyStatus,
}

impl KeyRecord {
    /// Returns `true` if `now` is past this record's expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: f64) -> bool {
        now > self.expires_at
    }
}

/// Thread-safe in-memory key store.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: Mutex<HashMap<String, KeyRecord>>,
}

impl KeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, assigning its key id.
    ///
    /// With `explicit_key_id`, a collision fails closed with
    /// [`Error::DuplicateKey`] and leaves the store unchanged. Without one, a
    /// random id is generated and re-drawn under the lock until unused.
    pub fn insert(&self, mut record: KeyRecord, explicit_key_id: Option<&str>) -> Result<KeyRecord> {
        let mut keys = self.keys.lock();

        let key_id = match explicit_key_id {
            Some(id) => {
                if keys.contains_key(id) {
                    return Err(Error::DuplicateKey(id.to_string()));
                }
                id.to_string()
            }
            None => loop {
                let candidate = generate_key_id();
                if !keys.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        record.key_id.clone_from(&key_id);
        keys.insert(key_id, record.clone());
        Ok(record)
    }

    /// Look up a record by id. Returns a snapshot clone.
    #[must_use]
    pub fn get(&self, key_id: &str) -> Option<KeyRecord> {
        self.keys.lock().get(key_id).cloned()
    }

    /// Mark a key as revoked. Idempotent; no-op when the key is absent or
    /// already revoked.
    pub fn burn(&self, key_id: &str) {
        if let Some(record) = self.keys.lock().get_mut(key_id) {
            if record.status == KeyStatus::Active {
                record.status = KeyStatus::Revoked;
                debug!(key_id, "Key burned");
            }
        }
    }

    /// Snapshot of all records.
    #[must_use]
    pub fn list(&self) -> Vec<KeyRecord> {
        self.keys.lock().values().cloned().collect()
    }

    /// Snapshot of all records owned by `user_id`.
    #[must_use]
    pub fn list_for_user(&self, user_id: &str) -> Vec<KeyRecord> {
        self.keys
            .lock()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Returns `true` when the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

/// Generate a random alphanumeric key id.
#[must_use]
pub fn generate_key_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(KEY_ID_LEN)
        .map(char::from)
        .collect()
}

/// Current time as Unix epoch seconds.
#[must_use]
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// Render epoch seconds as an ISO-8601 UTC timestamp.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn epoch_to_iso(epoch: f64) -> String {
    let secs = epoch.trunc() as i64;
    let nanos = (epoch.fract() * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        .unwrap_or_default()
}
