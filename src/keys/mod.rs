//! Access-key subsystem — issuance, validation and override policy.
//!
//! # Architecture
//!
//! ```text
//! create request
//!   -> CreateKeyRequest::from_json  (boundary normalization)
//!   -> OverrideResolver::resolve    (policy + audit)
//!   -> KeyLifecycleManager          (build record, 24h window)
//!   -> KeyStore::insert             (uniqueness under one lock)
//!
//! validate request
//!   -> AuthState                    (override short-circuit)
//!   -> KeyStore::get                (snapshot lookup)
//!   -> lazy expiry burn / status answer
//! ```
//!
//! Everything is in-memory and per-instance; there is no persistence across
//! restarts and no background sweeper. The store, audit log and auth state
//! each hold their own lock, and no lock is ever held across provider I/O.

pub mod audit;
pub mod manager;
pub mod policy;
pub mod request;
pub mod state;
pub mod store;
pub mod validate;

use std::sync::Arc;

pub use audit::{AuditLog, OverrideAuditEntry};
pub use manager::KeyLifecycleManager;
pub use policy::{Override, OverrideResolver};
pub use request::CreateKeyRequest;
pub use state::AuthState;
pub use store::{KeyMode, KeyRecord, KeyStatus, KeyStore};
pub use validate::ValidationResult;

use crate::Result;
use crate::config::KeysConfig;

/// The key service — central coordinator for issuance and validation.
///
/// Owns the store, audit log, auth state and policy resolver; the HTTP
/// routing layer calls the methods here and translates errors via
/// [`Error::http_status`](crate::Error::http_status).
pub struct KeyService {
    store: Arc<KeyStore>,
    audit: Arc<AuditLog>,
    state: Arc<AuthState>,
    resolver: Arc<OverrideResolver>,
    manager: KeyLifecycleManager,
}

impl KeyService {
    /// Create a fully-wired service from configuration.
    #[must_use]
    pub fn new(config: KeysConfig) -> Self {
        let store = Arc::new(KeyStore::new());
        let audit = Arc::new(AuditLog::new());
        let state = Arc::new(AuthState::new());
        let resolver = Arc::new(OverrideResolver::new(config, Arc::clone(&audit)));
        let manager = KeyLifecycleManager::new(Arc::clone(&store), Arc::clone(&resolver));

        Self {
            store,
            audit,
            state,
            resolver,
            manager,
        }
    }

    /// Create a key, dispatching on the request's mode.
    pub fn create_key(&self, request: &CreateKeyRequest) -> Result<KeyRecord> {
        match request.mode {
            KeyMode::Quick => self.manager.create_quick(request),
            KeyMode::Custom => self.manager.create_custom(request),
        }
    }

    /// Validate a key, honoring any active admin override for `requester`.
    #[must_use]
    pub fn validate_key(&self, key_id: &str, requester: Option<&str>) -> ValidationResult {
        validate::validate_key(&self.store, &self.state, key_id, requester)
    }

    /// Burn a key. Idempotent.
    pub fn burn_key(&self, key_id: &str) {
        self.store.burn(key_id);
    }

    /// Resolve an override decision without creating a key.
    pub fn resolve_override(
        &self,
        requester_id: &str,
        requested_role: &str,
        request: &CreateKeyRequest,
    ) -> Result<Override> {
        self.resolver.resolve(requester_id, requested_role, request)
    }

    /// Snapshot of every stored key (admin view).
    #[must_use]
    pub fn list_keys(&self) -> Vec<KeyRecord> {
        self.store.list()
    }

    /// Snapshot of the keys owned by `user_id`.
    #[must_use]
    pub fn keys_for_user(&self, user_id: &str) -> Vec<KeyRecord> {
        self.store.list_for_user(user_id)
    }

    /// Snapshot of the override audit trail (admin view).
    #[must_use]
    pub fn override_audit(&self) -> Vec<OverrideAuditEntry> {
        self.audit.snapshot()
    }

    /// The admin override flags, for the routing layer's toggle endpoints.
    #[must_use]
    pub fn auth_state(&self) -> &AuthState {
        &self.state
    }

    /// Direct store access for composition (e.g. health snapshots).
    #[must_use]
    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }
}
