//! Runtime admin-override flags.
//!
//! [`AuthState`] replaces what used to be process-wide mutable globals: a
//! global kill-switch that makes every validation succeed, and per-user
//! escape hatches keyed by requester id. Owned by the service instance so
//! separate instances (and tests) never contaminate each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// Global and per-user admin override flags, independently lockable from the
/// key store.
#[derive(Debug, Default)]
pub struct AuthState {
    global_override: AtomicBool,
    user_overrides: RwLock<HashMap<String, bool>>,
}

impl AuthState {
    /// Create with all overrides off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while the global override is active.
    #[must_use]
    pub fn global_override(&self) -> bool {
        self.global_override.load(Ordering::Relaxed)
    }

    /// Toggle the global override.
    pub fn set_global_override(&self, active: bool) {
        self.global_override.store(active, Ordering::Relaxed);
    }

    /// Returns `true` while an override is active for `requester_id`.
    #[must_use]
    pub fn user_override(&self, requester_id: &str) -> bool {
        self.user_overrides
            .read()
            .get(requester_id)
            .copied()
            .unwrap_or(false)
    }

    /// Set or clear a per-user override.
    pub fn set_user_override(&self, requester_id: &str, active: bool) {
        let mut overrides = self.user_overrides.write();
        if active {
            overrides.insert(requester_id.to_string(), true);
        } else {
            overrides.remove(requester_id);
        }
    }

    /// Drop every override, global and per-user.
    pub fn clear(&self) {
        self.set_global_override(false);
        self.user_overrides.write().clear();
    }
}
