//! Append-only audit trail of override resolutions.
//!
//! Every successful [`OverrideResolver::resolve`](super::policy::OverrideResolver::resolve)
//! appends an entry here and additionally emits it as a JSON blob via
//! `tracing::info!` with an `audit` field, so the trail is queryable both
//! in-process (admin snapshot endpoint) and in any log aggregator.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::store::KeyMode;

/// One override-resolution decision. Immutable after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideAuditEntry {
    /// Resolution instant, ISO-8601 UTC.
    pub timestamp: String,
    /// Identity that requested the key.
    pub requester_id: String,
    /// Role the requester asked for.
    pub requested_role: String,
    /// Issuance mode of the request.
    pub mode: KeyMode,
    /// Whether the payload asked for an admin override.
    pub admin_override_requested: bool,
    /// Whether an admin override was actually applied.
    pub applied_by_admin: bool,
    /// Final duration the resolver settled on.
    pub resolved_duration: u32,
}

impl OverrideAuditEntry {
    /// Build an entry stamped with the current time.
    #[must_use]
    pub fn now(
        requester_id: &str,
        requested_role: &str,
        mode: KeyMode,
        admin_override_requested: bool,
        applied_by_admin: bool,
        resolved_duration: u32,
    ) -> Self {
        Self {
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            requester_id: requester_id.to_string(),
            requested_role: requested_role.to_string(),
            mode,
            admin_override_requested,
            applied_by_admin,
            resolved_duration,
        }
    }
}

/// Append-only list of override decisions with snapshot reads.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<OverrideAuditEntry>>,
}

impl AuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and emit it to the tracing sink.
    pub fn append(&self, entry: OverrideAuditEntry) {
        emit(&entry);
        self.entries.lock().push(entry);
    }

    /// Snapshot copy of all entries, in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OverrideAuditEntry> {
        self.entries.lock().clone()
    }

    /// Number of recorded decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Emit an audit entry via `tracing::info!` with structured fields.
fn emit(entry: &OverrideAuditEntry) {
    match serde_json::to_string(entry) {
        Ok(ref json) => tracing::info!(audit = %json, "override audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(requester: &str) -> OverrideAuditEntry {
        OverrideAuditEntry::now(requester, "vip", KeyMode::Quick, false, false, 10)
    }

    #[test]
    fn append_preserves_order() {
        // GIVEN: an empty log
        let log = AuditLog::new();

        // WHEN: appending two entries
        log.append(make_entry("alice"));
        log.append(make_entry("bob"));

        // THEN: snapshot returns them in append order
        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].requester_id, "alice");
        assert_eq!(entries[1].requester_id, "bob");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let log = AuditLog::new();
        log.append(make_entry("alice"));

        let snapshot = log.snapshot();
        log.append(make_entry("bob"));

        // The earlier snapshot is unaffected by later appends
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn entries_serialize_to_json() {
        let entry = make_entry("alice");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["requester_id"], "alice");
        assert_eq!(json["mode"], "quick");
        assert_eq!(json["resolved_duration"], 10);
    }

    #[test]
    fn new_log_is_empty() {
        let log = AuditLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }
}
