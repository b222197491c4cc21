//! Override policy engine — resolves effective duration, role and admin flag
//! for a requested key.
//!
//! # Resolution order
//!
//! 1. Admin detection: the requester id must parse as an integer present in
//!    the configured allow-list; anything else is not an admin.
//! 2. `admin_override` requested by a non-admin is an authorization failure.
//!    For admins it marks the record admin-applied and an explicit
//!    `duration_minutes` is adopted verbatim.
//! 3. Custom mode with the feature flag off and no admin applied fails.
//! 4. Remaining durations fall back to mode defaults: quick gets 10 minutes,
//!    custom gets the requested duration or 60 minutes.
//!
//! Admin-supplied durations always win over mode defaults. Successful
//! resolutions are audited; failures are only logged.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::audit::{AuditLog, OverrideAuditEntry};
use super::request::CreateKeyRequest;
use super::store::KeyMode;
use crate::config::KeysConfig;
use crate::{Error, Result};

/// Fixed duration for quick keys (minutes).
pub const QUICK_DEFAULT_MINUTES: u32 = 10;
/// Fallback duration for custom keys without an explicit request (minutes).
pub const CUSTOM_DEFAULT_MINUTES: u32 = 60;

/// The resolved override decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Final duration in minutes.
    pub resolved_duration: u32,
    /// Role to grant.
    pub role_id: String,
    /// Whether an admin override was applied.
    pub applied_by_admin: bool,
}

/// Policy engine computing override decisions against server configuration.
pub struct OverrideResolver {
    config: KeysConfig,
    audit: Arc<AuditLog>,
}

impl OverrideResolver {
    /// Build the resolver from configuration and the shared audit log.
    #[must_use]
    pub fn new(config: KeysConfig, audit: Arc<AuditLog>) -> Self {
        Self { config, audit }
    }

    /// Returns `true` if `requester_id` is a configured admin.
    ///
    /// Non-numeric ids are never admins.
    #[must_use]
    pub fn is_admin(&self, requester_id: &str) -> bool {
        requester_id
            .trim()
            .parse::<i64>()
            .map(|id| self.config.admin_user_ids.contains(&id))
            .unwrap_or(false)
    }

    /// Resolve the effective override for a validated request.
    ///
    /// # Errors
    ///
    /// [`Error::Authorization`] when a non-admin requests `admin_override`;
    /// [`Error::Validation`] when custom keys are disabled and no admin
    /// override applies.
    pub fn resolve(
        &self,
        requester_id: &str,
        requested_role: &str,
        request: &CreateKeyRequest,
    ) -> Result<Override> {
        let is_admin = self.is_admin(requester_id);

        let mut applied_by_admin = false;
        let mut resolved_duration: Option<u32> = None;

        if request.admin_override {
            if !is_admin {
                warn!(requester_id, "admin_override requested by non-admin");
                return Err(Error::authorization(
                    "admin_override requested by non-admin",
                ));
            }

            applied_by_admin = true;

            // Admins may set an arbitrary duration directly.
            if let Some(minutes) = request.duration_minutes {
                resolved_duration = Some(minutes);
            }
        }

        if request.mode == KeyMode::Custom && !self.config.allow_custom_key && !applied_by_admin {
            debug!(requester_id, "custom key rejected by feature flag");
            return Err(Error::validation(
                "custom keys are disabled by server configuration",
            ));
        }

        let resolved_duration = resolved_duration.unwrap_or(match request.mode {
            KeyMode::Quick => QUICK_DEFAULT_MINUTES,
            KeyMode::Custom => request.duration_minutes.unwrap_or(CUSTOM_DEFAULT_MINUTES),
        });

        self.audit.append(OverrideAuditEntry::now(
            requester_id,
            requested_role,
            request.mode,
            request.admin_override,
            applied_by_admin,
            resolved_duration,
        ));

        info!(
            event = "override.resolved",
            requester_id,
            role = requested_role,
            duration = resolved_duration,
            admin = applied_by_admin,
        );

        Ok(Override {
            resolved_duration,
            role_id: requested_role.to_string(),
            applied_by_admin,
        })
    }
}
