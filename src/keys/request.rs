//! Typed create-key requests.
//!
//! The HTTP layer hands the core untrusted JSON; [`CreateKeyRequest::from_json`]
//! normalizes it once at the boundary (trimming, bool-like coercion, duration
//! bounds) so everything past this point works with a strongly-typed value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::KeyMode;
use crate::{Error, Result};

/// Smallest accepted `duration_minutes`.
pub const MIN_DURATION_MINUTES: u32 = 1;
/// Largest accepted `duration_minutes` (30 days).
pub const MAX_DURATION_MINUTES: u32 = 43_200;

/// A validated key-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    /// Quick or custom issuance mode.
    pub mode: KeyMode,
    /// Owner identity; empty when the caller is anonymous.
    pub user_id: String,
    /// Requested role capability.
    pub role_id: String,
    /// Whether the caller asked for an admin override.
    pub admin_override: bool,
    /// Requested duration in minutes, already bounds-checked.
    pub duration_minutes: Option<u32>,
    /// Explicit key id (custom mode, admin only).
    pub custom_key_string: Option<String>,
}

impl CreateKeyRequest {
    /// Shorthand for a quick-mode request with no overrides.
    #[must_use]
    pub fn quick(user_id: &str, role_id: &str) -> Self {
        Self {
            mode: KeyMode::Quick,
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
            admin_override: false,
            duration_minutes: None,
            custom_key_string: None,
        }
    }

    /// The identity used for override resolution; anonymous when the
    /// request carries no owner.
    #[must_use]
    pub fn requester_id(&self) -> &str {
        if self.user_id.is_empty() {
            "anonymous"
        } else {
            &self.user_id
        }
    }

    /// Normalize an untrusted JSON payload into a typed request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the payload is not an object, the
    /// mode is unknown, or `duration_minutes` is present but not an integer
    /// in `[1, 43200]`.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::validation("payload must be a JSON object"))?;

        let mode = match obj.get("mode") {
            None | Some(Value::Null) => KeyMode::Quick,
            Some(v) => parse_mode(v)?,
        };

        let user_id = obj
            .get("user_id")
            .map(coerce_trimmed_string)
            .unwrap_or_default();

        let role_id = match obj.get("role_id") {
            None | Some(Value::Null) => "default_role".to_string(),
            Some(v) => {
                let role = coerce_trimmed_string(v);
                if role.is_empty() {
                    return Err(Error::validation("role_id must not be empty"));
                }
                role
            }
        };

        let admin_override = obj.get("admin_override").is_some_and(coerce_bool);

        let duration_minutes = match obj.get("duration_minutes") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(coerce_duration(v)?),
        };

        let custom_key_string = match obj.get("custom_key_string") {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce_trimmed_string(v)),
        };

        Ok(Self {
            mode,
            user_id,
            role_id,
            admin_override,
            duration_minutes,
            custom_key_string,
        })
    }
}

fn parse_mode(value: &Value) -> Result<KeyMode> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::validation("mode must be a string"))?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "quick" => Ok(KeyMode::Quick),
        "custom" => Ok(KeyMode::Custom),
        other => Err(Error::validation(format!(
            "mode must be 'quick' or 'custom', got '{other}'"
        ))),
    }
}

/// Stringify and trim scalar payload values; numbers become their decimal
/// form so Discord snowflakes survive being sent as integers.
fn coerce_trimmed_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Accept booleans, truthy strings ("1", "true", "yes", "y") and nonzero
/// numbers, mirroring what browsers and curl actually send.
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Value::Number(n) => n.as_i64().is_some_and(|i| i != 0),
        _ => false,
    }
}

fn coerce_duration(value: &Value) -> Result<u32> {
    let minutes = match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::validation("duration_minutes must be an integer"))?,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::validation("duration_minutes must be an integer"))?,
        _ => return Err(Error::validation("duration_minutes must be an integer")),
    };

    if minutes < i64::from(MIN_DURATION_MINUTES) {
        return Err(Error::validation(format!(
            "duration_minutes must be >= {MIN_DURATION_MINUTES}"
        )));
    }
    if minutes > i64::from(MAX_DURATION_MINUTES) {
        return Err(Error::validation(format!(
            "duration_minutes must be <= {MAX_DURATION_MINUTES}"
        )));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(minutes as u32)
}
