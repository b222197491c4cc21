//! Exchange coordinator — duplicate-callback suppression for token exchanges.
//!
//! Browsers retry OAuth callbacks (back button, double click, flaky mobile
//! networks), and every retry carries the same authorization code. Exchanging
//! a code twice invalidates the session at the provider, so the coordinator:
//!
//! 1. Replays a cached outcome for codes exchanged within the last 120s.
//! 2. Hard-rejects a code that is currently in flight (no waiting or queuing).
//! 3. Performs the provider call outside any lock and always clears the
//!    in-flight marker, success or failure.
//!
//! Cache entries are reclaimed lazily on lookup; there is no background
//! eviction task.

use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::debug;

use super::provider::{ExchangeOutcome, IdentityProvider, TokenExchangeForm};
use crate::{Error, Result};

/// How long a completed exchange outcome absorbs duplicate callbacks.
pub const CODE_CACHE_TTL: Duration = Duration::from_secs(120);

/// Deduplicating front for [`IdentityProvider::exchange_code`].
pub struct ExchangeCoordinator {
    provider: Arc<dyn IdentityProvider>,
    in_flight: DashSet<String>,
    cache: DashMap<String, (ExchangeOutcome, Instant)>,
}

/// Clears the in-flight marker on every exit path, including panics and
/// early returns from provider errors.
struct InFlightGuard<'a> {
    codes: &'a DashSet<String>,
    code: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.codes.remove(self.code);
    }
}

impl ExchangeCoordinator {
    /// Wrap a provider client.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            in_flight: DashSet::new(),
            cache: DashMap::new(),
        }
    }

    /// Exchange a code, suppressing duplicates.
    ///
    /// Both successful tokens and rate-limited outcomes are cached; provider
    /// errors are not, so a failed code can be retried immediately.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a missing code, a concurrent exchange of
    /// the same code, or any provider failure.
    pub async fn safe_exchange(&self, form: &TokenExchangeForm) -> Result<ExchangeOutcome> {
        let code = form.code.as_str();
        if code.is_empty() {
            return Err(Error::validation("Missing OAuth code"));
        }

        if let Some(cached) = self.cached(code) {
            debug!(
                code_prefix = code.get(..6).unwrap_or(code),
                "Replaying cached exchange outcome"
            );
            return Ok(cached);
        }

        // Atomic check-and-insert; losing the race is a hard reject.
        if !self.in_flight.insert(code.to_string()) {
            return Err(Error::validation("OAuth code already being exchanged"));
        }
        let _guard = InFlightGuard {
            codes: &self.in_flight,
            code,
        };

        let outcome = self.provider.exchange_code(form).await?;
        self.cache
            .insert(code.to_string(), (outcome.clone(), Instant::now()));

        Ok(outcome)
    }

    /// Cached outcome for `code`, evicting it when past the TTL.
    fn cached(&self, code: &str) -> Option<ExchangeOutcome> {
        let hit = {
            let entry = self.cache.get(code)?;
            let (outcome, stored) = entry.value();
            (stored.elapsed() <= CODE_CACHE_TTL).then(|| outcome.clone())
        };
        if hit.is_none() {
            // Entry aged out; reclaim it now rather than via a sweeper
            self.cache.remove(code);
        }
        hit
    }

    /// Number of cached exchange outcomes (expired entries included until
    /// their next lookup).
    #[must_use]
    pub fn cached_codes(&self) -> usize {
        self.cache.len()
    }

    /// Number of exchanges currently in flight.
    #[must_use]
    pub fn in_flight_codes(&self) -> usize {
        self.in_flight.len()
    }
}
