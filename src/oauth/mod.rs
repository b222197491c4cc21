//! OAuth code-exchange layer.
//!
//! Two pieces, deliberately decoupled from the key subsystem so a slow
//! provider exchange never contends with key operations:
//!
//! - [`provider`] — the [`IdentityProvider`] client trait and its HTTPS
//!   implementation against a Discord-shaped API.
//! - [`exchange`] — the [`ExchangeCoordinator`] that deduplicates retried
//!   browser callbacks for the same authorization code.

pub mod exchange;
pub mod provider;

pub use exchange::{CODE_CACHE_TTL, ExchangeCoordinator};
pub use provider::{
    ExchangeOutcome, HttpIdentityProvider, IdentityProvider, ProviderUser, TokenExchangeForm,
    TokenResponse,
};
