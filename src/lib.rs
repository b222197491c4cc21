//! modkey — access-key service core for the gaming-mods portal.
//!
//! In-memory, single-process authorization engine behind the portal's HTTP
//! layer:
//!
//! - **Key issuance & validation**: quick and custom access keys with a fixed
//!   24-hour validity window, admin-override policy resolution, an append-only
//!   audit trail, and lazy expiry enforcement.
//! - **OAuth exchange coordination**: deduplication and rate-limit-aware
//!   handling of authorization-code exchanges against the identity provider.
//!
//! HTTP routing, templating, sessions and the provider's REST API are
//! external collaborators; this crate exposes typed operations and a typed
//! error taxonomy ([`Error::http_status`]) for the routing layer to translate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod keys;
pub mod oauth;

pub use config::Config;
pub use error::{Error, Result};
pub use keys::KeyService;
pub use oauth::ExchangeCoordinator;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
