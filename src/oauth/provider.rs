//! Identity provider client.
//!
//! [`IdentityProvider`] abstracts the OAuth token endpoint and user-profile
//! endpoint so the exchange coordinator and its tests never touch the
//! network directly. [`HttpIdentityProvider`] is the real implementation.

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::{Error, Result};

/// Fallback `Retry-After` when the provider rate-limits without a usable
/// header value.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Form body for the authorization-code grant.
#[derive(Debug, Clone, Serialize)]
pub struct TokenExchangeForm {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Always `authorization_code` for this flow.
    pub grant_type: String,
    /// The authorization code from the callback.
    pub code: String,
    /// Redirect URI the code was issued against.
    pub redirect_uri: String,
}

impl TokenExchangeForm {
    /// Build an authorization-code exchange form from provider config.
    #[must_use]
    pub fn authorization_code(config: &ProviderConfig, code: &str) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            grant_type: "authorization_code".to_string(),
            code: code.to_string(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

/// Successful token exchange response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for subsequent API calls.
    pub access_token: String,
    /// Token type, usually `Bearer`.
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<u64>,
    /// Refresh token, when granted.
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes.
    pub scope: Option<String>,
}

/// Outcome of a token exchange.
///
/// Rate limiting is a typed result rather than an error: it is a transient
/// upstream condition the caller may wait out, not a caller mistake.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExchangeOutcome {
    /// The provider granted a token.
    Token(TokenResponse),
    /// The provider answered 429.
    RateLimited {
        /// Always `"rate_limited"` on the wire.
        error: String,
        /// Seconds the provider asked us to wait.
        retry_after: u64,
    },
}

impl ExchangeOutcome {
    /// Build the typed rate-limited outcome.
    #[must_use]
    pub fn rate_limited(retry_after: u64) -> Self {
        Self::RateLimited {
            error: "rate_limited".to_string(),
            retry_after,
        }
    }

    /// Returns `true` for the rate-limited variant.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Authenticated user profile as returned by `GET /users/@me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    /// Provider-side user id (Discord snowflake as a string).
    pub id: String,
    /// Display username.
    pub username: Option<String>,
    /// Email, when the scope grants it.
    pub email: Option<String>,
}

/// Client for the external identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Exchange an authorization code for a token.
    ///
    /// Returns `Ok(RateLimited)` on HTTP 429; errors only for caller-level
    /// failures (bad code, unreachable provider).
    async fn exchange_code(&self, form: &TokenExchangeForm) -> Result<ExchangeOutcome>;

    /// Fetch the authenticated user's profile with a bearer token.
    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser>;
}

/// Real provider client over HTTPS.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl HttpIdentityProvider {
    /// Build the client with the configured request timeout.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Send the exchange POST with a bounded retry for transport failures.
    /// Any HTTP response, including errors, ends the loop immediately.
    async fn post_with_retry(&self, form: &TokenExchangeForm) -> Result<reqwest::Response> {
        let retry = &self.config.retry;
        let mut delay = retry.initial_backoff;

        for attempt in 1..=retry.max_attempts.max(1) {
            match self
                .http
                .post(self.config.token_url())
                .form(form)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) if attempt < retry.max_attempts.max(1) => {
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Token exchange transport failure, retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(retry.max_backoff);
                }
                Err(e) => {
                    warn!(error = %e, "Token exchange failed after retries");
                    return Err(Error::validation("Failed to contact OAuth token endpoint"));
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}

#[async_trait::async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange_code(&self, form: &TokenExchangeForm) -> Result<ExchangeOutcome> {
        let response = self.post_with_retry(form).await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(retry_after, "Rate limited by provider");
            return Ok(ExchangeOutcome::rate_limited(retry_after));
        }

        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Token exchange rejected");
            return Err(Error::validation("OAuth token exchange failed"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|_| Error::validation("Malformed token response from provider"))?;

        Ok(ExchangeOutcome::Token(token))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser> {
        let response = self
            .http
            .get(self.config.user_info_url())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|_| Error::validation("Failed to contact user profile endpoint"))?;

        if !response.status().is_success() {
            warn!(
                status = response.status().as_u16(),
                "User profile fetch rejected"
            );
            return Err(Error::validation("Failed to fetch user profile"));
        }

        response
            .json::<ProviderUser>()
            .await
            .map_err(|_| Error::validation("Malformed user profile response"))
    }
}
