//! End-to-end tests for the key service and the exchange coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use serde_json::json;

use modkey::config::{KeysConfig, ProviderConfig};
use modkey::error::Error;
use modkey::keys::{CreateKeyRequest, KeyMode, KeyService, KeyStatus};
use modkey::oauth::{
    ExchangeCoordinator, ExchangeOutcome, IdentityProvider, ProviderUser, TokenExchangeForm,
    TokenResponse,
};

const ADMIN_ID: &str = "416048873";

fn make_service(allow_custom: bool) -> KeyService {
    KeyService::new(KeysConfig {
        admin_user_ids: vec![ADMIN_ID.parse().unwrap()],
        allow_custom_key: allow_custom,
    })
}

fn request(payload: serde_json::Value) -> CreateKeyRequest {
    CreateKeyRequest::from_json(&payload).expect("payload should validate")
}

// ── Key issuance ──────────────────────────────────────────────────────────

#[test]
fn quick_key_lifecycle() {
    // GIVEN: a fresh service
    let service = make_service(true);

    // WHEN: creating a quick key for a user
    let record = service
        .create_key(&request(json!({"mode": "quick", "user_id": "123", "role_id": "vip"})))
        .unwrap();

    // THEN: 10-minute metadata, ~24h window, active, validates, audited
    assert_eq!(record.mode, KeyMode::Quick);
    assert_eq!(record.duration_minutes, 10);
    assert_eq!(record.status, KeyStatus::Active);

    let result = service.validate_key(&record.key_id, None);
    assert!(result.ok);
    assert!(result.valid);
    assert_eq!(result.message, "Key is valid");
    let expires_in = result.expires_in.unwrap();
    assert!((23 * 3600..=24 * 3600).contains(&expires_in), "{expires_in}");

    assert_eq!(service.override_audit().len(), 1);
}

#[test]
fn burn_then_validate_reports_revoked() {
    let service = make_service(true);
    let record = service
        .create_key(&request(json!({"user_id": "123"})))
        .unwrap();

    service.burn_key(&record.key_id);
    let result = service.validate_key(&record.key_id, None);

    assert!(result.ok);
    assert!(!result.valid);
    assert_eq!(result.message, "Key is revoked");
}

#[test]
fn validate_is_non_consuming() {
    let service = make_service(true);
    let record = service
        .create_key(&request(json!({"user_id": "123"})))
        .unwrap();

    for _ in 0..5 {
        assert!(service.validate_key(&record.key_id, None).valid);
    }
}

#[test]
fn admin_custom_key_roundtrip() {
    // Admin mints a named promo key; a non-admin attempt at the same fails
    let service = make_service(true);

    let record = service
        .create_key(&request(json!({
            "mode": "custom",
            "user_id": ADMIN_ID,
            "admin_override": true,
            "duration_minutes": 1440,
            "custom_key_string": "promo-2024"
        })))
        .unwrap();

    assert_eq!(record.key_id, "promo-2024");
    assert_eq!(record.duration_minutes, 1440);
    assert!(record.applied_by_admin);
    assert!(service.validate_key("promo-2024", None).valid);

    let err = service
        .create_key(&request(json!({
            "mode": "custom",
            "user_id": "999",
            "custom_key_string": "promo-2025"
        })))
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
}

#[test]
fn duplicate_custom_key_leaves_original_intact() {
    let service = make_service(true);
    let payload = json!({
        "mode": "custom",
        "user_id": ADMIN_ID,
        "admin_override": true,
        "custom_key_string": "launch_key"
    });

    service.create_key(&request(payload.clone())).unwrap();
    let err = service.create_key(&request(payload)).unwrap_err();

    assert!(matches!(err, Error::DuplicateKey(_)));
    assert_eq!(service.list_keys().len(), 1);
    assert!(service.validate_key("launch_key", None).valid);
}

#[test]
fn custom_keys_can_be_disabled_by_config() {
    let service = make_service(false);

    let err = service
        .create_key(&request(json!({"mode": "custom", "user_id": "123"})))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Admin overrides bypass the feature flag
    let record = service
        .create_key(&request(json!({
            "mode": "custom",
            "user_id": ADMIN_ID,
            "admin_override": true
        })))
        .unwrap();
    assert!(record.applied_by_admin);
}

#[test]
fn non_admin_override_is_rejected_regardless_of_payload() {
    let service = make_service(true);

    for payload in [
        json!({"mode": "quick", "user_id": "999", "admin_override": true}),
        json!({"mode": "custom", "user_id": "999", "admin_override": true, "duration_minutes": 5}),
        json!({"mode": "quick", "user_id": "not-numeric", "admin_override": "yes"}),
    ] {
        let err = service.create_key(&request(payload)).unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
    }
    assert!(service.override_audit().is_empty());
}

#[test]
fn resolve_override_is_exposed_without_creating_a_key() {
    let service = make_service(true);
    let req = request(json!({"mode": "quick", "user_id": "123"}));

    let resolved = service.resolve_override("123", "vip", &req).unwrap();

    assert_eq!(resolved.resolved_duration, 10);
    assert_eq!(resolved.role_id, "vip");
    assert!(service.list_keys().is_empty());
    assert_eq!(service.override_audit().len(), 1);
}

#[test]
fn per_user_listing_filters_by_owner() {
    let service = make_service(true);
    service
        .create_key(&request(json!({"user_id": "alice1"})))
        .unwrap();
    service
        .create_key(&request(json!({"user_id": "alice1"})))
        .unwrap();
    service
        .create_key(&request(json!({"user_id": "bob2"})))
        .unwrap();

    assert_eq!(service.keys_for_user("alice1").len(), 2);
    assert_eq!(service.keys_for_user("bob2").len(), 1);
    assert_eq!(service.list_keys().len(), 3);
}

#[test]
fn admin_override_state_short_circuits_validation() {
    let service = make_service(true);

    // Global override accepts anything
    service.auth_state().set_global_override(true);
    let result = service.validate_key("no-such-key", None);
    assert!(result.valid);
    assert_eq!(result.message, "ADMIN OVERRIDE ACTIVE");

    service.auth_state().clear();
    assert!(!service.validate_key("no-such-key", None).valid);

    // Per-user override only fires for that requester
    service.auth_state().set_user_override("alice", true);
    assert!(service.validate_key("no-such-key", Some("alice")).valid);
    assert!(!service.validate_key("no-such-key", Some("bob")).valid);
}

#[test]
fn service_instances_are_isolated() {
    // Two services share nothing: no cross-contamination of stores or state
    let a = make_service(true);
    let b = make_service(true);

    let record = a.create_key(&request(json!({"user_id": "123"}))).unwrap();
    a.auth_state().set_global_override(true);

    assert!(!b.validate_key(&record.key_id, None).valid);
    assert!(b.list_keys().is_empty());
    assert!(b.override_audit().is_empty());
}

#[test]
fn concurrent_creates_with_same_custom_id_admit_exactly_one() {
    // GIVEN: many threads racing on the same explicit key id
    let service = Arc::new(make_service(true));
    let successes = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let successes = Arc::clone(&successes);
            std::thread::spawn(move || {
                let req = request(json!({
                    "mode": "custom",
                    "user_id": ADMIN_ID,
                    "admin_override": true,
                    "custom_key_string": "race_key"
                }));
                match service.create_key(&req) {
                    Ok(_) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => assert!(matches!(e, Error::DuplicateKey(_))),
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // THEN: exactly one record exists
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(service.list_keys().len(), 1);
}

// ── Exchange coordination ─────────────────────────────────────────────────

struct CountingProvider {
    calls: AtomicUsize,
    rate_limit_after: Option<u64>,
}

#[async_trait::async_trait]
impl IdentityProvider for CountingProvider {
    async fn exchange_code(&self, form: &TokenExchangeForm) -> modkey::Result<ExchangeOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(retry_after) = self.rate_limit_after {
            return Ok(ExchangeOutcome::rate_limited(retry_after));
        }
        Ok(ExchangeOutcome::Token(TokenResponse {
            access_token: format!("token-for-{}", form.code),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(604_800),
            refresh_token: None,
            scope: Some("identify email".to_string()),
        }))
    }

    async fn fetch_user(&self, _access_token: &str) -> modkey::Result<ProviderUser> {
        Ok(ProviderUser {
            id: "123".to_string(),
            username: Some("tester".to_string()),
            email: Some("tester@example.test".to_string()),
        })
    }
}

fn form(code: &str) -> TokenExchangeForm {
    TokenExchangeForm::authorization_code(&ProviderConfig::default(), code)
}

#[tokio::test]
async fn duplicate_callback_hits_the_provider_once() {
    let provider = Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
        rate_limit_after: None,
    });
    let coordinator = ExchangeCoordinator::new(Arc::clone(&provider) as Arc<_>);

    let first = coordinator.safe_exchange(&form("abc")).await.unwrap();
    let second = coordinator.safe_exchange(&form("abc")).await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    for outcome in [first, second] {
        match outcome {
            ExchangeOutcome::Token(t) => assert_eq!(t.access_token, "token-for-abc"),
            ExchangeOutcome::RateLimited { .. } => panic!("unexpected rate limit"),
        }
    }
}

#[tokio::test]
async fn rate_limited_exchange_is_a_value_not_an_error() {
    let provider = Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
        rate_limit_after: Some(5),
    });
    let coordinator = ExchangeCoordinator::new(provider as Arc<_>);

    let outcome = coordinator.safe_exchange(&form("abc")).await.unwrap();

    match outcome {
        ExchangeOutcome::RateLimited { retry_after, .. } => assert_eq!(retry_after, 5),
        ExchangeOutcome::Token(_) => panic!("expected rate limit"),
    }

    // The wire shape matches what the routing layer forwards to clients
    let json = serde_json::to_value(coordinator.safe_exchange(&form("abc")).await.unwrap()).unwrap();
    assert_eq!(json, json!({"error": "rate_limited", "retry_after": 5}));
}

#[tokio::test]
async fn exchange_and_key_subsystems_are_independent() {
    // A coordinator mid-exchange never blocks key operations: the two hold
    // separate locks. Exercised here by interleaving them on one runtime.
    let provider = Arc::new(CountingProvider {
        calls: AtomicUsize::new(0),
        rate_limit_after: None,
    });
    let coordinator = ExchangeCoordinator::new(provider as Arc<_>);
    let service = make_service(true);

    let exchange_form = form("abc");
    let exchange = coordinator.safe_exchange(&exchange_form);
    let record = service
        .create_key(&request(json!({"user_id": "123"})))
        .unwrap();

    exchange.await.unwrap();
    assert!(service.validate_key(&record.key_id, None).valid);
}
