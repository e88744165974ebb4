//! Credential negotiation against a mock authorization server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use apiscout::{
    standard_ladder, AttemptError, Classification, CredentialNegotiator, HttpTransport,
    NegotiatorConfig, ParameterVariant, ScoutError,
};

// ─────────────────────── helpers ───────────────────────

/// Matches form bodies that carry no `scope` field at all.
struct NoScope;

impl Match for NoScope {
    fn matches(&self, request: &Request) -> bool {
        !String::from_utf8_lossy(&request.body).contains("scope=")
    }
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "eyJhbGciOiJSUzI1NiJ9.".to_string() + &"a".repeat(80),
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

fn negotiator(server: &MockServer) -> CredentialNegotiator {
    let config = NegotiatorConfig::new(
        format!("{}/api/v1/auth/connect/token", server.uri()),
        "client-123",
        "s3cret",
    )
    .with_timeout(Duration::from_secs(5));
    CredentialNegotiator::new(config, Arc::new(HttpTransport::new().unwrap()))
}

// ─────────────────────── scenarios ───────────────────────

#[tokio::test]
async fn scoped_variant_rejected_then_no_scope_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/connect/token"))
        .and(body_string_contains("scope=data%3Aread+data%3Awrite"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_scope"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/connect/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-123"))
        .and(NoScope)
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let ladder = vec![
        ParameterVariant::client_credentials("data scopes").with_scope("data:read data:write"),
        ParameterVariant::client_credentials("no-scope"),
    ];

    let ok = negotiator(&server).negotiate(&ladder).await.unwrap();
    assert_eq!(ok.variant, "no-scope");
    assert_eq!(ok.credential.token_type(), "Bearer");
    assert_eq!(ok.credential.expires_in(), Duration::from_secs(3600));

    assert_eq!(ok.trail.len(), 1);
    let rejected = &ok.trail[0];
    assert_eq!(rejected.variant, "data scopes");
    assert_eq!(rejected.status, Some(400));
    assert!(matches!(
        &rejected.error,
        AttemptError::AuthRejected { status: 400, snippet } if snippet.contains("invalid_scope")
    ));
}

#[tokio::test]
async fn later_variants_are_not_tried_after_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("scope=first"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("scope=second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("scope=third"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(0)
        .mount(&server)
        .await;

    let ok = negotiator(&server)
        .negotiate(&standard_ladder(&["first", "second", "third"]))
        .await
        .unwrap();

    assert_eq!(ok.variant, "scope: second");
    assert_eq!(ok.trail.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn all_variants_unauthorized_yields_full_trail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let ladder = standard_ladder(&["data:read data:write", "read write", "api", "full_access"]);
    let err = negotiator(&server).negotiate(&ladder).await.unwrap_err();

    let ScoutError::Negotiation(failure) = err else {
        panic!("expected negotiation failure");
    };
    assert_eq!(failure.attempts.len(), ladder.len());
    for (attempt, variant) in failure.attempts.iter().zip(&ladder) {
        assert_eq!(attempt.variant, variant.label());
        assert_eq!(attempt.classification, Classification::AuthRequired);
    }
}

#[tokio::test]
async fn ok_without_token_fields_is_a_shape_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("scope=api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("scope=other"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let ladder = vec![
        ParameterVariant::client_credentials("api").with_scope("api"),
        ParameterVariant::client_credentials("other").with_scope("other"),
    ];
    let err = negotiator(&server).negotiate(&ladder).await.unwrap_err();
    let ScoutError::Negotiation(failure) = err else {
        panic!("expected negotiation failure");
    };

    assert!(failure.attempts[0].error.is_contract_mismatch());
    assert!(matches!(
        &failure.attempts[0].error,
        AttemptError::ShapeMismatch { missing, .. } if missing.len() == 3
    ));
    assert!(!failure.attempts[1].error.is_contract_mismatch());
    assert_eq!(failure.attempts[1].classification, Classification::Forbidden);
}

#[tokio::test]
async fn token_timeout_moves_to_next_variant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("scope=slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(NoScope)
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    let config = NegotiatorConfig::new(format!("{}/token", server.uri()), "c", "s")
        .with_timeout(Duration::from_millis(200));
    let n = CredentialNegotiator::new(config, Arc::new(HttpTransport::new().unwrap()));

    let ladder = vec![
        ParameterVariant::client_credentials("slow").with_scope("slow"),
        ParameterVariant::client_credentials("no-scope"),
    ];
    let ok = n.negotiate(&ladder).await.unwrap();
    assert_eq!(ok.variant, "no-scope");
    assert_eq!(ok.trail[0].classification, Classification::TransportError);
    assert!(ok.trail[0].status.is_none());
}

#[tokio::test]
async fn preflight_reports_parent_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/connect"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;

    let pre = negotiator(&server).preflight().await;
    assert!(pre.url.ends_with("/api/v1/auth/connect"));
    assert_eq!(pre.status, Some(405));
    assert_eq!(pre.classification, Classification::Other);
    assert!(pre.is_accessible());
}
