//! HTTP contract of the web server: health, metrics and the payment webhook
//!
//! Run with: cargo test --test web_server_test

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use common::{failing_ledger, memory_ledger};
use icolor::core::retry::RetryConfig;
use icolor::core::subscription::sign;
use icolor::core::web_server::{create_router, WebState, PAYMENTS_WEBHOOK_PATH, SIGNATURE_HEADER};

const SECRET: &str = "psp-secret";

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .max_retries(1)
        .initial_delay(std::time::Duration::from_millis(1))
        .no_jitter()
}

fn payment(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(PAYMENTS_WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn signed_payment(body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(PAYMENTS_WEBHOOK_PATH)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

mod health_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_health_reports_reachable_ledger() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger, 30, None));

        for uri in ["/", "/health"] {
            let (status, body) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "ok");
            assert_eq!(body["ledger"], "memory");
            assert_eq!(body["ledger_reachable"], true);
        }
    }

    #[tokio::test]
    async fn test_health_stays_200_when_ledger_is_down() {
        let (ledger, _) = failing_ledger();
        let app = create_router(WebState::new(ledger, 30, None));

        let (status, body) = send(&app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["ledger_reachable"], false);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_text() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger, 30, None));

        let response = app.oneshot(get("/metrics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

mod payment_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_paid_notification_grants_access() {
        let (ledger, clock) = memory_ledger();
        let app = create_router(WebState::new(ledger.clone(), 30, None));

        let (status, body) = send(&app, payment(r#"{"status":"paid","user_id":123456789}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["granted"], true);
        assert_eq!(body["user_id"], 123456789);
        assert!(ledger.is_active(123456789).await.unwrap());

        clock.advance(Duration::days(31));
        assert!(!ledger.is_active(123456789).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_status_is_acknowledged_and_ignored() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger.clone(), 30, None));

        let (status, body) = send(&app, payment(r#"{"status":"pending","user_id":7}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ignored"], "pending");
        assert!(!ledger.is_active(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_status_is_echoed_as_sent() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger.clone(), 30, None));

        let (status, body) = send(&app, payment(r#"{"status":"Chargeback","user_id":7}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ignored"], "Chargeback");
        assert!(!ledger.is_active(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_400() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger, 30, None));

        for body in ["{not json", r#"{"status":"paid"}"#, r#"{"status":"paid","user_id":"abc"}"#] {
            let (status, json) = send(&app, payment(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(json["ok"], false);
        }
    }

    #[tokio::test]
    async fn test_redelivered_event_is_not_granted_twice() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger.clone(), 30, None));
        let body = r#"{"status":"paid","user_id":5,"event_id":"evt-77"}"#;

        let (_, first) = send(&app, payment(body)).await;
        let (status, second) = send(&app, payment(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["granted"], false);
        assert_eq!(second["duplicate"], true);
        assert_eq!(first["expires_at"], second["expires_at"]);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_is_503_after_retries() {
        let (ledger, store) = failing_ledger();
        let app = create_router(WebState::new(ledger, 30, None).with_retry(fast_retry()));

        let (status, body) = send(&app, payment(r#"{"status":"paid","user_id":1}"#)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);
        assert!(store.calls() > 1);
    }
}

mod signature_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BODY: &str = r#"{"status":"paid","user_id":42}"#;

    #[tokio::test]
    async fn test_missing_signature_is_401() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger.clone(), 30, Some(SECRET.to_string())));

        let (status, _) = send(&app, payment(BODY)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!ledger.is_active(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_signature_is_401() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger, 30, Some(SECRET.to_string())));
        let signature = sign("not-the-secret", BODY.as_bytes()).unwrap();

        let (status, _) = send(&app, signed_payment(BODY, &signature)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_signature_is_accepted() {
        let (ledger, _) = memory_ledger();
        let app = create_router(WebState::new(ledger.clone(), 30, Some(SECRET.to_string())));
        let signature = format!("sha256={}", sign(SECRET, BODY.as_bytes()).unwrap());

        let (status, body) = send(&app, signed_payment(BODY, &signature)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["granted"], true);
        assert!(ledger.is_active(42).await.unwrap());
    }
}
