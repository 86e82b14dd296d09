//! Public HTTP surface: health, metrics and the payment webhook.
//!
//! In webhook mode the Telegram update route is merged into this router so
//! everything is served from one port.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::core::config::Settings;
use crate::core::metrics;
use crate::core::retry::RetryConfig;
use crate::core::subscription::{apply_notification, verify_signature, PaymentNotification, PaymentOutcome};
use crate::storage::{LedgerError, SubscriptionLedger};

/// Header carrying the hex HMAC-SHA256 of the raw payment body
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Path of the PSP callback
pub const PAYMENTS_WEBHOOK_PATH: &str = "/payments/webhook";

/// Shared state for the web server.
#[derive(Clone)]
pub struct WebState {
    pub ledger: SubscriptionLedger,
    pub sub_days: i64,
    pub payment_secret: Option<Arc<str>>,
    pub retry: RetryConfig,
    started_at: Instant,
}

impl WebState {
    pub fn new(ledger: SubscriptionLedger, sub_days: i64, payment_secret: Option<String>) -> Self {
        Self {
            ledger,
            sub_days,
            payment_secret: payment_secret.map(Arc::from),
            retry: RetryConfig::ledger(),
            started_at: Instant::now(),
        }
    }

    pub fn from_settings(ledger: SubscriptionLedger, settings: &Settings) -> Self {
        Self::new(ledger, settings.sub_days, settings.payment_secret.clone())
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Builds the router without binding a socket.
pub fn create_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(PAYMENTS_WEBHOOK_PATH, post(payment_webhook_handler))
        .with_state(state)
}

/// Binds 0.0.0.0:`port`. Done before anything else starts so a taken
/// port fails startup instead of a background task.
pub async fn bind_web_server(port: u16) -> std::io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(&addr).await
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve_web_server<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::info!("Starting web server on http://{}", listener.local_addr()?);
    log::info!("  /health            - Health check");
    log::info!("  /metrics           - Prometheus metrics");
    log::info!("  {} - Payment provider callback", PAYMENTS_WEBHOOK_PATH);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}

/// GET /health: always 200, reports whether the ledger store answers.
async fn health_handler(State(state): State<WebState>) -> impl IntoResponse {
    let reachable = state.ledger.ping().await.is_ok();
    if !reachable {
        metrics::record_ledger_error("ping");
    }

    let status = if reachable { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "ledger": state.ledger.backend(),
        "ledger_reachable": reachable,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics: Prometheus text format.
async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}

/// POST /payments/webhook
async fn payment_webhook_handler(State(state): State<WebState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = state.payment_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            log::warn!("Rejected payment webhook with missing or invalid signature");
            metrics::record_payment("unknown", "unauthorized");
            return error_response(StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }

    let notification = match PaymentNotification::from_json(&body) {
        Ok(n) => n,
        Err(e) => {
            log::warn!("Rejected payment webhook: {}", e);
            metrics::record_payment("unknown", "rejected");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    log::info!(
        "Payment webhook: user_id={}, status={}, event_id={:?}",
        notification.user_id,
        notification.status,
        notification.event_id
    );

    match apply_notification(&state.ledger, &notification, state.sub_days, &state.retry).await {
        Ok(PaymentOutcome::Granted(record)) => Json(json!({
            "ok": true,
            "granted": true,
            "user_id": record.user_id,
            "expires_at": record.expires_at.to_rfc3339(),
        }))
        .into_response(),
        Ok(PaymentOutcome::Duplicate(record)) => Json(json!({
            "ok": true,
            "granted": false,
            "duplicate": true,
            "user_id": notification.user_id,
            "expires_at": record.map(|r| r.expires_at.to_rfc3339()),
        }))
        .into_response(),
        Ok(PaymentOutcome::Ignored(_)) => Json(json!({
            "ok": true,
            "ignored": notification.raw_status,
        }))
        .into_response(),
        Err(LedgerError::Unavailable(_)) => error_response(StatusCode::SERVICE_UNAVAILABLE, "ledger unavailable"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}
