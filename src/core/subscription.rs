//! Payment notifications → subscription grants
//!
//! A PSP posts `{"status":"paid","user_id":123456789}` (optionally with an
//! event id). Paid notifications extend the user's access by `SUB_DAYS`;
//! every other status is acknowledged and ignored.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::core::metrics;
use crate::core::retry::{retry, RetryConfig};
use crate::storage::{LedgerError, SubscriptionLedger, SubscriptionRecord};

type HmacSha256 = Hmac<Sha256>;

/// Status reported by the PSP. Unknown values map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
    Refunded,
    #[strum(to_string = "canceled", serialize = "cancelled")]
    Canceled,
    Other,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        PaymentStatus::from_str(raw.trim()).unwrap_or(PaymentStatus::Other)
    }
}

/// Why a webhook body was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("malformed JSON body: {0}")]
    Malformed(String),
    #[error("missing status")]
    MissingStatus,
    #[error("missing user_id")]
    MissingUserId,
    #[error("invalid user_id: {0}")]
    InvalidUserId(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
    Other(serde_json::Value),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Text(s) => s,
            Scalar::Other(v) => v.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawNotification {
    status: Option<String>,
    user_id: Option<Scalar>,
    #[serde(alias = "payment_id", alias = "id")]
    event_id: Option<Scalar>,
}

/// A validated payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub status: PaymentStatus,
    /// Status as the PSP sent it, trimmed
    pub raw_status: String,
    pub user_id: i64,
    pub event_id: Option<String>,
}

impl PaymentNotification {
    pub fn from_json(body: &[u8]) -> Result<Self, NotificationError> {
        let raw: RawNotification =
            serde_json::from_slice(body).map_err(|e| NotificationError::Malformed(e.to_string()))?;

        let status = raw
            .status
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(NotificationError::MissingStatus)?;

        let user_id = match raw.user_id.ok_or(NotificationError::MissingUserId)? {
            Scalar::Int(n) => n,
            Scalar::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| NotificationError::InvalidUserId(s.clone()))?,
            Scalar::Other(v) => return Err(NotificationError::InvalidUserId(v.to_string())),
        };
        if user_id <= 0 {
            return Err(NotificationError::InvalidUserId(user_id.to_string()));
        }

        let event_id = raw
            .event_id
            .map(Scalar::into_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            status: PaymentStatus::parse(&status),
            raw_status: status,
            user_id,
            event_id,
        })
    }
}

/// Checks `signature` (hex HMAC-SHA256 of `body`, optional `sha256=` prefix).
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let hex_digest = signature.trim();
    let hex_digest = hex_digest.strip_prefix("sha256=").unwrap_or(hex_digest);
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex HMAC-SHA256 of `body`; what a PSP puts in the signature header.
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// What a notification did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Granted(SubscriptionRecord),
    /// Event id already applied; record as it stands
    Duplicate(Option<SubscriptionRecord>),
    Ignored(PaymentStatus),
}

impl PaymentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentOutcome::Granted(_) => "granted",
            PaymentOutcome::Duplicate(_) => "duplicate",
            PaymentOutcome::Ignored(_) => "ignored",
        }
    }
}

/// Applies a notification: paid ⇒ grant `sub_days`, retried while the
/// ledger is unavailable.
pub async fn apply_notification(
    ledger: &SubscriptionLedger,
    notification: &PaymentNotification,
    sub_days: i64,
    retry_config: &RetryConfig,
) -> Result<PaymentOutcome, LedgerError> {
    let status_label = notification.status.as_ref();

    if notification.status != PaymentStatus::Paid {
        log::info!(
            "Ignoring payment notification: user_id={}, status={}",
            notification.user_id,
            notification.status
        );
        metrics::record_payment(status_label, "ignored");
        return Ok(PaymentOutcome::Ignored(notification.status));
    }

    let user_id = notification.user_id;
    let event_id = notification.event_id.as_deref();

    let retried = retry(retry_config, move || async move {
        match event_id {
            Some(event) => ledger.grant_for_event(user_id, sub_days, event).await,
            None => ledger.grant(user_id, sub_days).await.map(|record| crate::storage::GrantOutcome {
                record: Some(record),
                applied: true,
            }),
        }
    })
    .await;

    if retried.attempts > 1 {
        log::info!(
            "Ledger grant for user {} took {} attempts over {:?}",
            user_id,
            retried.attempts,
            retried.total_duration
        );
    }
    let exhausted = retried.is_exhausted();

    let outcome = match retried.into_result() {
        Ok(grant) => match (grant.applied, grant.record) {
            (true, Some(record)) => PaymentOutcome::Granted(record),
            (_, record) => PaymentOutcome::Duplicate(record),
        },
        Err(e) => {
            if exhausted {
                log::error!("Ledger still unavailable after retries, user {}: {}", user_id, e);
            } else {
                log::error!("Failed to grant subscription for user {}: {}", user_id, e);
            }
            metrics::record_ledger_error("grant");
            let outcome = if matches!(e, LedgerError::Unavailable(_)) {
                "unavailable"
            } else {
                "failed"
            };
            metrics::record_payment(status_label, outcome);
            return Err(e);
        }
    };

    metrics::record_payment(status_label, outcome.label());
    Ok(outcome)
}
