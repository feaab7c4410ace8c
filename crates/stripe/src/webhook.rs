use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// A webhook event whose signature has been verified.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// Event payload wrapper; `object` holds the processor object the event is
/// about, left as raw JSON until classification decides whether it matters.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// Reasons a delivery is rejected before any processing happens.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing timestamp in signature header")]
    MissingTimestamp,
    #[error("no v1 signature in signature header")]
    MissingSignature,
    #[error("timestamp {timestamp} outside the {tolerance_secs}s tolerance window")]
    StaleTimestamp { timestamp: i64, tolerance_secs: i64 },
    #[error("failed to initialize signature verifier")]
    InvalidSecret,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Verifies a webhook delivery and parses it into an [`Event`].
///
/// The signature scheme is HMAC-SHA256 over `"{timestamp}.{raw_body}"` with
/// the shared webhook secret, delivered as `t=<unix>,v1=<hex>[,v1=...]`.
/// The raw request bytes must be passed through unmodified; the payload is
/// parsed only after a candidate signature matches. The header timestamp
/// must fall within `tolerance_secs` of `now`, which bounds replay of
/// captured deliveries.
pub fn verify_event(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<Event, WebhookError> {
    let (timestamp, candidates) = parse_signature_header(signature_header)?;

    let age = (now.timestamp() - timestamp).abs();
    if age > tolerance_secs {
        return Err(WebhookError::StaleTimestamp {
            timestamp,
            tolerance_secs,
        });
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    let matched = candidates.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| bool::from(bytes.as_slice().ct_eq(&expected)))
            .unwrap_or(false)
    });
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    Ok(serde_json::from_slice(payload)?)
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<&str>), WebhookError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => timestamp = value.parse().ok(),
            (Some("v1"), Some(value)) => candidates.push(value),
            // Unknown scheme versions are skipped, as the processor adds
            // them alongside v1 during secret rollovers.
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(WebhookError::MissingSignature);
    }
    Ok((timestamp, candidates))
}

fn compute_signature(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}
