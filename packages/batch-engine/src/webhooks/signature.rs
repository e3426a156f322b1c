//! Envelope signing for webhook deliveries.
//!
//! The signature is `HMAC-SHA256(secret, body)` over the exact bytes
//! posted to the endpoint. Compatibility hazard: both ends must agree
//! on the serialization — receivers verify against the raw request
//! body, never a re-serialized copy, because JSON field order is part
//! of the contract.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a received signature against `body`.
pub fn verify(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::webhook::EventEnvelope;
    use chrono::{TimeZone, Utc};

    #[test]
    fn signing_is_deterministic() {
        let envelope = EventEnvelope {
            event: "batch.completed".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            data: serde_json::json!({"job_id": "abc", "succeeded": 250}),
        };
        let body = serde_json::to_vec(&envelope).unwrap();

        let first = sign("whsec_test", &body);
        let second = sign("whsec_test", &body);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let body = br#"{"event":"batch.completed"}"#;
        assert_ne!(sign("secret-a", body), sign("secret-b", body));
    }

    #[test]
    fn verify_round_trips() {
        let body = br#"{"event":"product.price_drop"}"#;
        let signature = sign("whsec_test", body);
        assert!(verify("whsec_test", body, &signature));
        assert!(!verify("whsec_other", body, &signature));
        assert!(!verify("whsec_test", b"tampered", &signature));
        assert!(!verify("whsec_test", body, "not-hex"));
    }
}
