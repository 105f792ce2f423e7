use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use nanoid::nanoid;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const API_KEY_PREFIX: &str = "ftk_";

/// Webhooks older or newer than this (seconds) are rejected.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

const WEBHOOK_SECRET_PREFIX: &str = "whsec_";

/// Returns `(raw, hash, display_prefix)`. Only the hash is persisted.
pub fn generate_api_key() -> (String, String, String) {
    let raw = format!("{}{}", API_KEY_PREFIX, nanoid!(24));
    let hash = hash_api_key(&raw);
    let key_prefix = raw.chars().take(12).collect::<String>();
    (raw, hash, key_prefix)
}

pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("webhook secret is not valid base64")]
    InvalidSecret,
    #[error("webhook timestamp is malformed")]
    InvalidTimestamp,
    #[error("webhook timestamp outside tolerance")]
    Expired,
    #[error("no matching webhook signature")]
    Mismatch,
}

fn webhook_key(secret: &str) -> Result<Vec<u8>, SignatureError> {
    let encoded = secret.strip_prefix(WEBHOOK_SECRET_PREFIX).unwrap_or(secret);
    BASE64
        .decode(encoded)
        .map_err(|_| SignatureError::InvalidSecret)
}

/// Sign a webhook body the way the payment provider does (Standard Webhooks).
///
/// The signed content is `"{id}.{timestamp}.{body}"`; the result is a single
/// `v1,<base64>` entry.
pub fn sign_webhook(
    secret: &str,
    webhook_id: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, SignatureError> {
    let key = webhook_key(secret)?;
    // HMAC-SHA256 accepts any key length
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&key).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(webhook_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(format!("v1,{}", BASE64.encode(mac.finalize().into_bytes())))
}

/// Verify the three webhook headers against the raw body.
///
/// `signatures` may hold several space-separated `v1,<sig>` entries (key
/// rotation); any one match is accepted.
pub fn verify_webhook(
    secret: &str,
    webhook_id: &str,
    timestamp: &str,
    signatures: &str,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let timestamp: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let expected = sign_webhook(secret, webhook_id, timestamp, body)?;
    let matched = signatures
        .split_whitespace()
        .filter(|candidate| candidate.starts_with("v1,"))
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64("focustube-test-secret")
    const SECRET: &str = "whsec_Zm9jdXN0dWJlLXRlc3Qtc2VjcmV0";
    const NOW: i64 = 1_760_000_000;

    #[test]
    fn test_generate_api_key_shape() {
        let (raw, hash, prefix) = generate_api_key();

        assert!(raw.starts_with("ftk_"), "key should start with ftk_");
        assert_eq!(raw.len(), 4 + 24, "key should be prefix(4) + nanoid(24)");
        assert_eq!(prefix.len(), 12);
        assert!(raw.starts_with(&prefix), "raw key should start with stored prefix");
        assert_eq!(hash.len(), 64, "SHA256 hash should be 64 hex chars");
        assert_eq!(hash, hash_api_key(&raw));
    }

    #[test]
    fn test_api_key_uniqueness() {
        let (key1, _, _) = generate_api_key();
        let (key2, _, _) = generate_api_key();

        assert_ne!(key1, key2, "generated keys should be unique");
    }

    #[test]
    fn test_hash_api_key_known_value() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_webhook_valid() {
        let body = br#"{"type":"subscription.active"}"#;
        let sig = sign_webhook(SECRET, "msg_1", NOW, body).unwrap();

        assert!(sig.starts_with("v1,"));
        assert_eq!(
            verify_webhook(SECRET, "msg_1", &NOW.to_string(), &sig, body, NOW),
            Ok(())
        );
    }

    #[test]
    fn test_verify_webhook_secret_without_prefix() {
        let body = b"{}";
        let sig = sign_webhook(SECRET, "msg_1", NOW, body).unwrap();
        let bare = SECRET.trim_start_matches("whsec_");

        assert!(verify_webhook(bare, "msg_1", &NOW.to_string(), &sig, body, NOW).is_ok());
    }

    #[test]
    fn test_verify_webhook_accepts_any_rotated_signature() {
        let body = b"{}";
        let sig = sign_webhook(SECRET, "msg_1", NOW, body).unwrap();
        let header = format!("v1,bm90LXRoZS1yaWdodC1vbmU= {}", sig);

        assert!(verify_webhook(SECRET, "msg_1", &NOW.to_string(), &header, body, NOW).is_ok());
    }

    #[test]
    fn test_verify_webhook_tampered_body() {
        let sig = sign_webhook(SECRET, "msg_1", NOW, b"original").unwrap();

        assert_eq!(
            verify_webhook(SECRET, "msg_1", &NOW.to_string(), &sig, b"tampered", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_webhook_id_is_signed() {
        let sig = sign_webhook(SECRET, "msg_1", NOW, b"{}").unwrap();

        assert_eq!(
            verify_webhook(SECRET, "msg_2", &NOW.to_string(), &sig, b"{}", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_webhook_stale_timestamp() {
        let then = NOW - WEBHOOK_TOLERANCE_SECS - 1;
        let sig = sign_webhook(SECRET, "msg_1", then, b"{}").unwrap();

        assert_eq!(
            verify_webhook(SECRET, "msg_1", &then.to_string(), &sig, b"{}", NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_verify_webhook_malformed_inputs() {
        assert_eq!(
            verify_webhook(SECRET, "msg_1", "yesterday", "v1,abc", b"{}", NOW),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify_webhook("whsec_!!!", "msg_1", &NOW.to_string(), "v1,abc", b"{}", NOW),
            Err(SignatureError::InvalidSecret)
        );
        assert_eq!(
            verify_webhook(SECRET, "msg_1", &NOW.to_string(), "", b"{}", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_webhook_extreme_timestamps_expire() {
        for ts in ["-9223372036854775808", "9223372036854775807"] {
            assert_eq!(
                verify_webhook(SECRET, "msg_1", ts, "v1,abc", b"{}", NOW),
                Err(SignatureError::Expired),
                "timestamp {ts}"
            );
        }
    }
}
