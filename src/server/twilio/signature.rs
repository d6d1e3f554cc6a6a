//! Webhook signature verification.
//!
//! Twilio signs every webhook with HMAC-SHA1 over the delivered URL followed
//! by the form parameters sorted by key (each key immediately followed by its
//! value), base64-encoded into the `X-Twilio-Signature` header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Checks a webhook signature against the shared auth token.
pub fn verify(auth_token: &str, url: &str, params: &[(String, String)], signature: &str) -> bool {
    match compute(auth_token, url, params) {
        Some(expected) => expected == signature,
        None => false,
    }
}

fn compute(auth_token: &str, url: &str, params: &[(String, String)]) -> Option<String> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut base = String::from(url);
    for (key, value) in sorted {
        base.push_str(key);
        base.push_str(value);
    }

    let mut mac = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()).ok()?;
    mac.update(base.as_bytes());
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<(String, String)> {
        vec![
            ("To".to_string(), "+18005551234".to_string()),
            ("CallSid".to_string(), "CA123".to_string()),
            ("From".to_string(), "+15551230000".to_string()),
        ]
    }

    #[test]
    fn signed_request_verifies() {
        let url = "https://dispatch.example.com/api/twilio/voice";
        let sig = compute("token-abc", url, &params()).unwrap();
        assert!(verify("token-abc", url, &params(), &sig));
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let url = "https://dispatch.example.com/api/twilio/voice";
        let sig = compute("token-abc", url, &params()).unwrap();
        let mut reordered = params();
        reordered.reverse();
        assert!(verify("token-abc", url, &reordered, &sig));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let url = "https://dispatch.example.com/api/twilio/voice";
        let sig = compute("token-abc", url, &params()).unwrap();
        let mut tampered = params();
        tampered[1].1 = "CA999".to_string();
        assert!(!verify("token-abc", url, &tampered, &sig));
    }

    #[test]
    fn wrong_token_is_rejected() {
        let url = "https://dispatch.example.com/api/twilio/voice";
        let sig = compute("token-abc", url, &params()).unwrap();
        assert!(!verify("other-token", url, &params(), &sig));
    }

    #[test]
    fn different_url_is_rejected() {
        let sig = compute(
            "token-abc",
            "https://dispatch.example.com/api/twilio/voice",
            &params(),
        )
        .unwrap();
        assert!(!verify(
            "token-abc",
            "https://evil.example.com/api/twilio/voice",
            &params(),
            &sig
        ));
    }
}
