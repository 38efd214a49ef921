//! # Request Signer
//!
//! Signs outbound calls to the trusted receipt backend.
//!
//! ## Canonical String
//!
//! ```text
//! RL1\n{METHOD}\n{PATH}\n{TS}\n{NONCE}\n{BODY_SHA256_HEX}
//! ```
//!
//! Newline-joined, no trailing newline. The signature is HMAC-SHA256 of that
//! string under the shared secret, base64url without padding.
//!
//! ## Headers
//!
//! | Header | Value |
//! |--------|-------|
//! | `x-rl-ts` | Unix milliseconds |
//! | `x-rl-nonce` | 128-bit random, hex |
//! | `x-rl-body-sha256` | SHA-256 of the exact body bytes |
//! | `x-rl-signature` | base64url HMAC |
//!
//! Replay and skew rejection happen on the receiving side.

use crate::errors::CryptoError;
use crate::hashing::sha256_hex;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Version prefix of the canonical string.
pub const SIGNING_VERSION: &str = "RL1";

/// Header carrying the millisecond timestamp.
pub const HEADER_TIMESTAMP: &str = "x-rl-ts";
/// Header carrying the nonce.
pub const HEADER_NONCE: &str = "x-rl-nonce";
/// Header carrying the body hash.
pub const HEADER_BODY_HASH: &str = "x-rl-body-sha256";
/// Header carrying the signature.
pub const HEADER_SIGNATURE: &str = "x-rl-signature";

/// Nonce size in bytes before hex encoding.
pub const NONCE_BYTES: usize = 16;

/// The four values that must accompany a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Unix milliseconds
    pub timestamp: i64,
    /// Single-use nonce
    pub nonce: String,
    /// Hex SHA-256 of the body
    pub body_hash: String,
    /// base64url HMAC-SHA256
    pub signature: String,
}

impl SignedHeaders {
    /// Header name/value pairs in a fixed order.
    pub fn pairs(&self) -> [(&'static str, String); 4] {
        [
            (HEADER_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_NONCE, self.nonce.clone()),
            (HEADER_BODY_HASH, self.body_hash.clone()),
            (HEADER_SIGNATURE, self.signature.clone()),
        ]
    }
}

/// Build the canonical signing string.
pub fn canonical_string(
    method: &str,
    path: &str,
    timestamp: i64,
    nonce: &str,
    body_hash: &str,
) -> String {
    [
        SIGNING_VERSION,
        method,
        path,
        &timestamp.to_string(),
        nonce,
        body_hash,
    ]
    .join("\n")
}

/// Check that `path` is a bare function path such as `/issue-receipt`.
///
/// Exactly one segment after a single leading slash. No host, scheme,
/// query or fragment.
pub fn canonical_path(path: &str) -> Result<&str, CryptoError> {
    let invalid = || CryptoError::InvalidPath(path.to_string());
    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    if rest.is_empty() || rest.contains('/') {
        return Err(invalid());
    }
    if path
        .chars()
        .any(|c| c.is_whitespace() || c == '?' || c == '#' || c == ':')
    {
        return Err(invalid());
    }
    Ok(path)
}

fn canonical_method(method: &str) -> Result<String, CryptoError> {
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CryptoError::InvalidMethod(method.to_string()));
    }
    Ok(method.to_ascii_uppercase())
}

/// Fresh random nonce, hex encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// HMAC-SHA256 request signer holding the shared secret.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RequestSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    /// Create a signer. An empty secret is a configuration error.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        Ok(Self { secret })
    }

    fn mac(&self) -> Result<HmacSha256, CryptoError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| CryptoError::InvalidKeyLength)
    }

    /// Sign a canonical string; base64url, no padding.
    pub fn sign(&self, canonical: &str) -> Result<String, CryptoError> {
        let mut mac = self.mac()?;
        mac.update(canonical.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Sign a request with the current time and a fresh nonce.
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<SignedHeaders, CryptoError> {
        self.sign_request_at(method, path, now_millis(), &generate_nonce(), body)
    }

    /// Sign a request with caller-supplied timestamp and nonce.
    pub fn sign_request_at(
        &self,
        method: &str,
        path: &str,
        timestamp: i64,
        nonce: &str,
        body: &[u8],
    ) -> Result<SignedHeaders, CryptoError> {
        let method = canonical_method(method)?;
        let path = canonical_path(path)?;
        if nonce.is_empty() || nonce.contains('\n') {
            return Err(CryptoError::InvalidNonce);
        }
        let body_hash = sha256_hex(body);
        let signature = self.sign(&canonical_string(
            &method, path, timestamp, nonce, &body_hash,
        ))?;
        Ok(SignedHeaders {
            timestamp,
            nonce: nonce.to_string(),
            body_hash,
            signature,
        })
    }

    /// Recompute and compare in constant time.
    ///
    /// Also checks that `body` hashes to the declared body hash.
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        headers: &SignedHeaders,
    ) -> Result<(), CryptoError> {
        if sha256_hex(body) != headers.body_hash {
            return Err(CryptoError::SignatureVerificationFailed);
        }
        let method = canonical_method(method)?;
        let path = canonical_path(path)?;
        let expected = URL_SAFE_NO_PAD
            .decode(headers.signature.as_bytes())
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        let mut mac = self.mac()?;
        mac.update(
            canonical_string(
                &method,
                path,
                headers.timestamp,
                &headers.nonce,
                &headers.body_hash,
            )
            .as_bytes(),
        );
        mac.verify_slice(&expected)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TS: i64 = 1_700_000_000_000;
    const NONCE: &str = "00112233445566778899aabbccddeeff";

    fn signer() -> RequestSigner {
        RequestSigner::new(b"test-secret".to_vec()).unwrap()
    }

    #[test]
    fn test_canonical_string_layout() {
        let s = canonical_string("POST", "/issue-receipt", 42, "n1", "abc");
        assert_eq!(s, "RL1\nPOST\n/issue-receipt\n42\nn1\nabc");
        assert!(!s.ends_with('\n'));
    }

    #[test]
    fn test_signature_is_reproducible() {
        let a = signer()
            .sign_request_at("POST", "/issue-receipt", TS, NONCE, b"{}")
            .unwrap();
        let b = signer()
            .sign_request_at("POST", "/issue-receipt", TS, NONCE, b"{}")
            .unwrap();
        assert_eq!(a, b);
        assert!(!a.signature.contains('='));
        assert!(!a.signature.contains('+'));
        assert!(!a.signature.contains('/'));
        assert_eq!(a.signature.len(), 43);
    }

    #[test]
    fn test_each_input_changes_signature() {
        let s = signer();
        let base = s
            .sign_request_at("POST", "/issue-receipt", TS, NONCE, b"{}")
            .unwrap()
            .signature;
        let variants = [
            s.sign_request_at("PUT", "/issue-receipt", TS, NONCE, b"{}"),
            s.sign_request_at("POST", "/consume-receipt", TS, NONCE, b"{}"),
            s.sign_request_at("POST", "/issue-receipt", TS + 1, NONCE, b"{}"),
            s.sign_request_at("POST", "/issue-receipt", TS, "other", b"{}"),
            s.sign_request_at("POST", "/issue-receipt", TS, NONCE, b"{ }"),
        ];
        for v in variants {
            assert_ne!(v.unwrap().signature, base);
        }
        let other_secret = RequestSigner::new(b"other".to_vec())
            .unwrap()
            .sign_request_at("POST", "/issue-receipt", TS, NONCE, b"{}")
            .unwrap();
        assert_ne!(other_secret.signature, base);
    }

    #[test]
    fn test_fresh_nonce_per_request() {
        let s = signer();
        let a = s.sign_request("POST", "/issue-receipt", b"{}").unwrap();
        let b = s.sign_request("POST", "/issue-receipt", b"{}").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), NONCE_BYTES * 2);
    }

    #[test]
    fn test_verify_round_trip_and_tamper() {
        let s = signer();
        let headers = s.sign_request("POST", "/validate-receipt", b"body").unwrap();
        assert!(s.verify("POST", "/validate-receipt", b"body", &headers).is_ok());
        assert_eq!(
            s.verify("POST", "/validate-receipt", b"b0dy", &headers),
            Err(CryptoError::SignatureVerificationFailed)
        );
        let mut forged = headers.clone();
        forged.timestamp += 1;
        assert_eq!(
            s.verify("POST", "/validate-receipt", b"body", &forged),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_rejects_non_canonical_paths() {
        for bad in [
            "issue-receipt",
            "/",
            "//issue",
            "/issue?x=1",
            "https://host/issue",
            "/a b",
            "/functions/v1/issue-receipt",
            "/issue-receipt/",
        ] {
            assert!(canonical_path(bad).is_err(), "{bad}");
        }
        assert_eq!(canonical_path("/issue-receipt"), Ok("/issue-receipt"));
        assert!(signer()
            .sign_request_at("POST", "/functions/v1/issue-receipt", TS, NONCE, b"{}")
            .is_err());
    }

    #[test]
    fn test_known_vector() {
        let body = br#"{"receipt_id":"r-1"}"#;
        let body_hash = "a3985576f92c9d15418255c1f5e70ff4b6dfa66e4a8f9042270ada52b345666b";
        let headers = signer()
            .sign_request_at("post", "/issue-receipt", TS, NONCE, body)
            .unwrap();

        assert_eq!(
            canonical_string("POST", "/issue-receipt", TS, NONCE, body_hash),
            "RL1\nPOST\n/issue-receipt\n1700000000000\n00112233445566778899aabbccddeeff\n\
             a3985576f92c9d15418255c1f5e70ff4b6dfa66e4a8f9042270ada52b345666b"
        );
        assert_eq!(headers.body_hash, body_hash);
        assert_eq!(headers.signature, "Lnet89k_qMqqNZptXiCn4UOmnVcYXnPcortWS3--3VU");
        assert_eq!(
            headers.pairs(),
            [
                ("x-rl-ts", "1700000000000".to_string()),
                ("x-rl-nonce", NONCE.to_string()),
                ("x-rl-body-sha256", body_hash.to_string()),
                ("x-rl-signature", "Lnet89k_qMqqNZptXiCn4UOmnVcYXnPcortWS3--3VU".to_string()),
            ]
        );
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            RequestSigner::new(Vec::new()).unwrap_err(),
            CryptoError::EmptySecret
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains("test-secret"));
    }

    proptest! {
        #[test]
        fn prop_verify_accepts_own_signature(body in proptest::collection::vec(any::<u8>(), 0..256), ts in 0i64..i64::MAX / 2) {
            let s = signer();
            let headers = s.sign_request_at("POST", "/issue-receipt", ts, NONCE, &body).unwrap();
            prop_assert!(s.verify("post", "/issue-receipt", &body, &headers).is_ok());
        }
    }
}
