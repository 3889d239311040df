//! # Notification Signatures
//!
//! `X-Hub-Signature: <algo>=<hex hmac>` over the exact notification body.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;

use crate::domain::{HubError, Secret};

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// HMAC digest used for signatures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    /// HMAC-SHA1, what PubSubHubbub 0.3 subscribers expect.
    #[default]
    Sha1,
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

impl SignatureAlgorithm {
    /// Prefix used in the header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha512 => "sha512",
        }
    }

    /// Parse a header prefix or config value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sha1" => Some(SignatureAlgorithm::Sha1),
            "sha256" => Some(SignatureAlgorithm::Sha256),
            "sha512" => Some(SignatureAlgorithm::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn digest(algorithm: SignatureAlgorithm, key: &[u8], body: &[u8]) -> Result<Vec<u8>, HubError> {
    let invalid = |e: hmac::digest::InvalidLength| HubError::Internal(format!("hmac key: {}", e));
    let bytes = match algorithm {
        SignatureAlgorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(invalid)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(invalid)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(invalid)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(bytes)
}

/// Header value for `body` signed with `secret`.
pub fn sign_body(
    algorithm: SignatureAlgorithm,
    secret: &Secret,
    body: &[u8],
) -> Result<String, HubError> {
    let mac = digest(algorithm, secret.as_bytes(), body)?;
    Ok(format!("{}={}", algorithm, hex::encode(mac)))
}

/// Check a received header value. Used by subscribers (and tests).
pub fn verify_signature(header: &str, secret: &Secret, body: &[u8]) -> bool {
    let Some((prefix, hex_mac)) = header.split_once('=') else {
        return false;
    };
    let Some(algorithm) = SignatureAlgorithm::parse(prefix) else {
        return false;
    };
    let Ok(received) = hex::decode(hex_mac) else {
        return false;
    };
    match digest(algorithm, secret.as_bytes(), body) {
        Ok(expected) => expected == received,
        Err(_) => false,
    }
}
