//! Ed25519 verification of inbound interaction webhooks.
//!
//! The chat platform signs `timestamp || body` and sends the signature as hex
//! in `X-Signature-Ed25519`, the timestamp in `X-Signature-Timestamp`.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

use crate::sites::SiteConfig;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Why a webhook was refused. Every variant maps to an empty 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureRejection {
    #[error("signature or timestamp header missing")]
    MissingHeaders,

    #[error("unknown site")]
    UnknownSite,

    #[error("site has no verification key")]
    NoKey,

    #[error("signature does not verify")]
    Invalid,
}

/// Check `signature_hex` against `timestamp || body`.
///
/// Malformed hex and wrong lengths are plain failures.
pub fn verify(key: &VerifyingKey, signature_hex: &str, timestamp: &str, body: &[u8]) -> bool {
    let Ok(bytes) = const_hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    key.verify(&message, &signature).is_ok()
}

/// Full admission check for one request, cheapest checks first.
pub fn verify_request(
    site: Option<&SiteConfig>,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
) -> Result<(), SignatureRejection> {
    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return Err(SignatureRejection::MissingHeaders);
    };
    let site = site.ok_or(SignatureRejection::UnknownSite)?;
    let key = site.verifying_key.as_ref().ok_or(SignatureRejection::NoKey)?;

    if verify(key, signature, timestamp, body) {
        Ok(())
    } else {
        Err(SignatureRejection::Invalid)
    }
}
