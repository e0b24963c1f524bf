//! Webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs each delivery body with the shared webhook secret and sends
//! the result in `X-Hub-Signature-256` as `sha256=<hex>`. Verification runs
//! on the raw body before anything else looks at it.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header is not of the form `sha256=<hex>`.
    #[error("malformed signature header")]
    Malformed,

    /// The header is well-formed but does not match the body.
    #[error("signature does not match payload")]
    Mismatch,
}

/// Parses a `sha256=<hex>` header value into raw digest bytes.
///
/// Returns `None` for a missing prefix, another algorithm, or invalid hex.
///
/// ```
/// use estimate_bot::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=0aff"), Some(vec![0x0a, 0xff]));
/// assert!(parse_signature_header("sha1=0aff").is_none());
/// assert!(parse_signature_header("sha256=zz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 of `payload` keyed by `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a digest as a GitHub-style header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies `signature_header` against `payload` and `secret`.
///
/// The digest comparison is constant-time.
///
/// ```
/// use estimate_bot::webhooks::{SignatureError, compute_signature, format_signature_header, verify_signature};
///
/// let header = format_signature_header(&compute_signature(b"{}", b"secret"));
///
/// assert_eq!(verify_signature(b"{}", &header, b"secret"), Ok(()));
/// assert_eq!(verify_signature(b"{}", &header, b"other"), Err(SignatureError::Mismatch));
/// assert_eq!(verify_signature(b"{}", "sha256", b"secret"), Err(SignatureError::Malformed));
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let expected = parse_signature_header(signature_header).ok_or(SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
