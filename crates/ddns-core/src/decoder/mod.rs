//! Tolerant response decoding
//!
//! Response bodies from address sources and provider APIs pass through two
//! stages before any field is read:
//!
//! 1. [`decode_body`] sniffs the gzip magic number and inflates the container
//!    when present; anything else is passed through untouched.
//! 2. [`JsonView`] answers typed field queries by scanning the decoded bytes
//!    directly. No parse tree is built: lookups resolve to the first
//!    structural match in document order and sub-objects are borrowed views
//!    into the same buffer.
//!
//! [`decode_unicode_escapes`] is a display helper for log output only.

mod query;
mod unicode;

pub use query::JsonView;
pub use unicode::decode_unicode_escapes;

use crate::error::ParseError;
use flate2::read::MultiGzDecoder;
use std::io::Read;

/// First two bytes of every gzip member (RFC 1952)
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns true when the buffer starts with the gzip magic number
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Reverse the transport compression wrapper, if any
///
/// Gzip input is fully inflated (all members, CRC checked); any other input
/// is returned as-is without copying.
pub fn decode_body(raw: Vec<u8>) -> Result<Vec<u8>, ParseError> {
    if !is_gzip(&raw) {
        return Ok(raw);
    }

    let mut inflated = Vec::with_capacity(raw.len().saturating_mul(4));
    MultiGzDecoder::new(raw.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| ParseError::InvalidFormat(format!("corrupt gzip body: {}", e)))?;

    tracing::trace!(
        compressed = raw.len(),
        inflated = inflated.len(),
        "Inflated gzip response body"
    );
    Ok(inflated)
}
