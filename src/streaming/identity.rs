//! Content identity check.
//!
//! A stored file reference carries a short hash: the first characters of the
//! upstream file's unique id. Before streaming, the unique id is fetched again
//! and its prefix compared, so a message swapped upstream is never served
//! under an old link.

use reelstream_common::{Error, FileProperties, Result};

/// Length of the short identity hash.
pub const IDENTITY_HASH_LEN: usize = 6;

/// Short identity of an upstream unique id (its first six characters).
///
/// ```
/// use reelstream::streaming::short_identity;
///
/// assert_eq!(short_identity("abc123xyz999"), "abc123");
/// assert_eq!(short_identity("abc"), "abc");
/// ```
pub fn short_identity(unique_id: &str) -> &str {
    match unique_id.char_indices().nth(IDENTITY_HASH_LEN) {
        Some((end, _)) => &unique_id[..end],
        None => unique_id,
    }
}

/// Outcome of a successful identity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The stored hash matches the upstream file.
    Verified,
    /// No hash was stored; the file is served unverified.
    Unverified,
}

/// Compare a stored identity hash with the upstream file properties.
///
/// A missing (or empty) hash passes as [`Verification::Unverified`] unless
/// `require_hash` is set.
pub fn verify_identity(
    expected: Option<&str>,
    properties: &FileProperties,
    require_hash: bool,
) -> Result<Verification> {
    let expected = match expected.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hash) => hash,
        None if require_hash => {
            return Err(Error::auth("file has no identity hash and verification is required"));
        }
        None => return Ok(Verification::Unverified),
    };

    let actual = short_identity(&properties.unique_id);
    if actual != expected {
        return Err(Error::IntegrityViolation {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    Ok(Verification::Verified)
}
