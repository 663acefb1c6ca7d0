//! Content identifier classification.
//!
//! [`classify`] is pure and total: it never touches the network and always
//! returns one of four classes for any input. The distinction between
//! [`CidClass::NullPlaceholder`] and [`CidClass::Invalid`] matters downstream:
//! a placeholder means the registry entry exists but content was never
//! published (go straight to the cache), while an invalid reference is a
//! malformed value (log it and skip).

use serde::Serialize;

/// Classification of a content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CidClass {
    /// Legacy base58btc `Qm…` form, 46 characters.
    ValidV0,
    /// Multibase CIDv1, base32 `baf…` form.
    ValidV1,
    Invalid,
    /// All-zero or otherwise degenerate value standing in for unpublished content.
    NullPlaceholder,
}

impl CidClass {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::ValidV0 | Self::ValidV1)
    }
}

const V0_LEN: usize = 46;
const V1_MIN_LEN: usize = 50;

const PLACEHOLDER_LITERALS: &[&str] = &[
    "null",
    "undefined",
    "none",
    "placeholder",
    "pending",
    "0x",
];

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Strip URI scheme, gateway path and trailing path segments, leaving the bare identifier.
///
/// Accepts `ipfs://<cid>/path`, `/ipfs/<cid>`, `ipfs/<cid>` and
/// `https://<gateway>/ipfs/<cid>?query`.
pub fn strip_cid_prefix(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("ipfs://") {
        s = rest;
    } else if let Some(idx) = s.find("/ipfs/") {
        s = &s[idx + "/ipfs/".len()..];
    } else if let Some(rest) = s.strip_prefix("ipfs/") {
        s = rest;
    }
    // `ipfs://ipfs/<cid>` shows up from some older pinning tools
    if let Some(rest) = s.strip_prefix("ipfs/") {
        s = rest;
    }
    match s.find(['/', '?', '#']) {
        Some(end) => &s[..end],
        None => s,
    }
}

/// Classify a content identifier. See the module docs for the meaning of each class.
pub fn classify(identifier: &str) -> CidClass {
    let cid = strip_cid_prefix(identifier);

    if is_null_placeholder(cid) {
        return CidClass::NullPlaceholder;
    }

    if cid.len() == V0_LEN
        && cid.starts_with("Qm")
        && cid.chars().all(|c| BASE58_ALPHABET.contains(c))
    {
        return CidClass::ValidV0;
    }

    // Trailing charset is deliberately permissive: encoders disagree on case and padding.
    if cid.len() >= V1_MIN_LEN
        && cid.starts_with("baf")
        && cid.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return CidClass::ValidV1;
    }

    CidClass::Invalid
}

/// A mock upload's reference: a 32-bit hex hash left-padded with `0` to the v0 length.
/// `0` is outside the base58 alphabet, so no real v0 CID has this shape.
fn is_zero_padded_mock(rest: &str) -> bool {
    if rest.len() + 2 != V0_LEN {
        return false;
    }
    let hash = rest.trim_start_matches('0');
    hash.len() <= 8 && hash.len() < rest.len() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_null_placeholder(cid: &str) -> bool {
    if cid.is_empty() {
        return true;
    }
    let lower = cid.to_ascii_lowercase();
    if PLACEHOLDER_LITERALS.contains(&lower.as_str()) {
        return true;
    }
    if let Some(hex) = lower.strip_prefix("0x") {
        if hex.chars().all(|c| c == '0') {
            return true;
        }
    }
    if cid.chars().all(|c| c == '0') {
        return true;
    }
    // Base58 '1' and base32 'a' encode zero bytes.
    if let Some(rest) = cid.strip_prefix("Qm") {
        if rest.chars().all(|c| c == '0' || c == '1') {
            return true;
        }
        if is_zero_padded_mock(rest) {
            return true;
        }
    }
    if let Some(rest) = lower.strip_prefix("baf") {
        if rest.len() > 8 && rest.get(4..).is_some_and(|tail| tail.chars().all(|c| c == 'a')) {
            return true;
        }
    }
    let mut chars = cid.chars();
    match chars.next() {
        Some(first) => cid.len() > 1 && chars.all(|c| c == first),
        None => true,
    }
}
