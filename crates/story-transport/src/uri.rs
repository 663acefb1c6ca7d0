//! Content references as stored in the registry.
//!
//! A `tokenURI` or story hash is either self-contained (`data:` URI, decoded
//! locally with no network) or points into the content store. Anything that
//! is neither is kept as [`ContentReference::Unsupported`] so the resolver can
//! log it and fall back to the cache.

use base64::Engine;
use serde::de::DeserializeOwned;
use story_discovery_types::{DiscoveryError, DiscoveryResult};

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePayload {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl InlinePayload {
    pub fn as_text(&self) -> DiscoveryResult<String> {
        String::from_utf8(self.data.clone())
            .map_err(|e| DiscoveryError::MetadataParse(format!("inline payload is not UTF-8: {e}")))
    }

    pub fn as_json<T: DeserializeOwned>(&self) -> DiscoveryResult<T> {
        serde_json::from_slice(&self.data)
            .map_err(|e| DiscoveryError::MetadataParse(format!("inline JSON: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentReference {
    /// Self-contained payload; resolving it needs no network.
    Inline(InlinePayload),
    /// Content store locator: a CID, optionally followed by a path (`<cid>/metadata.json`).
    Addressed(String),
    /// Plain web URL or other scheme the content fetcher does not serve.
    Unsupported(String),
}

impl ContentReference {
    /// Parse a registry-provided reference.
    ///
    /// Only a malformed `data:` URI is an error; every other input maps to a
    /// variant, and CID validity is left to the content fetcher.
    pub fn parse(raw: &str) -> DiscoveryResult<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with("data:") {
            return decode_data_uri(trimmed).map(Self::Inline);
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            if trimmed.contains("/ipfs/") {
                return Ok(Self::Addressed(content_locator(trimmed)));
            }
            return Ok(Self::Unsupported(trimmed.to_string()));
        }
        if lower.contains("://") && !lower.starts_with("ipfs://") {
            return Ok(Self::Unsupported(trimmed.to_string()));
        }
        Ok(Self::Addressed(content_locator(trimmed)))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

/// Strip the scheme or gateway prefix from a reference but keep any path after the CID.
pub fn content_locator(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("ipfs://") {
        s = rest;
    } else if let Some(idx) = s.find("/ipfs/") {
        s = &s[idx + "/ipfs/".len()..];
    }
    while let Some(rest) = s.strip_prefix("ipfs/") {
        s = rest;
    }
    let s = s.trim_start_matches('/');
    match s.find(['?', '#']) {
        Some(end) => s[..end].trim_end_matches('/').to_string(),
        None => s.trim_end_matches('/').to_string(),
    }
}

/// Decode `data:[<media type>][;base64],<payload>`.
pub fn decode_data_uri(uri: &str) -> DiscoveryResult<InlinePayload> {
    let body = uri
        .strip_prefix("data:")
        .ok_or_else(|| DiscoveryError::MetadataParse("not a data URI".to_string()))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| DiscoveryError::MetadataParse("data URI has no payload separator".to_string()))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media) => (media, true),
        None => (header, false),
    };
    let media_type = if media_type.is_empty() {
        "text/plain".to_string()
    } else {
        media_type.to_string()
    };

    let data = if is_base64 {
        decode_base64(payload.trim())?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok(InlinePayload { media_type, data })
}

fn decode_base64(payload: &str) -> DiscoveryResult<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(payload).ok())
        .ok_or_else(|| DiscoveryError::MetadataParse("data URI payload is not valid base64".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[test]
    fn test_inline_base64_json() {
        let json = r#"{"name":"Digital Hearts","attributes":[]}"#;
        let uri = format!(
            "data:application/json;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(json)
        );
        let ContentReference::Inline(payload) = ContentReference::parse(&uri).unwrap() else {
            panic!("expected inline payload");
        };
        assert_eq!(payload.media_type, "application/json");
        let doc: Value = payload.as_json().unwrap();
        assert_eq!(doc["name"], "Digital Hearts");
    }

    #[test]
    fn test_inline_percent_encoded_text() {
        let reference = ContentReference::parse("data:,Once%20upon%20a%20time").unwrap();
        let ContentReference::Inline(payload) = reference else {
            panic!("expected inline payload");
        };
        assert_eq!(payload.media_type, "text/plain");
        assert_eq!(payload.as_text().unwrap(), "Once upon a time");
    }

    #[test]
    fn test_malformed_data_uri() {
        assert!(matches!(
            ContentReference::parse("data:application/json;base64"),
            Err(DiscoveryError::MetadataParse(_))
        ));
        assert!(matches!(
            ContentReference::parse("data:application/json;base64,@@@"),
            Err(DiscoveryError::MetadataParse(_))
        ));
    }

    #[test]
    fn test_addressed_forms_keep_path() {
        assert_eq!(
            ContentReference::parse(&format!("ipfs://{CID}/metadata.json")).unwrap(),
            ContentReference::Addressed(format!("{CID}/metadata.json"))
        );
        assert_eq!(
            ContentReference::parse(&format!("https://ipfs.io/ipfs/{CID}?download=1")).unwrap(),
            ContentReference::Addressed(CID.to_string())
        );
        assert_eq!(
            ContentReference::parse(CID).unwrap(),
            ContentReference::Addressed(CID.to_string())
        );
        // Placeholders still parse; the fetcher rejects them without touching the network.
        assert_eq!(
            ContentReference::parse("").unwrap(),
            ContentReference::Addressed(String::new())
        );
    }

    #[test]
    fn test_unsupported_urls() {
        assert!(matches!(
            ContentReference::parse("https://example.com/meta.json").unwrap(),
            ContentReference::Unsupported(_)
        ));
        assert!(matches!(
            ContentReference::parse("ar://abcdef").unwrap(),
            ContentReference::Unsupported(_)
        ));
    }
}
