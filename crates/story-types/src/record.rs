//! Token records and the documents they are assembled from.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registry ordinal for a token. Has no existence until the registry confirms it.
pub type TokenId = u64;

/// Sentinel used when neither the content store nor the cache names an author or genre.
pub const UNKNOWN: &str = "Unknown";

/// Where the fields of a [`TokenRecord`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Registry plus content store, nothing backfilled from the cache.
    OnChainContentStore,
    /// Registry plus content store, with at least one field backfilled from the cache.
    OnChainCacheMerged,
    /// Content store unavailable; every content field came from the cache.
    LocalCacheOnly,
}

impl ResolutionSource {
    /// True when at least part of the record was read from the content store.
    pub fn is_content_store_derived(self) -> bool {
        matches!(self, Self::OnChainContentStore | Self::OnChainCacheMerged)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OnChainContentStore => "on-chain+content-store",
            Self::OnChainCacheMerged => "on-chain+local-cache-merged",
            Self::LocalCacheOnly => "local-cache-only",
        }
    }
}

/// Content kind as recorded by the registry at mint time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    TextOnly,
    TextWithImages,
    #[default]
    Unknown,
}

impl ContentType {
    /// Map the registry's `uint8` content type code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::TextOnly,
            1 => Self::TextWithImages,
            _ => Self::Unknown,
        }
    }

    /// Human readable label, matching what the minting UI shows.
    pub fn label(self) -> &'static str {
        match self {
            Self::TextOnly => "Text Only",
            Self::TextWithImages => "Text + Images",
            Self::Unknown => UNKNOWN,
        }
    }
}

/// A single `{ trait_type, value }` entry of an ERC-721 metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    #[serde(alias = "traitType")]
    pub trait_type: String,
    #[serde(default)]
    pub value: Value,
}

impl MetadataAttribute {
    /// The attribute value rendered as text. Strings and numbers only; empty strings are `None`.
    pub fn value_str(&self) -> Option<String> {
        match &self.value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Metadata document pointed to by `tokenURI`.
///
/// Parsing is lenient: unknown fields are ignored and every field is optional,
/// because documents are written by several generations of the minting flow.
/// Synonyms (`name`/`title`, `image`/`imageUrl`, `content`/`storyContent`) are
/// kept as separate fields so a document carrying both never fails to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<MetadataAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "storyContent", skip_serializing_if = "Option::is_none")]
    pub story_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl TokenMetadata {
    /// Parse a metadata document, dropping mistyped fields. `None` if `value` is not an object.
    pub fn deserialize_lenient(value: &Value) -> Option<Self> {
        lenient(value)
    }

    /// Look up an attribute by trait name, case-insensitively.
    pub fn attribute(&self, trait_type: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|a| a.trait_type.eq_ignore_ascii_case(trait_type))
            .and_then(MetadataAttribute::value_str)
    }

    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.name.as_deref()).or_else(|| non_empty(self.title.as_deref()))
    }

    pub fn cover_image(&self) -> Option<&str> {
        non_empty(self.image.as_deref()).or_else(|| non_empty(self.image_url.as_deref()))
    }

    /// Story body embedded in the document, if the minting flow put it there.
    pub fn story(&self) -> Option<&str> {
        non_empty(self.story_content.as_deref()).or_else(|| non_empty(self.content.as_deref()))
    }
}

/// Record written by the minting flow at creation time, keyed `"<prefix>_<tokenId>"`.
///
/// Read-only to the discovery engine and never validated against the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachedMintRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TokenMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_content: Option<String>,
    /// Older minting flows stored the body under `content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CachedMintRecord {
    /// Parse a stored record, dropping fields whose type does not match
    /// instead of rejecting the whole record. `None` if `value` is not an object.
    pub fn deserialize_lenient(value: &Value) -> Option<Self> {
        let mut record: Self = lenient(value)?;
        if record.metadata.is_none() {
            record.metadata = value.get("metadata").and_then(lenient);
        }
        Some(record)
    }

    /// Attribute from the cached metadata document, if any.
    pub fn attribute(&self, trait_type: &str) -> Option<String> {
        self.metadata.as_ref().and_then(|m| m.attribute(trait_type))
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(TokenMetadata::display_name)
            .or_else(|| non_empty(self.title.as_deref()))
    }

    pub fn description(&self) -> Option<&str> {
        non_empty(self.metadata.as_ref().and_then(|m| m.description.as_deref()))
            .or_else(|| non_empty(self.description.as_deref()))
    }

    pub fn story(&self) -> Option<&str> {
        non_empty(self.story_content.as_deref())
            .or_else(|| non_empty(self.content.as_deref()))
            .or_else(|| self.metadata.as_ref().and_then(TokenMetadata::story))
    }

    /// Cached image list; the metadata's own list is used when the top-level one is empty.
    pub fn image_list(&self) -> &[String] {
        if !self.images.is_empty() {
            return &self.images;
        }
        self.metadata
            .as_ref()
            .map(|m| m.images.as_slice())
            .unwrap_or_default()
    }

    pub fn cover_image(&self) -> Option<&str> {
        non_empty(self.image_url.as_deref())
            .or_else(|| self.metadata.as_ref().and_then(TokenMetadata::cover_image))
    }
}

/// The resolved, normalized view of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: TokenId,
    pub title: String,
    pub description: String,
    pub story_content: String,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub owner: Option<String>,
    pub genre: String,
    pub author: String,
    pub content_type: ContentType,
    pub image_count: u64,
    pub resolution_source: ResolutionSource,
}

impl TokenRecord {
    /// Default title for a token whose metadata carries none.
    pub fn fallback_title(id: TokenId) -> String {
        format!("Story #{id}")
    }
}

fn lenient<T: DeserializeOwned>(value: &Value) -> Option<T> {
    let object = value.as_object()?;
    if let Ok(parsed) = serde_json::from_value(value.clone()) {
        return Some(parsed);
    }
    let kept: Map<String, Value> = object
        .iter()
        .filter(|(key, field)| {
            let single = Map::from_iter([((*key).clone(), (*field).clone())]);
            serde_json::from_value::<T>(Value::Object(single)).is_ok()
        })
        .map(|(key, field)| (key.clone(), field.clone()))
        .collect();
    serde_json::from_value(Value::Object(kept)).ok()
}

pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
