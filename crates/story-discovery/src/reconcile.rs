//! Reconciliation of content-store data with a cached mint record.
//!
//! Content-store fields win. Any field the content store leaves empty is
//! backfilled from the cache, and the record's [`ResolutionSource`] says
//! whether that happened. Pure: no I/O, no clock.

use story_discovery_types::{
    CachedMintRecord, ContentType, ResolutionSource, TokenId, TokenMetadata, TokenRecord, UNKNOWN,
};

/// What the registry and content store produced for one token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentStoreParts {
    pub id: TokenId,
    pub owner: Option<String>,
    pub metadata: Option<TokenMetadata>,
    /// Story body fetched through `getStoryDetails`.
    pub story: Option<String>,
    pub image_count: Option<u64>,
    pub content_type: Option<ContentType>,
}

impl ContentStoreParts {
    pub fn new(id: TokenId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// True if any content was actually read from the content store.
    pub fn has_content(&self) -> bool {
        self.metadata.is_some() || self.story.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

struct Picker {
    content_store: bool,
    backfilled: bool,
}

impl Picker {
    fn pick<T>(&mut self, primary: Option<T>, fallback: Option<T>) -> Option<T> {
        match primary {
            Some(value) => Some(value),
            None => {
                let value = fallback?;
                if self.content_store {
                    self.backfilled = true;
                }
                Some(value)
            }
        }
    }
}

/// Union of two image lists, starting from the longer one. Order is kept and
/// duplicates and blanks are dropped.
pub fn merge_images(content: &[String], cached: &[String]) -> Vec<String> {
    let (base, extra) = if cached.len() > content.len() {
        (cached, content)
    } else {
        (content, cached)
    };
    let mut merged: Vec<String> = Vec::with_capacity(base.len() + extra.len());
    for image in base.iter().chain(extra) {
        let image = image.trim();
        if !image.is_empty() && !merged.iter().any(|m| m == image) {
            merged.push(image.to_string());
        }
    }
    merged
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn content_attribute(metadata: Option<&TokenMetadata>, name: &str, top_level: Option<&str>) -> Option<String> {
    metadata
        .and_then(|m| m.attribute(name))
        .or_else(|| non_empty(top_level))
}

/// Build the normalized record, or `None` when neither source has anything.
pub fn reconcile(parts: ContentStoreParts, cached: Option<&CachedMintRecord>) -> Option<TokenRecord> {
    let content_store = parts.has_content();
    if !content_store && cached.is_none() {
        return None;
    }
    let mut picker = Picker {
        content_store,
        backfilled: false,
    };
    let meta = parts.metadata.as_ref();

    let title = picker
        .pick(
            non_empty(meta.and_then(TokenMetadata::display_name)),
            non_empty(cached.and_then(CachedMintRecord::title)),
        )
        .unwrap_or_else(|| TokenRecord::fallback_title(parts.id));

    let description = picker
        .pick(
            non_empty(meta.and_then(|m| m.description.as_deref())),
            non_empty(cached.and_then(CachedMintRecord::description)),
        )
        .unwrap_or_default();

    let story_content = picker
        .pick(
            non_empty(parts.story.as_deref()).or_else(|| non_empty(meta.and_then(TokenMetadata::story))),
            non_empty(cached.and_then(CachedMintRecord::story)),
        )
        .unwrap_or_default();

    let content_images = meta.map(|m| m.images.as_slice()).unwrap_or_default();
    let images = merge_images(content_images, cached.map(CachedMintRecord::image_list).unwrap_or_default());
    if content_store && images.len() > content_images.len() {
        picker.backfilled = true;
    }

    let image_url = picker
        .pick(
            non_empty(meta.and_then(TokenMetadata::cover_image)),
            non_empty(cached.and_then(CachedMintRecord::cover_image)),
        )
        .or_else(|| images.first().cloned());

    let author = picker
        .pick(
            content_attribute(meta, "author", meta.and_then(|m| m.author.as_deref())),
            content_attribute(
                cached.and_then(|c| c.metadata.as_ref()),
                "author",
                cached.and_then(|c| c.author.as_deref()),
            ),
        )
        .unwrap_or_else(|| UNKNOWN.to_string());

    let genre = picker
        .pick(
            content_attribute(meta, "genre", meta.and_then(|m| m.genre.as_deref())),
            content_attribute(
                cached.and_then(|c| c.metadata.as_ref()),
                "genre",
                cached.and_then(|c| c.genre.as_deref()),
            ),
        )
        .unwrap_or_else(|| UNKNOWN.to_string());

    let content_type = picker
        .pick(parts.content_type, cached.and_then(|c| c.content_type))
        .unwrap_or_default();

    let image_count = parts.image_count.unwrap_or(images.len() as u64);

    let resolution_source = match (content_store, picker.backfilled) {
        (true, false) => ResolutionSource::OnChainContentStore,
        (true, true) => ResolutionSource::OnChainCacheMerged,
        (false, _) => ResolutionSource::LocalCacheOnly,
    };

    Some(TokenRecord {
        id: parts.id,
        title,
        description,
        story_content,
        image_url,
        images,
        owner: parts.owner,
        genre,
        author,
        content_type,
        image_count,
        resolution_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> TokenMetadata {
        TokenMetadata::deserialize_lenient(&value).unwrap()
    }

    fn cached(value: serde_json::Value) -> CachedMintRecord {
        CachedMintRecord::deserialize_lenient(&value).unwrap()
    }

    fn full_parts(id: TokenId) -> ContentStoreParts {
        ContentStoreParts {
            id,
            owner: Some("0xabc".into()),
            metadata: Some(metadata(json!({
                "name": "Ember",
                "description": "A fire story",
                "image": "ipfs://cover",
                "images": ["ipfs://cover"],
                "attributes": [
                    { "trait_type": "Author", "value": "Kai" },
                    { "trait_type": "Genre", "value": "Fantasy" }
                ]
            }))),
            story: Some("The fire rose.".into()),
            image_count: Some(1),
            content_type: Some(ContentType::TextWithImages),
        }
    }

    #[test]
    fn test_content_store_only() {
        let record = reconcile(full_parts(3), None).unwrap();
        assert_eq!(record.resolution_source, ResolutionSource::OnChainContentStore);
        assert_eq!(record.title, "Ember");
        assert_eq!(record.author, "Kai");
        assert_eq!(record.genre, "Fantasy");
        assert_eq!(record.story_content, "The fire rose.");
        assert_eq!(record.image_url.as_deref(), Some("ipfs://cover"));
    }

    #[test]
    fn test_empty_images_backfilled_from_cache() {
        let mut parts = full_parts(4);
        if let Some(meta) = parts.metadata.as_mut() {
            meta.images.clear();
        }
        let cache = cached(json!({ "images": ["a.png", "b.png", "c.png"] }));

        let record = reconcile(parts, Some(&cache)).unwrap();
        assert_eq!(record.images.len(), 3);
        assert_eq!(record.resolution_source, ResolutionSource::OnChainCacheMerged);
    }

    #[test]
    fn test_images_union_keeps_richer_list_first() {
        let content = vec!["x.png".to_string()];
        let cached = vec!["a.png".to_string(), "x.png".to_string(), " ".to_string()];
        assert_eq!(merge_images(&content, &cached), vec!["a.png", "x.png"]);
        assert_eq!(merge_images(&cached[..1], &[]), vec!["a.png"]);
    }

    #[test]
    fn test_content_fields_win_over_cache() {
        let cache = cached(json!({
            "metadata": { "name": "Old title", "attributes": [{ "trait_type": "author", "value": "Someone" }] },
            "author": "Top level",
            "storyContent": "old text",
            "images": ["ipfs://cover"]
        }));
        let record = reconcile(full_parts(5), Some(&cache)).unwrap();
        assert_eq!(record.title, "Ember");
        assert_eq!(record.author, "Kai");
        assert_eq!(record.story_content, "The fire rose.");
        assert_eq!(record.resolution_source, ResolutionSource::OnChainContentStore);
    }

    #[test]
    fn test_author_genre_precedence() {
        let parts = ContentStoreParts {
            metadata: Some(metadata(json!({ "name": "Untagged" }))),
            ..ContentStoreParts::new(6)
        };
        let cache = cached(json!({
            "metadata": { "attributes": [{ "trait_type": "genre", "value": "Mystery" }] },
            "genre": "Ignored",
            "author": "Cached Author"
        }));
        let record = reconcile(parts.clone(), Some(&cache)).unwrap();
        assert_eq!(record.genre, "Mystery");
        assert_eq!(record.author, "Cached Author");
        assert_eq!(record.resolution_source, ResolutionSource::OnChainCacheMerged);

        let record = reconcile(parts, None).unwrap();
        assert_eq!(record.genre, UNKNOWN);
        assert_eq!(record.author, UNKNOWN);
    }

    #[test]
    fn test_cache_only_and_unresolvable() {
        let cache = cached(json!({
            "metadata": { "name": "Offline" },
            "content": "Saved locally",
            "contentType": "text_only"
        }));
        let record = reconcile(ContentStoreParts::new(8), Some(&cache)).unwrap();
        assert_eq!(record.resolution_source, ResolutionSource::LocalCacheOnly);
        assert_eq!(record.title, "Offline");
        assert_eq!(record.content_type, ContentType::TextOnly);
        assert!(record.owner.is_none());

        assert_eq!(reconcile(ContentStoreParts::new(9), None), None);
    }

    #[test]
    fn test_content_type_never_inferred_from_images() {
        let parts = ContentStoreParts {
            metadata: Some(metadata(json!({ "images": ["a.png", "b.png"] }))),
            ..ContentStoreParts::new(10)
        };
        let record = reconcile(parts, None).unwrap();
        assert_eq!(record.content_type, ContentType::Unknown);
        assert_eq!(record.image_count, 2);
        assert_eq!(record.title, "Story #10");
    }
}
