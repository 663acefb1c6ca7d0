//! Scan session state.
//!
//! A [`ScanSession`] belongs to one discovery run and is threaded through
//! every scan of that run (`scan`, then any number of `load_more`). It is the
//! only place that remembers which ids were already looked at, so ids are
//! never resolved twice and records are never emitted twice.

use std::collections::{BTreeMap, BTreeSet};

use story_discovery_types::{TokenId, TokenRecord};

#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    highest_checked: Option<TokenId>,
    visited: BTreeSet<TokenId>,
    found: BTreeMap<TokenId, TokenRecord>,
    /// Exists on the registry but nothing could be resolved for it.
    unresolvable: BTreeSet<TokenId>,
    deferred: BTreeSet<TokenId>,
    /// Ids the registry confirmed as minted during this session; excludes cache seeds.
    confirmed: BTreeSet<TokenId>,
    emitted: BTreeSet<TokenId>,
    seeded: bool,
    registry_verified: bool,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highest_checked(&self) -> Option<TokenId> {
        self.highest_checked
    }

    /// First id of the next full-mode page.
    pub fn next_start(&self) -> TokenId {
        self.highest_checked.map_or(0, |id| id.saturating_add(1))
    }

    pub fn mark_checked(&mut self, id: TokenId) {
        self.highest_checked = Some(self.highest_checked.map_or(id, |h| h.max(id)));
    }

    pub fn is_visited(&self, id: TokenId) -> bool {
        self.visited.contains(&id)
    }

    pub fn mark_visited(&mut self, id: TokenId) {
        self.visited.insert(id);
    }

    /// Known to exist: found, or confirmed by the registry but unresolvable.
    pub fn is_known_existing(&self, id: TokenId) -> bool {
        self.found.contains_key(&id) || self.unresolvable.contains(&id)
    }

    pub fn mark_unresolvable(&mut self, id: TokenId) {
        self.unresolvable.insert(id);
    }

    pub fn record_found(&mut self, record: TokenRecord) {
        self.found.insert(record.id, record);
    }

    pub fn mark_confirmed(&mut self, id: TokenId) {
        self.confirmed.insert(id);
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    /// Highest id known to exist, used to center windowed scans without a hint.
    pub fn highest_known(&self) -> Option<TokenId> {
        let found = self.found.keys().next_back().copied();
        let unresolvable = self.unresolvable.iter().next_back().copied();
        found.max(unresolvable)
    }

    /// Mark `id` emitted. `false` if it already was.
    pub fn mark_emitted(&mut self, id: TokenId) -> bool {
        self.emitted.insert(id)
    }

    /// Found records not yet emitted (e.g. seeded from the cache), ascending. Marks them emitted.
    pub fn take_unemitted(&mut self) -> Vec<TokenRecord> {
        let pending: Vec<TokenRecord> = self
            .found
            .values()
            .filter(|r| !self.emitted.contains(&r.id))
            .cloned()
            .collect();
        for record in &pending {
            self.emitted.insert(record.id);
        }
        pending
    }

    pub fn defer(&mut self, id: TokenId) {
        self.deferred.insert(id);
    }

    pub fn undefer(&mut self, id: TokenId) {
        self.deferred.remove(&id);
    }

    pub fn deferred(&self) -> Vec<TokenId> {
        self.deferred.iter().copied().collect()
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn mark_seeded(&mut self) {
        self.seeded = true;
    }

    pub fn is_registry_verified(&self) -> bool {
        self.registry_verified
    }

    pub fn mark_registry_verified(&mut self) {
        self.registry_verified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_discovery_types::{ContentType, ResolutionSource};

    fn record(id: TokenId) -> TokenRecord {
        TokenRecord {
            id,
            title: TokenRecord::fallback_title(id),
            description: String::new(),
            story_content: String::new(),
            image_url: None,
            images: Vec::new(),
            owner: None,
            genre: "Unknown".into(),
            author: "Unknown".into(),
            content_type: ContentType::Unknown,
            image_count: 0,
            resolution_source: ResolutionSource::LocalCacheOnly,
        }
    }

    #[test]
    fn test_next_start() {
        let mut session = ScanSession::new();
        assert_eq!(session.next_start(), 0);
        session.mark_checked(9);
        session.mark_checked(4);
        assert_eq!(session.highest_checked(), Some(9));
        assert_eq!(session.next_start(), 10);
    }

    #[test]
    fn test_emitted_once() {
        let mut session = ScanSession::new();
        session.record_found(record(3));
        session.record_found(record(1));
        let first: Vec<_> = session.take_unemitted().iter().map(|r| r.id).collect();
        assert_eq!(first, vec![1, 3]);
        assert!(session.take_unemitted().is_empty());
        assert!(!session.mark_emitted(3));
        assert!(session.mark_emitted(5));
    }

    #[test]
    fn test_highest_known() {
        let mut session = ScanSession::new();
        assert_eq!(session.highest_known(), None);
        session.record_found(record(4));
        session.mark_unresolvable(11);
        assert_eq!(session.highest_known(), Some(11));
        assert!(session.is_known_existing(11));
        assert!(!session.is_known_existing(5));
    }

    #[test]
    fn test_seeded_records_are_not_confirmed() {
        let mut session = ScanSession::new();
        session.record_found(record(6));
        assert_eq!(session.highest_known(), Some(6));
        assert_eq!(session.confirmed_count(), 0);
        session.mark_confirmed(5);
        session.mark_confirmed(5);
        assert_eq!(session.confirmed_count(), 1);
    }

    #[test]
    fn test_deferred() {
        let mut session = ScanSession::new();
        session.defer(8);
        session.defer(2);
        session.defer(8);
        assert_eq!(session.deferred(), vec![2, 8]);
        session.undefer(2);
        assert_eq!(session.deferred(), vec![8]);
    }
}
