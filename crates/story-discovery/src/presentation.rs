//! Incremental Presentation Controller.
//!
//! Records arrive in completion order; the visible set is always
//! deduplicated by id and sorted newest (highest id) first.

use story_discovery_types::{TokenId, TokenRecord};

use crate::scanner::{ScanEvent, ScanSummary};

/// Insert-or-replace `record` into `visible`, keeping descending id order.
pub fn merge(visible: &[TokenRecord], record: TokenRecord) -> Vec<TokenRecord> {
    let mut next: Vec<TokenRecord> = visible.iter().filter(|r| r.id != record.id).cloned().collect();
    let at = next.partition_point(|r| r.id > record.id);
    next.insert(at, record);
    next
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleSet {
    records: Vec<TokenRecord>,
    complete: bool,
    summary: Option<ScanSummary>,
}

impl VisibleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Found(record) => self.insert(record),
            ScanEvent::Complete(summary) => {
                self.complete = true;
                self.summary = Some(summary);
            }
        }
    }

    pub fn insert(&mut self, record: TokenRecord) {
        self.records = merge(&self.records, record);
    }

    /// Prepare for a follow-up scan (`load_more`): records stay, completion resets.
    pub fn reopen(&mut self) {
        self.complete = false;
        self.summary = None;
    }

    pub fn records(&self) -> &[TokenRecord] {
        &self.records
    }

    pub fn ids(&self) -> Vec<TokenId> {
        self.records.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn summary(&self) -> Option<&ScanSummary> {
        self.summary.as_ref()
    }

    pub fn into_records(self) -> Vec<TokenRecord> {
        self.records
    }
}
