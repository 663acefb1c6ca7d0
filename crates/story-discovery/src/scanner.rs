//! Token Discovery Scanner.
//!
//! Token ids are sparse ordinals with no enumeration API, so discovery is a
//! search: visit candidate ids in some order, resolve each, and stop on a soft
//! heuristic. Two orders are supported:
//!
//! - **Full**: ascending from a start id, up to a bound. Stops early once
//!   `miss_threshold` consecutive ids did not exist *and* at least
//!   `min_found` records were found.
//! - **Windowed**: around a center id (a hint, or the highest known id),
//!   `c, c-1, c+1, c-2, c+2, …` within `[c - span, c + lookahead]`, with a
//!   wider miss tolerance.
//!
//! The scan is a lazy stream. Each record is yielded as soon as it resolves,
//! and the stream always ends with one [`ScanEvent::Complete`]. Dropping the
//! stream stops the scan at its next suspension point; a blocking request
//! already in flight finishes on the blocking pool and its result is discarded.
//!
//! Ids whose resolution failed transiently (throttling, network errors) are
//! deferred and get one more attempt after the main pass.

use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use story_discovery_types::{DiscoveryError, DiscoveryResult, TokenId, TokenRecord};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::resolver::{Resolution, TokenResolver};
use crate::session::ScanSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Ascending from `start` (default: where the session left off, 0 when fresh)
    /// for at most `limit` ids (default: the configured scan bound).
    Full {
        start: Option<TokenId>,
        limit: Option<u64>,
    },
    /// Around `center` (default: highest known id). `span` defaults to the configured window.
    Windowed {
        center: Option<TokenId>,
        span: Option<u64>,
    },
}

impl ScanMode {
    pub fn full() -> Self {
        Self::Full {
            start: None,
            limit: None,
        }
    }

    pub fn windowed(center: Option<TokenId>) -> Self {
        Self::Windowed { center, span: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Every planned id was visited.
    #[default]
    RangeExhausted,
    SoftStop { consecutive_misses: u64 },
    CallBudget,
    /// Repeated non-transient failures, typically a misconfigured registry.
    Aborted { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Ids whose existence was settled in this scan.
    pub checked: usize,
    /// Records yielded by this scan, including cache-seeded ones.
    pub found: usize,
    pub not_existent: usize,
    pub unresolvable: usize,
    /// Ids still unresolved after the retry pass.
    pub deferred: Vec<TokenId>,
    pub highest_checked: Option<TokenId>,
    pub calls: usize,
    pub throttled: usize,
    pub stop: StopReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Found(TokenRecord),
    /// Terminal event; nothing follows it.
    Complete(ScanSummary),
}

#[derive(Debug, Default)]
struct RunCounters {
    checked: usize,
    found: usize,
    not_existent: usize,
    unresolvable: usize,
    consecutive_errors: usize,
}

enum Step {
    Continue,
    Found(TokenRecord),
    Stop(StopReason),
}

/// Candidate ids of one scan, produced lazily so a huge bound costs nothing up front.
type IdPlan = Box<dyn Iterator<Item = TokenId> + Send>;

/// `c, c-1, c+1, c-2, c+2, …` within `[c - span, c + lookahead]`, clamped to the id range.
pub fn window_order(center: TokenId, span: u64, lookahead: u64) -> impl Iterator<Item = TokenId> {
    let below = span.min(center);
    let above = lookahead.min(TokenId::MAX - center);
    std::iter::once(center).chain((1..=below.max(above)).flat_map(move |distance| {
        let lower = (distance <= below).then(|| center - distance);
        let upper = (distance <= above).then(|| center + distance);
        lower.into_iter().chain(upper)
    }))
}

pub struct TokenScanner {
    resolver: Arc<TokenResolver>,
    config: ScanConfig,
}

impl TokenScanner {
    pub fn new(resolver: Arc<TokenResolver>, config: ScanConfig) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &Arc<TokenResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Mark every id with a cached record as visited and register what the
    /// cache alone can resolve. Returns the number of records registered.
    pub fn seed_from_store(&self, session: &mut ScanSession) -> usize {
        session.mark_seeded();
        let ids = match self
            .resolver
            .store()
            .known_token_ids(self.resolver.key_prefix())
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not list cached records, scanning without seed");
                return 0;
            }
        };
        let mut seeded = 0;
        for id in ids {
            if session.is_visited(id) {
                continue;
            }
            session.mark_visited(id);
            if let Some(record) = self.resolver.resolve_cached(id) {
                session.record_found(record);
                seeded += 1;
            }
        }
        debug!(seeded, "seeded session from local record store");
        seeded
    }

    /// Newest minted id according to the registry's logs, for centering a windowed scan.
    pub async fn latest_hint(&self) -> DiscoveryResult<Option<TokenId>> {
        let ids = self
            .resolver
            .recent_token_ids(self.config.recent_lookback_blocks, self.config.recent_max)
            .await?;
        Ok(ids.first().copied())
    }

    fn plan(&self, mode: ScanMode, session: &ScanSession) -> (IdPlan, u64) {
        match mode {
            ScanMode::Full { start, limit } => {
                let start = start.unwrap_or_else(|| session.next_start());
                let limit = limit.unwrap_or(self.config.max_scan);
                let end = start.saturating_add(limit);
                (Box::new(start..end), self.config.miss_threshold)
            }
            ScanMode::Windowed { center, span } => {
                let center = center.or_else(|| session.highest_known()).unwrap_or(0);
                let span = span.unwrap_or(self.config.window_span);
                (
                    Box::new(window_order(center, span, self.config.window_lookahead)),
                    self.config.window_miss_threshold,
                )
            }
        }
    }

    fn absorb(
        &self,
        id: TokenId,
        outcome: DiscoveryResult<Resolution>,
        session: &mut ScanSession,
        counters: &mut RunCounters,
    ) -> Step {
        let governor = self.resolver.governor();
        match outcome {
            Ok(resolution) => {
                counters.checked += 1;
                counters.consecutive_errors = 0;
                session.mark_visited(id);
                if !matches!(resolution, Resolution::NotExistent) {
                    session.mark_confirmed(id);
                }
                session.undefer(id);
                match resolution {
                    Resolution::Resolved(record) => {
                        governor.record_hit();
                        session.record_found(record.clone());
                        if session.mark_emitted(id) {
                            counters.found += 1;
                            Step::Found(record)
                        } else {
                            Step::Continue
                        }
                    }
                    Resolution::NotExistent => {
                        governor.record_miss();
                        counters.not_existent += 1;
                        Step::Continue
                    }
                    Resolution::Unresolvable => {
                        governor.record_hit();
                        session.mark_unresolvable(id);
                        counters.unresolvable += 1;
                        Step::Continue
                    }
                }
            }
            Err(DiscoveryError::CallBudgetExhausted { limit }) => {
                info!(limit, id, "call budget exhausted, stopping scan");
                Step::Stop(StopReason::CallBudget)
            }
            Err(e) => {
                session.defer(id);
                if e.is_transient() {
                    debug!(id, error = %e, "deferring token after transient failure");
                    return Step::Continue;
                }
                counters.consecutive_errors += 1;
                warn!(id, error = %e, "token resolution failed");
                if counters.consecutive_errors >= self.config.max_consecutive_errors {
                    Step::Stop(StopReason::Aborted {
                        error: e.to_string(),
                    })
                } else {
                    Step::Continue
                }
            }
        }
    }

    fn summary(&self, session: &ScanSession, counters: &RunCounters, stop: StopReason) -> ScanSummary {
        let stats = self.resolver.governor().stats();
        ScanSummary {
            checked: counters.checked,
            found: counters.found,
            not_existent: counters.not_existent,
            unresolvable: counters.unresolvable,
            deferred: session.deferred(),
            highest_checked: session.highest_checked(),
            calls: stats.calls,
            throttled: stats.throttled,
            stop,
        }
    }

    /// Run one scan over `session`.
    pub fn scan<'a>(
        &'a self,
        mode: ScanMode,
        session: &'a mut ScanSession,
    ) -> impl Stream<Item = ScanEvent> + 'a {
        async_stream::stream! {
            let governor = self.resolver.governor().clone();
            governor.begin_run();
            let mut counters = RunCounters::default();

            if self.config.seed_from_store && !session.is_seeded() {
                self.seed_from_store(session);
            }
            for record in session.take_unemitted() {
                counters.found += 1;
                yield ScanEvent::Found(record);
            }

            if !session.is_registry_verified() {
                match self.resolver.verify_registry().await {
                    Ok(()) => session.mark_registry_verified(),
                    Err(DiscoveryError::CallBudgetExhausted { .. }) => {
                        yield ScanEvent::Complete(self.summary(session, &counters, StopReason::CallBudget));
                        return;
                    }
                    Err(e) if e.is_transient() => debug!(error = %e, "registry check inconclusive"),
                    Err(e) => {
                        warn!(error = %e, "registry check failed, aborting scan");
                        let stop = StopReason::Aborted { error: e.to_string() };
                        yield ScanEvent::Complete(self.summary(session, &counters, stop));
                        return;
                    }
                }
            }

            let (ids, miss_threshold) = self.plan(mode, session);
            debug!(?mode, miss_threshold, "scan started");
            let mut stop = StopReason::RangeExhausted;

            for id in ids {
                session.mark_checked(id);
                if session.is_visited(id) {
                    if session.is_known_existing(id) {
                        governor.record_hit();
                    } else {
                        governor.record_miss();
                    }
                } else {
                    let outcome = self.resolver.resolve(id).await;
                    match self.absorb(id, outcome, session, &mut counters) {
                        Step::Continue => {}
                        Step::Found(record) => {
                            yield ScanEvent::Found(record);
                        }
                        Step::Stop(reason) => {
                            stop = reason;
                            break;
                        }
                    }
                }

                let misses = governor.consecutive_misses();
                // Cache-seeded records do not count: only the registry can end an empty early run.
                if misses >= miss_threshold && session.confirmed_count() >= self.config.min_found {
                    stop = StopReason::SoftStop { consecutive_misses: misses };
                    break;
                }
            }

            if matches!(stop, StopReason::RangeExhausted | StopReason::SoftStop { .. }) {
                for id in session.deferred() {
                    debug!(id, "retrying deferred token");
                    let outcome = self.resolver.resolve(id).await;
                    match self.absorb(id, outcome, session, &mut counters) {
                        Step::Continue => {}
                        Step::Found(record) => {
                            yield ScanEvent::Found(record);
                        }
                        Step::Stop(reason) => {
                            stop = reason;
                            break;
                        }
                    }
                }
            }

            let summary = self.summary(session, &counters, stop);
            info!(
                found = summary.found,
                checked = summary.checked,
                calls = summary.calls,
                deferred = summary.deferred.len(),
                stop = ?summary.stop,
                "scan complete"
            );
            yield ScanEvent::Complete(summary);
        }
    }

    /// Continue a full scan from where the session left off, for one page.
    pub fn load_more<'a>(&'a self, session: &'a mut ScanSession) -> impl Stream<Item = ScanEvent> + 'a {
        let mode = ScanMode::Full {
            start: Some(session.next_start()),
            limit: Some(self.config.page_size),
        };
        self.scan(mode, session)
    }
}
