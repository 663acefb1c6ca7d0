//! Rate Limit & Retry Governor.
//!
//! One [`Governor`] is shared (as `Arc<Governor>`) by the scanner and the
//! resolver of a discovery run. Every network-bearing call goes through
//! [`Governor::pace`], which:
//!
//! - keeps at least `steady_delay` between successive calls;
//! - on a [`DiscoveryError::Throttled`] result waits a cooldown strictly longer
//!   than the steady delay (doubling per consecutive throttle, capped) and
//!   retries up to `throttle_retries` times;
//! - refuses to call at all once `max_calls` calls have been made in the run.
//!
//! A call is one logical request as the resolver sees it. A content fetch is
//! charged once even though the fetcher behind it may try the proxy and every
//! gateway before giving up; those attempts are bounded by the fetcher's own
//! per-attempt timeout and gateway list, not by `max_calls`.
//!
//! The governor also keeps the consecutive-miss counter the scanner reads for
//! its soft stop. It never stops a scan on misses by itself.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use story_discovery_types::{env_var_or, DiscoveryError, DiscoveryResult};
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Minimum spacing between successive calls.
    pub steady_delay: Duration,
    /// Wait after the first throttled response. Raised above `steady_delay` if configured lower.
    pub throttle_cooldown: Duration,
    /// Cap for the doubling cooldown.
    pub max_cooldown: Duration,
    /// Retries of a throttled call before the error is returned.
    pub throttle_retries: usize,
    /// Hard ceiling on governed calls per run. One content fetch counts once,
    /// however many proxy and gateway attempts it makes.
    pub max_calls: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            steady_delay: Duration::from_millis(150),
            throttle_cooldown: Duration::from_secs(2),
            max_cooldown: Duration::from_secs(15),
            throttle_retries: 2,
            max_calls: 400,
        }
    }
}

impl GovernorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            steady_delay: Duration::from_millis(env_var_or(
                "STORY_SCAN_STEADY_DELAY_MS",
                defaults.steady_delay.as_millis() as u64,
            )),
            throttle_cooldown: Duration::from_millis(env_var_or(
                "STORY_SCAN_THROTTLE_COOLDOWN_MS",
                defaults.throttle_cooldown.as_millis() as u64,
            )),
            max_cooldown: Duration::from_millis(env_var_or(
                "STORY_SCAN_MAX_COOLDOWN_MS",
                defaults.max_cooldown.as_millis() as u64,
            )),
            throttle_retries: env_var_or("STORY_SCAN_THROTTLE_RETRIES", defaults.throttle_retries),
            max_calls: env_var_or("STORY_SCAN_MAX_CALLS", defaults.max_calls),
        }
    }
}

/// Snapshot of governor counters, for logging and summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GovernorStats {
    pub calls: usize,
    pub max_calls: usize,
    pub throttled: usize,
    pub consecutive_misses: u64,
}

#[derive(Debug, Default)]
struct GovernorState {
    calls: usize,
    throttled: usize,
    consecutive_throttles: u32,
    consecutive_misses: u64,
    /// Earliest instant the next call may start.
    next_slot: Option<Instant>,
}

#[derive(Debug)]
pub struct Governor {
    config: GovernorConfig,
    state: Mutex<GovernorState>,
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

impl Governor {
    pub fn new(mut config: GovernorConfig) -> Self {
        if config.throttle_cooldown <= config.steady_delay {
            config.throttle_cooldown = config.steady_delay * 2 + Duration::from_millis(1);
        }
        if config.max_cooldown < config.throttle_cooldown {
            config.max_cooldown = config.throttle_cooldown;
        }
        Self {
            config,
            state: Mutex::new(GovernorState::default()),
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Reset per-run counters (calls, misses, throttle streak). A pending
    /// cooldown is kept: the provider does not forget that it throttled us.
    pub fn begin_run(&self) {
        let mut state = self.state.lock();
        state.calls = 0;
        state.throttled = 0;
        state.consecutive_throttles = 0;
        state.consecutive_misses = 0;
    }

    pub fn stats(&self) -> GovernorStats {
        let state = self.state.lock();
        GovernorStats {
            calls: state.calls,
            max_calls: self.config.max_calls,
            throttled: state.throttled,
            consecutive_misses: state.consecutive_misses,
        }
    }

    pub fn remaining_calls(&self) -> usize {
        self.config.max_calls.saturating_sub(self.state.lock().calls)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_calls() == 0
    }

    pub fn record_miss(&self) -> u64 {
        let mut state = self.state.lock();
        state.consecutive_misses += 1;
        state.consecutive_misses
    }

    pub fn record_hit(&self) {
        self.state.lock().consecutive_misses = 0;
    }

    pub fn consecutive_misses(&self) -> u64 {
        self.state.lock().consecutive_misses
    }

    fn cooldown_for(&self, consecutive_throttles: u32) -> Duration {
        let factor = 1u32 << consecutive_throttles.saturating_sub(1).min(16);
        self.config
            .throttle_cooldown
            .saturating_mul(factor)
            .min(self.config.max_cooldown)
    }

    /// Reserve a call slot: count the call and return how long to wait first.
    fn reserve(&self) -> DiscoveryResult<Duration> {
        let mut state = self.state.lock();
        if state.calls >= self.config.max_calls {
            return Err(DiscoveryError::CallBudgetExhausted {
                limit: self.config.max_calls,
            });
        }
        state.calls += 1;

        let now = Instant::now();
        let start = state.next_slot.map_or(now, |slot| slot.max(now));
        state.next_slot = Some(start + self.config.steady_delay);
        Ok(start - now)
    }

    /// Run `call` under the pacing, cooldown and ceiling rules.
    ///
    /// `call` is invoked again for each throttle retry, so it must be safe to repeat.
    pub async fn pace<T, F, Fut>(&self, label: &str, mut call: F) -> DiscoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DiscoveryResult<T>>,
    {
        let mut retries = 0usize;
        loop {
            let wait = self.reserve()?;
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            match call().await {
                Err(e) if e.is_throttled() => {
                    let cooldown = {
                        let mut state = self.state.lock();
                        state.throttled += 1;
                        state.consecutive_throttles += 1;
                        let cooldown = self.cooldown_for(state.consecutive_throttles);
                        state.next_slot = Some(Instant::now() + cooldown);
                        cooldown
                    };
                    if retries >= self.config.throttle_retries {
                        warn!(label, ?cooldown, "throttled, giving up on this call");
                        return Err(e);
                    }
                    retries += 1;
                    debug!(label, ?cooldown, retry = retries, "throttled, cooling down");
                }
                result => {
                    if result.is_ok() {
                        self.state.lock().consecutive_throttles = 0;
                    }
                    return result;
                }
            }
        }
    }
}
