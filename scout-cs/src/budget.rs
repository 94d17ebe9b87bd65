//! Time-budget allocation for source fan-out
//!
//! A search session gets one wall-clock budget. This module decides how much
//! of it each source call may spend, ranks sources by historical performance
//! so the budget goes to the platforms that earn it, and signals when the
//! remaining budget is too thin to launch anything new.
//!
//! `StatsRegistry` lives for the process; `TimeBudget` lives for one session
//! and reads the registry through an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::Platform;

/// Session budget bounds (seconds); requests outside are clamped
pub const MIN_BUDGET_SECONDS: u64 = 30;
pub const MAX_BUDGET_SECONDS: u64 = 120;
pub const DEFAULT_BUDGET_SECONDS: u64 = 60;

/// Per-source timeout clamp bounds
const MIN_SOURCE_TIMEOUT_MS: f64 = 8_000.0;
const MAX_SOURCE_TIMEOUT_MS: f64 = 25_000.0;

/// A single source call never gets more than this share of what is left
const MAX_REMAINING_SHARE: f64 = 0.80;

/// Latency ceiling used to normalize the speed bonus
const LATENCY_CEILING_MS: f64 = 25_000.0;

/// Latency estimate for platforms with no recorded samples
const DEFAULT_LATENCY_MS: f64 = 12_000.0;

/// Sample count at which the reliability factor maxes out
const RELIABILITY_SAMPLE_CAP: u64 = 10;

/// Near-exhaustion bounds: below 15% of total or 12s absolute
const NEAR_EXHAUSTION_SHARE: f64 = 0.15;
const NEAR_EXHAUSTION_FLOOR_MS: u64 = 12_000;

/// Oracle (validation/enrichment) call timeout bounds
const ORACLE_TIMEOUT_FLOOR_MS: f64 = 2_000.0;
const ORACLE_TIMEOUT_CEILING_MS: f64 = 10_000.0;
const ORACLE_REMAINING_SHARE: f64 = 0.10;

/// Rolling performance record for one platform
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceStats {
    pub success_count: u64,
    pub total_count: u64,
    pub average_latency_ms: f64,
}

impl SourceStats {
    fn record(&mut self, success: bool, latency_ms: f64) {
        self.total_count += 1;
        if success {
            self.success_count += 1;
        }
        // Cumulative mean; one pass, no sample storage
        self.average_latency_ms += (latency_ms - self.average_latency_ms) / self.total_count as f64;
    }

    /// Success fraction; neutral 0.5 before any samples exist
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.5
        } else {
            self.success_count as f64 / self.total_count as f64
        }
    }

    /// Higher for faster sources, normalized against the latency ceiling
    fn speed_bonus(&self) -> f64 {
        if self.total_count == 0 {
            return 0.5;
        }
        1.0 - (self.average_latency_ms / LATENCY_CEILING_MS).min(1.0)
    }

    /// Grows with sample count, maxing out at the sample cap
    fn reliability(&self) -> f64 {
        self.total_count.min(RELIABILITY_SAMPLE_CAP) as f64 / RELIABILITY_SAMPLE_CAP as f64
    }

    /// Blended ranking score: 0.5·successRate + 0.3·speedBonus + 0.2·reliability
    pub fn blended_score(&self) -> f64 {
        0.5 * self.success_rate() + 0.3 * self.speed_bonus() + 0.2 * self.reliability()
    }

    /// Average latency, or the default estimate before any samples
    fn latency_estimate_ms(&self) -> f64 {
        if self.total_count == 0 {
            DEFAULT_LATENCY_MS
        } else {
            self.average_latency_ms
        }
    }
}

/// Process-lifetime rolling stats for every platform
///
/// Mutation is a handful of arithmetic ops under a std mutex; nothing awaits
/// while holding the lock.
pub struct StatsRegistry {
    inner: Mutex<HashMap<Platform, SourceStats>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record one adapter call outcome
    ///
    /// Timeouts and errors count as failures; they update the rolling stats
    /// but never raise.
    pub fn record_outcome(&self, platform: Platform, success: bool, latency: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entry(platform)
            .or_default()
            .record(success, latency.as_millis() as f64);
    }

    /// Current stats for one platform (zeroed default when unseen)
    pub fn get(&self, platform: Platform) -> SourceStats {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&platform)
            .copied()
            .unwrap_or_default()
    }

    /// Sort sources by blended score, best first
    ///
    /// The sort is stable, so equally-scored sources keep their input order.
    pub fn rank_sources(&self, sources: &[Platform]) -> Vec<Platform> {
        let mut ranked: Vec<(Platform, f64)> = sources
            .iter()
            .map(|&p| (p, self.get(p).blended_score()))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().map(|(p, _)| p).collect()
    }

    /// Copy of all recorded stats (health/diagnostics surface)
    pub fn snapshot(&self) -> HashMap<Platform, SourceStats> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock budget for one search session
pub struct TimeBudget {
    total: Duration,
    started: Instant,
    stats: Arc<StatsRegistry>,
}

impl TimeBudget {
    /// Start the clock on a session budget
    ///
    /// Callers pass the session's already-clamped budget; the clock starts
    /// immediately.
    pub fn new(total: Duration, stats: Arc<StatsRegistry>) -> Self {
        Self {
            total,
            started: Instant::now(),
            stats,
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.started.elapsed())
    }

    /// True when the remaining budget is below 15% of total or 12s absolute
    ///
    /// Signals the orchestrator to stop launching new source calls and
    /// finalize with whatever the pool holds.
    pub fn is_near_exhaustion(&self) -> bool {
        let remaining = self.remaining();
        remaining < self.total.mul_f64(NEAR_EXHAUSTION_SHARE)
            || remaining < Duration::from_millis(NEAR_EXHAUSTION_FLOOR_MS)
    }

    /// Rank sources and compute a timeout for each, best source first
    pub fn allocate(&self, sources: &[Platform]) -> Vec<(Platform, Duration)> {
        let remaining_ms = self.remaining().as_millis() as f64;
        let allocations: Vec<(Platform, Duration)> = self
            .stats
            .rank_sources(sources)
            .into_iter()
            .map(|platform| {
                let avg = self.stats.get(platform).latency_estimate_ms();
                (platform, source_timeout_ms(avg, remaining_ms))
            })
            .map(|(platform, ms)| (platform, Duration::from_millis(ms as u64)))
            .collect();

        debug!(
            remaining_ms = remaining_ms as u64,
            allocations = ?allocations
                .iter()
                .map(|(p, d)| (p.as_str(), d.as_millis() as u64))
                .collect::<Vec<_>>(),
            "Allocated source timeouts"
        );
        allocations
    }

    /// Timeout for a single source call right now
    pub fn source_timeout(&self, platform: Platform) -> Duration {
        let avg = self.stats.get(platform).latency_estimate_ms();
        Duration::from_millis(source_timeout_ms(avg, self.remaining().as_millis() as f64) as u64)
    }

    /// Timeout for one oracle (validation/enrichment) call
    ///
    /// A tenth of the remaining budget, clamped to [2s, 10s] and still
    /// capped at 80% of remaining so a dying budget cannot be overdrawn.
    pub fn oracle_timeout(&self) -> Duration {
        let remaining_ms = self.remaining().as_millis() as f64;
        let raw = (ORACLE_REMAINING_SHARE * remaining_ms)
            .clamp(ORACLE_TIMEOUT_FLOOR_MS, ORACLE_TIMEOUT_CEILING_MS)
            .min(MAX_REMAINING_SHARE * remaining_ms);
        Duration::from_millis(raw.max(0.0) as u64)
    }

    /// Record one adapter call outcome into the shared registry
    pub fn record_outcome(&self, platform: Platform, success: bool, latency: Duration) {
        self.stats.record_outcome(platform, success, latency);
    }

    pub fn stats(&self) -> Arc<StatsRegistry> {
        Arc::clone(&self.stats)
    }
}

/// Per-source timeout: clamp(8s, 25s, min(0.25·remaining, 1.5·avgLatency)),
/// then capped at 80% of remaining
///
/// The 80% cap wins over the 8s floor; with 9s left the call gets 7.2s.
fn source_timeout_ms(average_latency_ms: f64, remaining_ms: f64) -> f64 {
    let raw = (0.25 * remaining_ms).min(1.5 * average_latency_ms);
    let clamped = raw.clamp(MIN_SOURCE_TIMEOUT_MS, MAX_SOURCE_TIMEOUT_MS);
    clamped.min(MAX_REMAINING_SHARE * remaining_ms).max(0.0)
}
