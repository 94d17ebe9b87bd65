//! Shared test fixtures: scripted source adapters and candidate builders
//!
//! No network anywhere; adapters answer from canned data so pipeline
//! behavior (merge, budget, guarantee) is deterministic.

// Each test target uses a different slice of these fixtures.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use scout_cs::models::candidate::CandidateRecord;
use scout_cs::types::{AdapterError, Platform, SearchCriteria, SourceAdapter};

type Responder =
    Box<dyn Fn(&SearchCriteria) -> Result<Vec<CandidateRecord>, AdapterError> + Send + Sync>;

/// A source adapter that answers from a script instead of a provider
pub struct ScriptedAdapter {
    platform: Platform,
    delay: Duration,
    calls: AtomicUsize,
    respond: Responder,
}

impl ScriptedAdapter {
    /// Adapter that returns the same records on every call
    pub fn returning(platform: Platform, records: Vec<CandidateRecord>) -> Self {
        Self::with_responder(platform, move |_| Ok(records.clone()))
    }

    /// Adapter with per-call logic (inspects the criteria it was given)
    pub fn with_responder<F>(platform: Platform, respond: F) -> Self
    where
        F: Fn(&SearchCriteria) -> Result<Vec<CandidateRecord>, AdapterError> + Send + Sync + 'static,
    {
        Self {
            platform,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    /// Adapter that never resolves within any sane timeout
    pub fn hanging(platform: Platform) -> Self {
        Self::with_responder(platform, |_| Ok(Vec::new())).delayed(Duration::from_secs(3600))
    }

    /// Adapter that fails every call
    pub fn failing(platform: Platform) -> Self {
        Self::with_responder(platform, |_| {
            Err(AdapterError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            })
        })
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times `search` has been called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CandidateRecord>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(criteria)
    }
}

/// A complete profile that clears the default quality bar
///
/// Every completeness signal filled, ten years of experience, and solid
/// platform metrics. Identity resolves through the normalized name unless
/// an email is supplied.
pub fn full_candidate(
    platform: Platform,
    name: &str,
    email: Option<&str>,
    skills: &[&str],
) -> CandidateRecord {
    let mut record = CandidateRecord::new(platform, "scripted");
    record.set_name(name);
    record.email = email.map(|e| e.to_string());
    record.title = Some("Senior Software Engineer".to_string());
    record.location = Some("Berlin".to_string());
    record.summary = Some(format!("Builds backend systems with {}", skills.join(", ")));
    record.experience_years = Some(10.0);
    for skill in skills {
        record.add_skill(*skill);
    }
    record.metrics.reputation_points = Some(5_000);
    record.metrics.followers = Some(800);
    record.metrics.contributions = Some(300);
    record.metrics.last_active = Some(Utc::now());
    record
}

/// A minimal record: just a name, identity via the normalized form
pub fn named_candidate(platform: Platform, name: &str) -> CandidateRecord {
    let mut record = CandidateRecord::new(platform, "scripted");
    record.set_name(name);
    record
}

/// In-memory database with the scout-cs schema
pub async fn test_pool() -> SqlitePool {
    // The pool must stay usable under tokio's paused test clock: auto-advance
    // fires any pool timer the instant the runtime parks, long before the
    // sqlite worker thread can answer. Acquires are only timer-free when they
    // pop an idle connection on the first poll, and sqlx pings a connection
    // through the worker thread before it goes back to idle, so a single
    // connection always has a fatal zero-idle window after each query. Keep
    // several connections, all pre-opened below, and disable the acquire-time
    // ping and the idle/lifetime reapers (their timers would also fire early).
    // A named shared-cache memory database gives every connection the same
    // data, unlike `:memory:` which is per-connection; the name is unique per
    // pool so concurrent tests in one process don't share state.
    static POOL_SEQ: AtomicUsize = AtomicUsize::new(0);
    let url = format!(
        "sqlite:file:scout_test_{}?mode=memory&cache=shared",
        POOL_SEQ.fetch_add(1, Ordering::SeqCst)
    );
    const POOL_CONNECTIONS: u32 = 16;
    let pool = SqlitePoolOptions::new()
        .max_connections(POOL_CONNECTIONS)
        .test_before_acquire(false)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(&url)
        .await
        .expect("in-memory sqlite");

    // Open every connection now, under real time, then wait for them all to
    // land in the idle queue so a paused-clock test never opens one mid-run.
    let mut warm = Vec::new();
    for _ in 0..POOL_CONNECTIONS {
        warm.push(pool.acquire().await.expect("warm connection"));
    }
    drop(warm);
    while pool.num_idle() < POOL_CONNECTIONS as usize {
        tokio::task::yield_now().await;
    }
    scout_cs::db::init_tables(&pool)
        .await
        .expect("schema init");
    pool
}
