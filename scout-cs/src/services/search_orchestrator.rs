//! Search orchestrator
//!
//! Coordinates one search session end to end:
//! COLLECTING → EVALUATING → (RETRYING → EVALUATING)* → SATISFIED | DEGRADED → DONE
//!
//! Every source in a round runs concurrently against its slice of the time
//! budget; results stream through validation, enrichment, and scoring into
//! the merge store as each source resolves. The guarantor then decides
//! whether a fallback round is worth the remaining time. Cancellation and
//! the wall-clock deadline are checked at every round boundary and before
//! every source launch, so the session always lands in a terminal state
//! within the budget.

use anyhow::Result;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scout_common::events::{EventBus, ScoutEvent};

use crate::budget::{StatsRegistry, TimeBudget};
use crate::fusion::MergeStore;
use crate::models::candidate::CandidateRecord;
use crate::models::search_session::{SearchSession, SessionState};
use crate::oracle::{CandidateEnricher, CandidateValidator, HeuristicValidator, Verdict};
use crate::scoring::TierScorer;
use crate::services::quality_guarantor::{
    Evaluation, FallbackStrategy, GuaranteeConfig, QualityGuarantor, SearchReport,
    DEFAULT_VALIDATION_FLOOR,
};
use crate::sources::AdapterRegistry;
use crate::types::{Platform, SearchCriteria};

/// Final result delivered to the caller
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchOutput {
    /// Candidates ordered by overall score descending
    pub candidates: Vec<CandidateRecord>,
    pub metadata: SearchMetadata,
}

/// How complete and trustworthy the result set is
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchMetadata {
    /// Platforms that completed at least one round successfully
    pub sources_used: Vec<Platform>,
    pub processing_time_ms: u64,
    /// Successful sources / attempted sources, in [0,1]
    pub completion_rate: f64,
    /// True when any attempted source failed, timed out, or was skipped
    pub is_partial: bool,
    pub quality_report: SearchReport,
}

/// Per-source bookkeeping from one collection round
struct SourceSummary {
    platform: Platform,
    accepted: usize,
    rejected: usize,
    error: Option<String>,
}

/// Search orchestrator service
pub struct SearchOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    registry: Arc<AdapterRegistry>,
    validator: Arc<dyn CandidateValidator>,
    enrichers: Vec<Arc<dyn CandidateEnricher>>,
    scorer: TierScorer,
    guarantee: GuaranteeConfig,
    stats: Arc<StatsRegistry>,
}

impl SearchOrchestrator {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        registry: Arc<AdapterRegistry>,
        validator: Arc<dyn CandidateValidator>,
        enrichers: Vec<Arc<dyn CandidateEnricher>>,
        scorer: TierScorer,
        guarantee: GuaranteeConfig,
        stats: Arc<StatsRegistry>,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry,
            validator,
            enrichers,
            scorer,
            guarantee,
            stats,
        }
    }

    /// Execute a complete search session
    ///
    /// Always returns an output, however partial; hard errors are limited
    /// to persistence failures. The session passed in is driven through its
    /// state machine and saved at every transition.
    pub async fn run(
        &self,
        mut session: SearchSession,
        cancel_token: CancellationToken,
    ) -> Result<SearchOutput> {
        let start_time = Instant::now();
        let budget = TimeBudget::new(
            Duration::from_secs(session.time_budget_seconds),
            Arc::clone(&self.stats),
        );
        let guarantor = QualityGuarantor::new(GuaranteeConfig {
            minimum_results: session.minimum_results,
            ..self.guarantee.clone()
        });
        let criteria = SearchCriteria::new(&session.query, session.location.clone());
        let store = MergeStore::new();

        info!(
            session_id = %session.session_id,
            query = %session.query,
            budget_seconds = session.time_budget_seconds,
            "Starting candidate search"
        );

        self.event_bus.emit_lossy(ScoutEvent::SearchStarted {
            session_id: session.session_id,
            query: session.query.clone(),
            timestamp: Utc::now(),
        });

        let requested = if session.requested_sources.is_empty() {
            self.registry.platforms()
        } else {
            session.requested_sources.clone()
        };
        let mut attempted: Vec<Platform> = Vec::new();

        // Round 0: the request as given
        crate::db::sessions::save_session(&self.db, &session).await?;
        self.collect_round(
            &mut session,
            &store,
            &budget,
            &criteria,
            &requested,
            DEFAULT_VALIDATION_FLOOR,
            &mut attempted,
            &cancel_token,
        )
        .await?;

        if cancel_token.is_cancelled() {
            return self
                .finish_cancelled(session, &store, &guarantor, &attempted, start_time)
                .await;
        }

        let mut threshold = guarantor.config().quality_threshold;
        let mut evaluation = self
            .evaluate(&mut session, &store, &guarantor, threshold)
            .await?;

        let mut retries: u32 = 0;
        let mut last_strategy: Option<FallbackStrategy> = None;

        while !evaluation.satisfied {
            if cancel_token.is_cancelled() {
                return self
                    .finish_cancelled(session, &store, &guarantor, &attempted, start_time)
                    .await;
            }
            if budget.is_near_exhaustion() {
                info!(
                    session_id = %session.session_id,
                    remaining_ms = budget.remaining().as_millis() as u64,
                    "Budget near exhaustion, no further retries"
                );
                break;
            }

            let attempt = retries + 1;
            let Some(plan) = guarantor.plan_retry(
                attempt,
                &criteria,
                &requested,
                &self.registry.platforms(),
                &store.sources_used(),
            ) else {
                break;
            };

            retries = attempt;
            last_strategy = Some(plan.strategy);
            threshold = plan.quality_threshold;

            info!(
                session_id = %session.session_id,
                strategy = %plan.strategy,
                attempt,
                "Guarantee unmet, starting fallback round"
            );
            self.event_bus.emit_lossy(ScoutEvent::RetryStarted {
                session_id: session.session_id,
                strategy: plan.strategy.as_str().to_string(),
                attempt,
                timestamp: Utc::now(),
            });
            self.transition(&mut session, SessionState::Retrying).await?;

            self.collect_round(
                &mut session,
                &store,
                &budget,
                &plan.criteria,
                &plan.platforms,
                plan.validation_floor,
                &mut attempted,
                &cancel_token,
            )
            .await?;

            evaluation = self
                .evaluate(&mut session, &store, &guarantor, threshold)
                .await?;
        }

        let resolution = if evaluation.satisfied {
            SessionState::Satisfied
        } else {
            SessionState::Degraded
        };
        self.transition(&mut session, resolution).await?;

        let report = guarantor.report(&evaluation, retries, last_strategy);
        self.finish(session, &store, &attempted, report, start_time)
            .await
    }

    /// One fan-out/fan-in collection round over the given platforms
    #[allow(clippy::too_many_arguments)]
    async fn collect_round(
        &self,
        session: &mut SearchSession,
        store: &MergeStore,
        budget: &TimeBudget,
        criteria: &SearchCriteria,
        platforms: &[Platform],
        validation_floor: f64,
        attempted: &mut Vec<Platform>,
        cancel_token: &CancellationToken,
    ) -> Result<()> {
        if platforms.is_empty() {
            warn!(session_id = %session.session_id, "Collection round with no sources");
            return Ok(());
        }

        let allocation = budget.allocate(platforms);
        for (platform, _) in &allocation {
            if !attempted.contains(platform) {
                attempted.push(*platform);
            }
        }

        let total = allocation.len();
        session.update_progress(
            0,
            total,
            store.len(),
            format!("Collecting from {} sources", total),
        );
        crate::db::sessions::save_session(&self.db, session).await?;

        let session_id = session.session_id;
        let mut in_flight: FuturesUnordered<_> = allocation
            .iter()
            .map(|(platform, timeout)| {
                self.collect_source(
                    session_id,
                    *platform,
                    criteria,
                    *timeout,
                    budget,
                    store,
                    validation_floor,
                    cancel_token,
                )
            })
            .collect();

        let mut completed = 0;
        while let Some(summary) = in_flight.next().await {
            completed += 1;
            if let Some(error) = &summary.error {
                session.add_error(format!("source:{}", summary.platform), error.clone());
            }
            session.update_progress(
                completed,
                total,
                store.len(),
                format!("{} finished ({}/{})", summary.platform, completed, total),
            );
            crate::db::sessions::save_session(&self.db, session).await?;
        }

        Ok(())
    }

    /// Run one source, then validate, enrich, score, and merge its results
    #[allow(clippy::too_many_arguments)]
    async fn collect_source(
        &self,
        session_id: Uuid,
        platform: Platform,
        criteria: &SearchCriteria,
        timeout: Duration,
        budget: &TimeBudget,
        store: &MergeStore,
        validation_floor: f64,
        cancel_token: &CancellationToken,
    ) -> SourceSummary {
        if cancel_token.is_cancelled() || budget.remaining().is_zero() {
            debug!(platform = %platform, "Skipping source launch");
            return SourceSummary {
                platform,
                accepted: 0,
                rejected: 0,
                error: None,
            };
        }

        let outcome = self.registry.fetch_one(platform, criteria, timeout).await;
        let latency_ms = outcome.latency.as_millis() as u64;
        budget.record_outcome(platform, outcome.result.is_ok(), outcome.latency);

        match outcome.result {
            Ok(mut records) => {
                records.truncate(criteria.per_source_cap);
                let raw = records.len();

                let mut kept = Vec::with_capacity(records.len());
                for mut record in records {
                    if cancel_token.is_cancelled() {
                        break;
                    }
                    if self
                        .validate_and_score(&mut record, criteria, budget, validation_floor)
                        .await
                    {
                        kept.push(record);
                    }
                }

                let dropped = raw - kept.len();
                let merge = store.add_result(platform, kept, true);
                let accepted = merge.accepted + merge.merged;
                let rejected = dropped + merge.rejected;

                self.event_bus.emit_lossy(ScoutEvent::SourceCompleted {
                    session_id,
                    platform: platform.as_str().to_string(),
                    accepted,
                    rejected,
                    latency_ms,
                    pool_size: store.len(),
                    timestamp: Utc::now(),
                });

                SourceSummary {
                    platform,
                    accepted,
                    rejected,
                    error: None,
                }
            }
            Err(e) => {
                store.add_result(platform, Vec::new(), false);
                warn!(
                    platform = %platform,
                    latency_ms,
                    error = %e,
                    "Source failed"
                );
                self.event_bus.emit_lossy(ScoutEvent::SourceFailed {
                    session_id,
                    platform: platform.as_str().to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                SourceSummary {
                    platform,
                    accepted: 0,
                    rejected: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Validate one record, enrich it while time allows, and score it
    ///
    /// Returns false when the record should be dropped. Oracle failures and
    /// timeouts degrade to the deterministic validator, never to an error.
    async fn validate_and_score(
        &self,
        record: &mut CandidateRecord,
        criteria: &SearchCriteria,
        budget: &TimeBudget,
        validation_floor: f64,
    ) -> bool {
        let verdict = match tokio::time::timeout(
            budget.oracle_timeout(),
            self.validator.validate(record, criteria),
        )
        .await
        {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                debug!(validator = self.validator.name(), error = %e, "Validator failed, using fallback");
                self.fallback_verdict(record, criteria).await
            }
            Err(_) => {
                debug!(validator = self.validator.name(), "Validator timed out, using fallback");
                self.fallback_verdict(record, criteria).await
            }
        };

        if !verdict.is_valid || verdict.confidence < validation_floor {
            debug!(
                platform = %record.source_platform,
                confidence = verdict.confidence,
                reason = verdict.reason.as_deref().unwrap_or("below confidence floor"),
                "Candidate dropped by validation"
            );
            return false;
        }

        if !budget.is_near_exhaustion() {
            for enricher in &self.enrichers {
                if budget.is_near_exhaustion() {
                    break;
                }
                match tokio::time::timeout(budget.oracle_timeout(), enricher.enrich(record)).await
                {
                    Ok(Ok(enrichment)) => {
                        if !enrichment.is_empty() {
                            enrichment.apply_to(record);
                        }
                    }
                    Ok(Err(e)) => {
                        debug!(enricher = enricher.name(), error = %e, "Enrichment failed")
                    }
                    Err(_) => debug!(enricher = enricher.name(), "Enrichment timed out"),
                }
            }
        }

        self.scorer
            .score(record, criteria, verdict.dimension_scores.as_ref());
        true
    }

    async fn fallback_verdict(
        &self,
        record: &CandidateRecord,
        criteria: &SearchCriteria,
    ) -> Verdict {
        HeuristicValidator
            .validate(record, criteria)
            .await
            .unwrap_or_else(|_| Verdict::neutral())
    }

    async fn evaluate(
        &self,
        session: &mut SearchSession,
        store: &MergeStore,
        guarantor: &QualityGuarantor,
        threshold: f64,
    ) -> Result<Evaluation> {
        self.transition(session, SessionState::Evaluating).await?;

        let evaluation = guarantor.evaluate(&store.snapshot(), threshold);
        self.event_bus.emit_lossy(ScoutEvent::EvaluationCompleted {
            session_id: session.session_id,
            high_quality: evaluation.high_quality,
            required: evaluation.required,
            satisfied: evaluation.satisfied,
            timestamp: Utc::now(),
        });
        Ok(evaluation)
    }

    async fn transition(&self, session: &mut SearchSession, state: SessionState) -> Result<()> {
        let transition = session.transition_to(state);
        self.event_bus.emit_lossy(ScoutEvent::SearchStateChanged {
            session_id: session.session_id,
            old_state: transition.old_state.as_str().to_string(),
            new_state: transition.new_state.as_str().to_string(),
            timestamp: Utc::now(),
        });
        crate::db::sessions::save_session(&self.db, session).await?;
        Ok(())
    }

    /// Persist the final pool, close the session, and build the output
    async fn finish(
        &self,
        mut session: SearchSession,
        store: &MergeStore,
        attempted: &[Platform],
        report: SearchReport,
        start_time: Instant,
    ) -> Result<SearchOutput> {
        let pool = store.get_final(attempted.len());

        crate::db::candidates::save_candidates(&self.db, session.session_id, &pool.candidates)
            .await?;

        session.update_progress(
            session.progress.sources_completed,
            session.progress.sources_total,
            pool.candidates.len(),
            "Search complete".to_string(),
        );
        self.transition(&mut session, SessionState::Done).await?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            session_id = %session.session_id,
            candidates = pool.candidates.len(),
            guarantee_met = report.guarantee_met,
            duration_ms,
            "Search completed"
        );
        self.event_bus.emit_lossy(ScoutEvent::SearchCompleted {
            session_id: session.session_id,
            total_candidates: pool.candidates.len(),
            guarantee_met: report.guarantee_met,
            duration_ms,
            timestamp: Utc::now(),
        });

        let output = SearchOutput {
            candidates: pool.candidates,
            metadata: SearchMetadata {
                sources_used: store.sources_used(),
                processing_time_ms: duration_ms,
                completion_rate: pool.completion_rate,
                is_partial: pool.is_partial,
                quality_report: report,
            },
        };
        crate::db::sessions::save_metadata(&self.db, session.session_id, &output.metadata)
            .await?;

        Ok(output)
    }

    /// Close a cancelled session with whatever the pool holds
    async fn finish_cancelled(
        &self,
        mut session: SearchSession,
        store: &MergeStore,
        guarantor: &QualityGuarantor,
        attempted: &[Platform],
        start_time: Instant,
    ) -> Result<SearchOutput> {
        info!(session_id = %session.session_id, "Search cancelled");
        self.transition(&mut session, SessionState::Cancelled).await?;
        self.event_bus.emit_lossy(ScoutEvent::SearchCancelled {
            session_id: session.session_id,
            timestamp: Utc::now(),
        });

        let pool = store.get_final(attempted.len());
        let evaluation =
            guarantor.evaluate(&pool.candidates, guarantor.config().quality_threshold);
        let report = guarantor.report(&evaluation, 0, None);

        Ok(SearchOutput {
            candidates: pool.candidates,
            metadata: SearchMetadata {
                sources_used: store.sources_used(),
                processing_time_ms: start_time.elapsed().as_millis() as u64,
                completion_rate: pool.completion_rate,
                is_partial: true,
                quality_report: report,
            },
        })
    }
}
