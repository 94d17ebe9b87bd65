//! Deduplicating merge store
//!
//! The single mutable accumulator shared by concurrent source rounds. Every
//! write is one "upsert by identity key" under the store mutex, so
//! interleaved source completions can never lose updates. Merging is driven
//! by an order-independent preference between records, which makes the final
//! pool identical no matter which source finished first.
//!
//! This is the one place in the pipeline where duplicates are detected and
//! resolved; adapters and scorers never compare identities themselves.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::fusion::identity::IdentityKey;
use crate::models::candidate::CandidateRecord;
use crate::types::Platform;

/// Names on the same identity below this similarity get a risk flag
const NAME_CONFLICT_SIMILARITY: f64 = 0.6;

/// Bookkeeping returned from one `add_result` call
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOutcome {
    /// Records stored under a new identity key
    pub accepted: usize,
    /// Records merged into an existing identity
    pub merged: usize,
    /// Records rejected for having no identity field
    pub rejected: usize,
}

/// Final pool handed to the quality guarantor
#[derive(Debug, Clone)]
pub struct FinalPool {
    /// Candidates ordered by overall score desc, then completeness, then freshness
    pub candidates: Vec<CandidateRecord>,
    /// completedSources / totalSources, in [0,1]
    pub completion_rate: f64,
    /// True when at least one requested source did not complete
    pub is_partial: bool,
}

#[derive(Default)]
struct StoreInner {
    records: HashMap<IdentityKey, CandidateRecord>,
    succeeded: HashSet<Platform>,
    rejected_no_identity: usize,
}

/// In-memory deduplicating accumulator for one search session
pub struct MergeStore {
    inner: Mutex<StoreInner>,
}

impl MergeStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Record one source round: upsert every candidate by identity key
    ///
    /// `success` marks whether the source completed; failed or timed-out
    /// sources call this with an empty batch and `success = false` so the
    /// completion rate reflects them.
    pub fn add_result(
        &self,
        platform: Platform,
        candidates: Vec<CandidateRecord>,
        success: bool,
    ) -> MergeOutcome {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if success {
            inner.succeeded.insert(platform);
        }

        let mut outcome = MergeOutcome::default();
        for candidate in candidates {
            let Some(key) = IdentityKey::derive(&candidate) else {
                warn!(
                    platform = %platform,
                    discovery = %candidate.discovery_method,
                    "Discarding candidate without any identity field"
                );
                inner.rejected_no_identity += 1;
                outcome.rejected += 1;
                continue;
            };

            match inner.records.remove(&key) {
                Some(existing) => {
                    let merged = merge_records(existing, candidate);
                    inner.records.insert(key, merged);
                    outcome.merged += 1;
                }
                None => {
                    inner.records.insert(key, candidate);
                    outcome.accepted += 1;
                }
            }
        }

        debug!(
            platform = %platform,
            accepted = outcome.accepted,
            merged = outcome.merged,
            rejected = outcome.rejected,
            pool_size = inner.records.len(),
            "Merged source round into pool"
        );
        outcome
    }

    /// Unique candidates currently in the pool
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidates rejected so far for missing identity
    pub fn rejected_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .rejected_no_identity
    }

    /// Platforms that completed successfully, in stable enum order
    pub fn sources_used(&self) -> Vec<Platform> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Platform::all()
            .into_iter()
            .filter(|p| inner.succeeded.contains(p))
            .collect()
    }

    /// Unordered copy of the current pool (for mid-flight evaluation)
    pub fn snapshot(&self) -> Vec<CandidateRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .values()
            .cloned()
            .collect()
    }

    /// Final ordered pool with completion bookkeeping
    pub fn get_final(&self, total_source_count: usize) -> FinalPool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let mut candidates: Vec<CandidateRecord> = inner.records.values().cloned().collect();
        candidates.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.data_completeness()
                        .partial_cmp(&a.data_completeness())
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| {
                    b.scores
                        .freshness
                        .partial_cmp(&a.scores.freshness)
                        .unwrap_or(Ordering::Equal)
                })
        });

        let completion_rate = if total_source_count > 0 {
            inner.succeeded.len() as f64 / total_source_count as f64
        } else {
            0.0
        };

        FinalPool {
            candidates,
            completion_rate,
            is_partial: completion_rate < 1.0,
        }
    }
}

impl Default for MergeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge two records sharing an identity key
///
/// The winner is chosen by an order-independent total preference (overall
/// score, then completeness, then earlier collection, then platform order),
/// so merge(a, b) and merge(b, a) produce the same record. The loser fills
/// gaps: optional fields union in, skills and risk flags union with the
/// winner's entries first.
pub fn merge_records(a: CandidateRecord, b: CandidateRecord) -> CandidateRecord {
    let (mut winner, loser) = if merge_preference(&a, &b) == Ordering::Less {
        (b, a)
    } else {
        (a, b)
    };

    // A materially different display name on the same identity is worth
    // surfacing to reviewers before any field is overwritten.
    if let (Some(n1), Some(n2)) = (&winner.name, &loser.name) {
        if n1 != n2 {
            let similarity = strsim::normalized_levenshtein(
                &n1.to_lowercase(),
                &n2.to_lowercase(),
            );
            if similarity < NAME_CONFLICT_SIMILARITY {
                warn!(
                    kept = %n1,
                    dropped = %n2,
                    similarity,
                    "Name conflict on merged identity"
                );
                winner.add_risk_flag("name_conflict");
            }
        }
    }

    winner.email = winner.email.or(loser.email);
    winner.platform_username = winner.platform_username.or(loser.platform_username);
    winner.normalized_name = winner.normalized_name.or(loser.normalized_name);
    winner.name = winner.name.or(loser.name);
    winner.title = winner.title.or(loser.title);
    winner.location = winner.location.or(loser.location);
    winner.summary = winner.summary.or(loser.summary);
    winner.experience_years = winner.experience_years.or(loser.experience_years);
    winner.profile_url = winner.profile_url.or(loser.profile_url);

    winner.metrics.followers = winner.metrics.followers.or(loser.metrics.followers);
    winner.metrics.reputation_points = winner
        .metrics
        .reputation_points
        .or(loser.metrics.reputation_points);
    winner.metrics.contributions = winner.metrics.contributions.or(loser.metrics.contributions);
    winner.metrics.last_active = winner.metrics.last_active.or(loser.metrics.last_active);

    for skill in loser.skills {
        winner.add_skill(skill);
    }
    for flag in loser.risk_flags {
        winner.add_risk_flag(flag);
    }

    winner
}

/// Total preference order between two records sharing a key
///
/// Greater means the left record's scalar values win on conflict. The
/// chain ends in tie-breaks that cannot be equal for records from different
/// fetches, keeping the merge deterministic regardless of arrival order.
fn merge_preference(a: &CandidateRecord, b: &CandidateRecord) -> Ordering {
    a.overall_score
        .partial_cmp(&b.overall_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.data_completeness()
                .partial_cmp(&b.data_completeness())
                .unwrap_or(Ordering::Equal)
        })
        // Earlier collection wins: the first observation is the one that was
        // validated first.
        .then_with(|| b.collected_at.cmp(&a.collected_at))
        .then_with(|| (b.source_platform as u8).cmp(&(a.source_platform as u8)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record_with_email(
        platform: Platform,
        email: &str,
        overall: f64,
    ) -> CandidateRecord {
        let mut r = CandidateRecord::new(platform, "test");
        r.email = Some(email.to_string());
        r.overall_score = overall;
        r
    }

    fn sorted_lower(v: &[String]) -> Vec<String> {
        let mut out: Vec<String> = v.iter().map(|s| s.to_lowercase()).collect();
        out.sort();
        out
    }

    #[test]
    fn test_record_without_identity_is_rejected() {
        let store = MergeStore::new();
        let anonymous = CandidateRecord::new(Platform::Google, "web_search");

        let outcome = store.add_result(Platform::Google, vec![anonymous], true);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(store.len(), 0);
        assert_eq!(store.rejected_count(), 1);
    }

    #[test]
    fn test_same_email_across_platforms_merges_to_one() {
        let store = MergeStore::new();

        let mut github = record_with_email(Platform::Github, "ada@example.com", 80.0);
        github.set_name("Ada Lovelace");
        github.add_skill("rust");

        let mut devto = record_with_email(Platform::Devto, "ADA@example.com", 60.0);
        devto.title = Some("Staff Engineer".to_string());
        devto.add_skill("writing");

        store.add_result(Platform::Github, vec![github], true);
        let outcome = store.add_result(Platform::Devto, vec![devto], true);
        assert_eq!(outcome.merged, 1);
        assert_eq!(store.len(), 1);

        let pool = store.get_final(2);
        let merged = &pool.candidates[0];
        // Winner (higher overall) keeps its scalars; loser fills the gaps
        assert_eq!(merged.overall_score, 80.0);
        assert_eq!(merged.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(merged.title.as_deref(), Some("Staff Engineer"));
        assert_eq!(sorted_lower(&merged.skills), vec!["rust", "writing"]);
    }

    #[test]
    fn test_scalar_conflict_resolved_toward_higher_overall() {
        let store = MergeStore::new();

        let mut low = record_with_email(Platform::Devto, "x@example.com", 40.0);
        low.title = Some("Junior Developer".to_string());

        let mut high = record_with_email(Platform::Github, "x@example.com", 90.0);
        high.title = Some("Principal Engineer".to_string());

        store.add_result(Platform::Devto, vec![low], true);
        store.add_result(Platform::Github, vec![high], true);

        let pool = store.get_final(2);
        assert_eq!(pool.candidates[0].title.as_deref(), Some("Principal Engineer"));
    }

    #[test]
    fn test_merge_is_commutative_across_arrival_order() {
        let make_batches = || {
            let mut a = record_with_email(Platform::Github, "same@example.com", 70.0);
            a.set_name("Grace Hopper");
            a.add_skill("cobol");

            let mut b = record_with_email(Platform::Stackoverflow, "same@example.com", 85.0);
            b.set_name("Grace Hopper");
            b.title = Some("Rear Admiral".to_string());
            b.add_skill("compilers");

            (a, b)
        };

        let forward = MergeStore::new();
        let (a, b) = make_batches();
        forward.add_result(Platform::Github, vec![a], true);
        forward.add_result(Platform::Stackoverflow, vec![b], true);

        let backward = MergeStore::new();
        let (a, b) = make_batches();
        backward.add_result(Platform::Stackoverflow, vec![b], true);
        backward.add_result(Platform::Github, vec![a], true);

        let f = &forward.get_final(2).candidates[0];
        let r = &backward.get_final(2).candidates[0];
        assert_eq!(f.overall_score, r.overall_score);
        assert_eq!(f.title, r.title);
        assert_eq!(f.name, r.name);
        assert_eq!(sorted_lower(&f.skills), sorted_lower(&r.skills));
        assert_eq!(f.risk_flags, r.risk_flags);
        assert_eq!(f.source_platform, r.source_platform);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = MergeStore::new();
        let mut r = record_with_email(Platform::Github, "ada@example.com", 77.0);
        r.add_skill("rust");

        store.add_result(Platform::Github, vec![r.clone()], true);
        store.add_result(Platform::Github, vec![r], true);

        assert_eq!(store.len(), 1);
        let merged = &store.get_final(1).candidates[0];
        assert_eq!(merged.skills, vec!["rust"]);
        assert_eq!(merged.overall_score, 77.0);
    }

    #[test]
    fn test_completion_rate_counts_only_successes() {
        let store = MergeStore::new();
        store.add_result(
            Platform::Github,
            vec![record_with_email(Platform::Github, "a@example.com", 50.0)],
            true,
        );
        store.add_result(Platform::Kaggle, vec![], false);

        let pool = store.get_final(4);
        assert_eq!(pool.completion_rate, 0.25);
        assert!(pool.is_partial);
        assert_eq!(store.sources_used(), vec![Platform::Github]);
    }

    #[test]
    fn test_final_ordering_score_then_completeness() {
        let store = MergeStore::new();

        let sparse = record_with_email(Platform::Github, "sparse@example.com", 90.0);

        let mut full = record_with_email(Platform::Github, "full@example.com", 90.0);
        full.set_name("Full Profile");
        full.title = Some("Engineer".to_string());
        full.add_skill("rust");

        let low = record_with_email(Platform::Github, "low@example.com", 40.0);

        store.add_result(Platform::Github, vec![sparse, full, low], true);

        let pool = store.get_final(1);
        assert_eq!(pool.candidates[0].email.as_deref(), Some("full@example.com"));
        assert_eq!(pool.candidates[1].email.as_deref(), Some("sparse@example.com"));
        assert_eq!(pool.candidates[2].email.as_deref(), Some("low@example.com"));
        assert!(!pool.is_partial);
    }

    #[test]
    fn test_dissimilar_names_on_same_identity_get_flagged() {
        let store = MergeStore::new();

        let mut a = record_with_email(Platform::Github, "shared@example.com", 80.0);
        a.set_name("Ada Lovelace");
        let mut b = record_with_email(Platform::Linkedin, "shared@example.com", 60.0);
        b.set_name("Bob Turner");

        store.add_result(Platform::Github, vec![a], true);
        store.add_result(Platform::Linkedin, vec![b], true);

        let merged = &store.get_final(2).candidates[0];
        assert!(merged.risk_flags.contains(&"name_conflict".to_string()));
        assert_eq!(merged.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_tie_breaks_use_earlier_collection() {
        let mut early = record_with_email(Platform::Github, "t@example.com", 50.0);
        early.collected_at = Utc::now() - Duration::seconds(30);
        early.title = Some("First Seen".to_string());

        let mut late = record_with_email(Platform::Github, "t@example.com", 50.0);
        late.collected_at = Utc::now();
        late.title = Some("Second Seen".to_string());

        let merged = merge_records(late, early);
        assert_eq!(merged.title.as_deref(), Some("First Seen"));
    }
}
