use crate::core::{
    filters::{is_eligible, matches_mutually, matches_preferences},
    scoring::calculate_compatibility,
};
use crate::models::{CandidateScore, Profile, ScoringWeights, UserId};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Result of the ranking process
#[derive(Debug)]
pub struct MatchResult {
    pub candidates: Vec<CandidateScore>,
    pub total_considered: usize,
}

/// Knobs applied on top of the scoring weights
#[derive(Debug, Clone, Copy)]
pub struct MatcherOptions {
    /// Candidates scoring below this are dropped
    pub min_score: f64,
    /// Also require the seeker to fit the candidate's preferences
    pub require_mutual_preferences: bool,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            require_mutual_preferences: true,
        }
    }
}

/// Candidate matcher - ranks a pool of profiles for one seeker
///
/// # Pipeline Stages
/// 1. Exclusion of the seeker and of anyone already decided on
/// 2. Hard preference filtering
/// 3. Compatibility scoring
/// 4. Deterministic ordering and truncation
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    options: MatcherOptions,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, options: MatcherOptions) -> Self {
        Self { weights, options }
    }

    pub fn with_default_weights() -> Self {
        Self::new(ScoringWeights::default(), MatcherOptions::default())
    }

    /// Rank candidates for a seeker
    ///
    /// # Arguments
    /// * `seeker` - The profile looking for matches
    /// * `pool` - Potential candidates from the profile store
    /// * `decided` - Users the seeker already liked, passed, matched or reported
    /// * `limit` - Maximum number of candidates to return
    ///
    /// Ordering is by score (descending), then by most recent profile update,
    /// then by user id, so identical input always yields identical output.
    /// An exhausted pool yields an empty result.
    pub fn rank(
        &self,
        seeker: &Profile,
        pool: Vec<Profile>,
        decided: &HashSet<UserId>,
        limit: usize,
    ) -> MatchResult {
        let total_considered = pool.len();
        let mut seen = HashSet::with_capacity(pool.len());

        let mut scored: Vec<CandidateScore> = pool
            .into_iter()
            // Stage 1: exclusions (self, decided, duplicates)
            .filter(|candidate| is_eligible(seeker.user_id, candidate, decided))
            .filter(|candidate| seen.insert(candidate.user_id))
            // Stage 2: hard preferences
            .filter(|candidate| {
                if self.options.require_mutual_preferences {
                    matches_mutually(seeker, candidate)
                } else {
                    matches_preferences(seeker, candidate)
                }
            })
            // Stage 3: scoring
            .filter_map(|candidate| {
                let compatibility = calculate_compatibility(seeker, &candidate, &self.weights);
                if compatibility.score < self.options.min_score {
                    return None;
                }
                Some(CandidateScore {
                    candidate: candidate.user_id,
                    score: compatibility.score,
                    shared_interests: compatibility.shared_interests,
                    distance_km: compatibility.distance_km,
                    updated_at: candidate.updated_at,
                })
            })
            .collect();

        // Stage 4: ordering
        scored.sort_by(compare_candidates);
        scored.truncate(limit);

        MatchResult {
            candidates: scored,
            total_considered,
        }
    }
}

/// Score descending, then most recently updated, then lowest id
fn compare_candidates(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.candidate.cmp(&b.candidate))
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
