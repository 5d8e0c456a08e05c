use crate::core::{distance::distance_between, filters::calculate_interest_score};
use crate::models::{Profile, ScoringWeights};

/// Reference distance when the seeker has no distance limit
const DEFAULT_REFERENCE_KM: f64 = 100.0;

/// Score given to the distance factor when either location is unknown
const UNKNOWN_DISTANCE_SCORE: f64 = 0.5;

/// Per-factor breakdown of a compatibility score
#[derive(Debug, Clone, PartialEq)]
pub struct Compatibility {
    /// Weighted total in 0..=100
    pub score: f64,
    pub shared_interests: Vec<String>,
    pub distance_km: Option<f64>,
}

/// Calculate the compatibility (0-100) of a candidate for a seeker
///
/// Scoring formula:
/// score = (
///     interest_score * 0.50 +   # shared tags / seeker's tags
///     age_score * 0.20 +        # closer to middle of preferred range = higher
///     distance_score * 0.20 +   # closer = higher, 0.5 when unknown
///     photo_bonus * 0.10        # candidate has a photo
/// ) * 100
pub fn calculate_compatibility(
    seeker: &Profile,
    candidate: &Profile,
    weights: &ScoringWeights,
) -> Compatibility {
    let (interest_score, shared_interests) = calculate_interest_score(seeker, candidate);

    let age_score = calculate_age_score(
        candidate.age,
        seeker.preferences.min_age,
        seeker.preferences.max_age,
    );

    let distance_km = distance_between(seeker.location, candidate.location);
    let distance_score = match distance_km {
        Some(km) => calculate_distance_score(km, seeker.preferences.max_distance_km),
        None => UNKNOWN_DISTANCE_SCORE,
    };

    let photo_score = if candidate.has_photo() { 1.0 } else { 0.0 };

    let total = (interest_score * weights.interests
        + age_score * weights.age
        + distance_score * weights.distance
        + photo_score * weights.photo)
        * 100.0;

    Compatibility {
        score: total.clamp(0.0, 100.0),
        shared_interests,
        distance_km,
    }
}

/// Calculate distance score (0-1)
/// Closer distance = higher score, exponentially decaying
#[inline]
fn calculate_distance_score(distance_km: f64, max_distance_km: Option<u16>) -> f64 {
    let max = max_distance_km
        .map(f64::from)
        .unwrap_or(DEFAULT_REFERENCE_KM);
    if max <= 0.0 || distance_km >= max {
        return 0.0;
    }

    (-distance_km / (max * 0.5)).exp()
}

/// Calculate age score (0-1)
/// Users closer to the middle of the preferred range score higher
#[inline]
fn calculate_age_score(age: u8, min_age: u8, max_age: u8) -> f64 {
    let mid = (f64::from(min_age) + f64::from(max_age)) / 2.0;
    let range = f64::from(max_age) - f64::from(min_age);

    if range <= 0.0 {
        return if age == min_age { 1.0 } else { 0.0 };
    }

    let deviation = (f64::from(age) - mid).abs();
    let normalized_deviation = deviation / (range / 2.0);

    1.0 - normalized_deviation.min(1.0)
}
