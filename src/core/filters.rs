use crate::core::distance::distance_between;
use crate::models::{Profile, UserId};
use std::collections::HashSet;

/// Check that a candidate is someone the seeker may be shown at all
///
/// Stage 1 of the pipeline: never the seeker, never someone already decided on.
#[inline]
pub fn is_eligible(seeker: UserId, candidate: &Profile, decided: &HashSet<UserId>) -> bool {
    candidate.user_id != seeker && !decided.contains(&candidate.user_id)
}

/// Check a candidate against the seeker's hard preference filters
///
/// Stage 2: gender set, age range and, when both locations are known and the
/// seeker set a limit, maximum distance.
#[inline]
pub fn matches_preferences(seeker: &Profile, candidate: &Profile) -> bool {
    let prefs = &seeker.preferences;

    if !prefs.accepts_gender(candidate.gender) {
        return false;
    }

    if !prefs.accepts_age(candidate.age) {
        return false;
    }

    if let (Some(max_km), Some(distance_km)) = (
        prefs.max_distance_km,
        distance_between(seeker.location, candidate.location),
    ) {
        if distance_km > f64::from(max_km) {
            return false;
        }
    }

    true
}

/// Both sides would accept each other
#[inline]
pub fn matches_mutually(seeker: &Profile, candidate: &Profile) -> bool {
    matches_preferences(seeker, candidate) && matches_preferences(candidate, seeker)
}

/// Interest overlap between seeker and candidate
///
/// Returns the fraction of the seeker's interests the candidate shares
/// (0.0 to 1.0) and the shared tags in sorted order.
#[inline]
pub fn calculate_interest_score(seeker: &Profile, candidate: &Profile) -> (f64, Vec<String>) {
    let shared: Vec<String> = seeker
        .interests
        .intersection(&candidate.interests)
        .cloned()
        .collect();

    if seeker.interests.is_empty() {
        return (0.0, shared);
    }

    let score = shared.len() as f64 / seeker.interests.len() as f64;
    (score.min(1.0), shared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, GeoPoint, Preferences};
    use chrono::Utc;

    fn create_test_profile(id: i64, age: u8, gender: Gender, interests: &[&str]) -> Profile {
        Profile {
            user_id: UserId(id),
            display_name: format!("User {}", id),
            age,
            gender,
            bio: "hello".to_string(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            location: Some(GeoPoint { latitude: 52.52, longitude: 13.405 }),
            photo_file_id: None,
            preferences: Preferences {
                genders: [Gender::Female].into_iter().collect(),
                min_age: 21,
                max_age: 35,
                max_distance_km: Some(50),
            },
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_excludes_self_and_decided() {
        let candidate = create_test_profile(2, 25, Gender::Female, &[]);
        let mut decided = HashSet::new();

        assert!(is_eligible(UserId(1), &candidate, &decided));
        assert!(!is_eligible(UserId(2), &candidate, &decided));

        decided.insert(UserId(2));
        assert!(!is_eligible(UserId(1), &candidate, &decided));
    }

    #[test]
    fn test_preferences_match() {
        let seeker = create_test_profile(1, 30, Gender::Male, &[]);
        let candidate = create_test_profile(2, 25, Gender::Female, &[]);

        assert!(matches_preferences(&seeker, &candidate));
    }

    #[test]
    fn test_preferences_fail_age() {
        let seeker = create_test_profile(1, 30, Gender::Male, &[]);
        let candidate = create_test_profile(2, 40, Gender::Female, &[]);

        assert!(!matches_preferences(&seeker, &candidate));
    }

    #[test]
    fn test_preferences_fail_gender() {
        let seeker = create_test_profile(1, 30, Gender::Male, &[]);
        let candidate = create_test_profile(2, 25, Gender::Male, &[]);

        assert!(!matches_preferences(&seeker, &candidate));
    }

    #[test]
    fn test_preferences_fail_distance() {
        let seeker = create_test_profile(1, 30, Gender::Male, &[]);
        let mut candidate = create_test_profile(2, 25, Gender::Female, &[]);
        candidate.location = Some(GeoPoint { latitude: 48.1351, longitude: 11.5820 });

        assert!(!matches_preferences(&seeker, &candidate));

        candidate.location = None;
        assert!(matches_preferences(&seeker, &candidate));
    }

    #[test]
    fn test_mutual_preferences() {
        let seeker = create_test_profile(1, 30, Gender::Male, &[]);
        let candidate = create_test_profile(2, 25, Gender::Female, &[]);

        // candidate only wants women
        assert!(!matches_mutually(&seeker, &candidate));
    }

    #[test]
    fn test_interest_score() {
        let seeker = create_test_profile(1, 30, Gender::Male, &["hiking", "jazz"]);
        let candidate = create_test_profile(2, 25, Gender::Female, &["hiking", "reading"]);

        let (score, shared) = calculate_interest_score(&seeker, &candidate);

        assert!((score - 0.5).abs() < f64::EPSILON);
        assert_eq!(shared, vec!["hiking"]);
    }

    #[test]
    fn test_interest_score_without_seeker_interests() {
        let seeker = create_test_profile(1, 30, Gender::Male, &[]);
        let candidate = create_test_profile(2, 25, Gender::Female, &["hiking"]);

        let (score, shared) = calculate_interest_score(&seeker, &candidate);
        assert_eq!(score, 0.0);
        assert!(shared.is_empty());
    }
}
