// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod onboarding;
pub mod scoring;
pub mod state;

pub use distance::{calculate_bounding_box, distance_between, haversine_distance, is_within_bounding_box};
pub use filters::{calculate_interest_score, is_eligible, matches_mutually, matches_preferences};
pub use matcher::{MatchResult, Matcher, MatcherOptions};
pub use onboarding::{OnboardingRules, OnboardingStep, ProfileDraft};
pub use scoring::{calculate_compatibility, Compatibility};
pub use state::{ConversationState, StateViolation, Transition};
