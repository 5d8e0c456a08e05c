//! SoulMatch - matchmaking bot service
//!
//! Users build a profile through a chat wizard, browse ranked candidates,
//! match on mutual likes and chat through the bot. Platform events arrive
//! over HTTP and replies leave through an outbound gateway.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{ConversationState, Matcher, MatcherOptions, StateViolation, Transition};
pub use dispatch::{DispatchError, Dispatcher, DispatcherSettings, InboundEvent, Outbox, Payload};
pub use models::{CandidateScore, Match, OutboundMessage, PlatformAccount, Profile, ScoringWeights, UserId};
pub use services::{MemoryStore, PostgresStore, ProfileStore, StoreError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::distance::calculate_bounding_box;
    use crate::models::GeoPoint;

    #[test]
    fn test_library_exports() {
        let center = GeoPoint { latitude: 40.7128, longitude: -74.0060 };
        let bbox = calculate_bounding_box(center, 10.0);
        assert!(bbox.min_lat < 40.7128);

        let state = ConversationState::default();
        assert_eq!(state.name(), "browsing");
    }
}
